//! Credential Bundle Encryption
//!
//! Ein Credential-Bundle ist ein an einen Embedded Key verschlüsselter
//! API-Private-Key. Aufbau des Envelopes (Base58Check-codiert):
//!
//! ```text
//! [ ephemeral public key, SEC1 komprimiert, 33 Bytes ][ AES-256-GCM Ciphertext ]
//! ```
//!
//! Schlüsselableitung: ECDH(ephemeral, recipient) → HKDF-SHA256
//! (Salt = ephemeral ‖ recipient Public Key, unkomprimiert) → 32 Byte
//! AES-Key + 12 Byte Nonce. AAD bindet beide Public Keys.
//!
//! `open` ist die Client-Seite (Inject Bundle); `seal` ist das Gegenstück
//! des Ausstellers und dient hier als Fixture-Generator (`mint`).

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;

use super::KeyPair;

/// Domain-Separator für die HKDF-Ableitung
const HKDF_INFO: &[u8] = b"turnkey_hpke";

/// Länge des komprimierten ephemeral Public Keys im Envelope
const EPHEMERAL_KEY_LEN: usize = 33;

/// AES-256-Key (32) + GCM-Nonce (12)
const OKM_LEN: usize = 44;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Failed to decode bundle: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("Bundle too short: {0} bytes")]
    TooShort(usize),

    #[error("Invalid public key in bundle")]
    InvalidPublicKey,

    #[error("Failed to decode recipient public key hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Key derivation failed")]
    KeyDerivation,

    #[error("Decryption failed (wrong embedded key or corrupted bundle)")]
    Decryption,

    #[error("Encryption failed")]
    Encryption,
}

// ============================================================================
// OPEN (Client-Seite)
// ============================================================================

/// Entschlüsselt ein Credential-Bundle mit dem Embedded Key
///
/// Gibt das Klartext-Schlüsselmaterial (API Private Key) zurück.
pub fn open(bundle: &str, embedded_key: &KeyPair) -> Result<Vec<u8>, BundleError> {
    let envelope = bs58::decode(bundle.trim()).with_check(None).into_vec()?;

    if envelope.len() <= EPHEMERAL_KEY_LEN {
        return Err(BundleError::TooShort(envelope.len()));
    }

    let (ephemeral_bytes, ciphertext) = envelope.split_at(EPHEMERAL_KEY_LEN);
    let ephemeral_public =
        PublicKey::from_sec1_bytes(ephemeral_bytes).map_err(|_| BundleError::InvalidPublicKey)?;

    let shared = embedded_key.diffie_hellman(&ephemeral_public);
    let okm = derive_key_material(
        shared.raw_secret_bytes().as_slice(),
        &ephemeral_public,
        &embedded_key.public_key(),
    )?;

    let aad = authenticated_data(&ephemeral_public, &embedded_key.public_key());
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&okm[..32]));
    let nonce = Nonce::from_slice(&okm[32..OKM_LEN]);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| BundleError::Decryption)
}

// ============================================================================
// SEAL (Aussteller-Seite)
// ============================================================================

/// Verschlüsselt Schlüsselmaterial an einen Target Public Key (unkomprimiert, Hex)
///
/// Gegenstück zu [`open`]; wird vom `mint`-Kommando und den Tests benutzt.
pub fn seal(plaintext: &[u8], recipient_public_key_hex: &str) -> Result<String, BundleError> {
    let recipient_bytes = hex::decode(recipient_public_key_hex.trim())?;
    let recipient_public =
        PublicKey::from_sec1_bytes(&recipient_bytes).map_err(|_| BundleError::InvalidPublicKey)?;

    let ephemeral_secret = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public = ephemeral_secret.public_key();

    let shared = ephemeral_secret.diffie_hellman(&recipient_public);
    let okm = derive_key_material(
        shared.raw_secret_bytes().as_slice(),
        &ephemeral_public,
        &recipient_public,
    )?;

    let aad = authenticated_data(&ephemeral_public, &recipient_public);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&okm[..32]));
    let nonce = Nonce::from_slice(&okm[32..OKM_LEN]);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| BundleError::Encryption)?;

    let mut envelope = ephemeral_public.to_encoded_point(true).as_bytes().to_vec();
    envelope.extend_from_slice(&ciphertext);

    Ok(bs58::encode(envelope).with_check().into_string())
}

// ============================================================================
// KEY DERIVATION
// ============================================================================

/// HKDF-SHA256: Shared Secret → AES-Key + Nonce
///
/// Der Salt bindet beide Public Keys, damit dasselbe Shared Secret für
/// unterschiedliche Empfänger unterschiedliches Material liefert.
fn derive_key_material(
    shared_secret: &[u8],
    ephemeral_public: &PublicKey,
    recipient_public: &PublicKey,
) -> Result<[u8; OKM_LEN], BundleError> {
    let mut salt = Vec::with_capacity(130);
    salt.extend_from_slice(ephemeral_public.to_encoded_point(false).as_bytes());
    salt.extend_from_slice(recipient_public.to_encoded_point(false).as_bytes());

    let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut okm = [0u8; OKM_LEN];
    hkdf.expand(HKDF_INFO, &mut okm)
        .map_err(|_| BundleError::KeyDerivation)?;

    Ok(okm)
}

/// AAD: ephemeral ‖ recipient Public Key, beide unkomprimiert
fn authenticated_data(ephemeral_public: &PublicKey, recipient_public: &PublicKey) -> Vec<u8> {
    let mut aad = Vec::with_capacity(130);
    aad.extend_from_slice(ephemeral_public.to_encoded_point(false).as_bytes());
    aad.extend_from_slice(recipient_public.to_encoded_point(false).as_bytes());
    aad
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let embedded = KeyPair::generate();
        let secret = KeyPair::generate().private_key_bytes();

        let bundle = seal(&secret, &embedded.public_key_uncompressed_hex()).unwrap();
        let plaintext = open(&bundle, &embedded).unwrap();

        assert_eq!(plaintext, secret);
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let embedded = KeyPair::generate();
        let other = KeyPair::generate();
        let secret = KeyPair::generate().private_key_bytes();

        let bundle = seal(&secret, &embedded.public_key_uncompressed_hex()).unwrap();

        assert!(matches!(
            open(&bundle, &other),
            Err(BundleError::Decryption)
        ));
    }

    #[test]
    fn test_open_rejects_garbage() {
        let embedded = KeyPair::generate();

        // Kein Base58
        assert!(open("not a bundle!!", &embedded).is_err());

        // Gültiges Base58Check, aber zu kurz für einen Envelope
        let short = bs58::encode(&[0u8; 8]).with_check().into_string();
        assert!(matches!(
            open(&short, &embedded),
            Err(BundleError::TooShort(8))
        ));
    }

    #[test]
    fn test_open_rejects_tampered_ciphertext() {
        let embedded = KeyPair::generate();
        let secret = KeyPair::generate().private_key_bytes();

        let bundle = seal(&secret, &embedded.public_key_uncompressed_hex()).unwrap();
        let mut envelope = bs58::decode(&bundle).with_check(None).into_vec().unwrap();

        // Letztes Ciphertext-Byte kippen und neu codieren
        *envelope.last_mut().unwrap() ^= 0x01;
        let tampered = bs58::encode(envelope).with_check().into_string();

        assert!(matches!(
            open(&tampered, &embedded),
            Err(BundleError::Decryption)
        ));
    }

    #[test]
    fn test_seal_rejects_invalid_recipient() {
        assert!(matches!(
            seal(b"secret", "04deadbeef"),
            Err(BundleError::InvalidPublicKey)
        ));
        assert!(seal(b"secret", "zzzz").is_err());
    }

    #[test]
    fn test_bundles_are_randomized() {
        // Jeder Seal-Vorgang nutzt einen frischen ephemeral Key
        let embedded = KeyPair::generate();
        let secret = [7u8; 32];

        let a = seal(&secret, &embedded.public_key_uncompressed_hex()).unwrap();
        let b = seal(&secret, &embedded.public_key_uncompressed_hex()).unwrap();

        assert_ne!(a, b);
        assert_eq!(open(&a, &embedded).unwrap(), open(&b, &embedded).unwrap());
    }
}

//! P-256 Key Pair Management
//!
//! Generiert, serialisiert und lädt P-256 Schlüsselpaare (NIST secp256r1).
//! Der Private Key wird als Hex-String im Vault abgelegt; der Public Key
//! wird bei Bedarf abgeleitet und nie gespeichert.
//!
//! ## Verwendung
//! ```rust
//! use stempel::crypto::KeyPair;
//! let keypair = KeyPair::generate();
//! let signature_hex = keypair.sign_der_hex(b"Hello, World!");
//! let public_key_hex = keypair.public_key_hex();
//! ```

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::rngs::OsRng;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum KeyPairError {
    #[error("Failed to decode private key hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key length: expected 32, got {0}")]
    InvalidKeyLength(usize),

    #[error("Failed to create signing key from bytes")]
    InvalidKey,
}

// ============================================================================
// KEYPAIR STRUCT
// ============================================================================

/// P-256 Schlüsselpaar für Signierung (ECDSA) und Bundle-Entschlüsselung (ECDH)
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generiert ein neues zufälliges Schlüsselpaar
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self { signing_key }
    }

    /// Lädt ein Schlüsselpaar aus einem Hex-codierten Private Key (64 Zeichen)
    pub fn from_private_key_hex(private_key_hex: &str) -> Result<Self, KeyPairError> {
        let bytes = hex::decode(private_key_hex.trim())?;

        if bytes.len() != 32 {
            return Err(KeyPairError::InvalidKeyLength(bytes.len()));
        }

        let signing_key = SigningKey::from_slice(&bytes).map_err(|_| KeyPairError::InvalidKey)?;
        Ok(Self { signing_key })
    }

    /// Gibt den Private Key als Hex-String zurück (Vault-Format)
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Gibt den Private Key als raw bytes (32 Bytes) zurück
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// Gibt den Public Key komprimiert als Hex zurück (33 Bytes, API-Format)
    pub fn public_key_hex(&self) -> String {
        let point = self.public_key().to_encoded_point(true);
        hex::encode(point.as_bytes())
    }

    /// Gibt den Public Key unkomprimiert als Hex zurück (65 Bytes, SEC1)
    ///
    /// Das ist der "Target Public Key", an den ein Aussteller
    /// Credential-Bundles verschlüsselt.
    pub fn public_key_uncompressed_hex(&self) -> String {
        let point = self.public_key().to_encoded_point(false);
        hex::encode(point.as_bytes())
    }

    /// Gibt den Public Key zurück
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(self.signing_key.verifying_key())
    }

    /// Signiert Daten mit ECDSA (SHA-256 Digest)
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Signiert Daten und gibt die Signatur DER-codiert als Hex zurück
    ///
    /// Das ist das Signatur-Format, das die API im Stamp erwartet.
    pub fn sign_der_hex(&self, message: &[u8]) -> String {
        let signature = self.sign(message);
        hex::encode(signature.to_der().as_bytes())
    }

    /// ECDH-Schlüsselaustausch mit einem fremden Public Key
    pub(crate) fn diffie_hellman(&self, public_key: &PublicKey) -> p256::ecdh::SharedSecret {
        p256::ecdh::diffie_hellman(self.signing_key.as_nonzero_scalar(), public_key.as_affine())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

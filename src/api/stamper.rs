//! API Key Stamper
//!
//! Erzeugt den `X-Stamp`-Header für authentifizierte API-Requests: der
//! Request-Body wird mit dem entschlüsselten API-Key signiert, die Signatur
//! zusammen mit Public Key und Schema als JSON verpackt und base64url-codiert.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

use super::messages::ApiStamp;
use crate::crypto::{KeyPair, KeyPairError};

/// Header-Name für den Stamp
pub const STAMP_HEADER: &str = "X-Stamp";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum StamperError {
    #[error("Invalid API key: {0}")]
    InvalidKey(#[from] KeyPairError),

    #[error("Failed to serialize stamp: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// STAMPER
// ============================================================================

/// Signiert Request-Bodies mit einem P-256 API-Key
pub struct ApiKeyStamper {
    keypair: KeyPair,
}

impl ApiKeyStamper {
    /// Erstellt einen Stamper aus einem Schlüsselpaar
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    /// Erstellt einen Stamper aus einem Hex-codierten Private Key
    /// (dem entschlüsselten Bundle-Inhalt)
    pub fn from_private_key_hex(private_key_hex: &str) -> Result<Self, StamperError> {
        Ok(Self::new(KeyPair::from_private_key_hex(private_key_hex)?))
    }

    /// Public Key des API-Keys, komprimiert als Hex (API-Format)
    pub fn public_key_hex(&self) -> String {
        self.keypair.public_key_hex()
    }

    /// Signiert einen Request-Body und baut den Stamp-Envelope
    pub fn stamp(&self, content: &str) -> ApiStamp {
        let signature = self.keypair.sign_der_hex(content.as_bytes());
        ApiStamp::new(self.keypair.public_key_hex(), signature)
    }

    /// Codiert einen Stamp als Header-Wert: base64url(JSON), ohne Padding
    pub fn encode(stamp: &ApiStamp) -> Result<String, StamperError> {
        let json = serde_json::to_string(stamp)?;
        Ok(URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }

    /// Signiert und codiert in einem Schritt
    pub fn stamp_header(&self, content: &str) -> Result<String, StamperError> {
        Self::encode(&self.stamp(content))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::messages::SIGNATURE_SCHEME;
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::{Signature, VerifyingKey};

    #[test]
    fn test_stamp_contains_api_key_fields() {
        let keypair = KeyPair::generate();
        let stamper = ApiKeyStamper::new(keypair.clone());

        let stamp = stamper.stamp("{\"organizationId\":\"org-123\"}");

        assert_eq!(stamp.public_key, keypair.public_key_hex());
        assert_eq!(stamp.scheme, SIGNATURE_SCHEME);
        assert!(!stamp.signature.is_empty());
    }

    #[test]
    fn test_stamp_signature_verifies() {
        let keypair = KeyPair::generate();
        let stamper = ApiKeyStamper::new(keypair.clone());

        let content = "payload to sign";
        let stamp = stamper.stamp(content);

        let der = hex::decode(&stamp.signature).unwrap();
        let signature = Signature::from_der(&der).unwrap();
        let verifying_key = VerifyingKey::from(&keypair.public_key());

        assert!(verifying_key
            .verify(content.as_bytes(), &signature)
            .is_ok());
    }

    #[test]
    fn test_header_is_base64url_json() {
        let stamper = ApiKeyStamper::new(KeyPair::generate());
        let header = stamper.stamp_header("content").unwrap();

        // base64url ohne Padding
        assert!(!header.contains('='));
        assert!(!header.contains('+'));
        assert!(!header.contains('/'));

        let decoded = URL_SAFE_NO_PAD.decode(header.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();

        assert_eq!(value["scheme"], SIGNATURE_SCHEME);
        assert!(value["publicKey"].is_string());
        assert!(value["signature"].is_string());
    }

    #[test]
    fn test_from_private_key_hex_roundtrip() {
        let keypair = KeyPair::generate();
        let stamper = ApiKeyStamper::from_private_key_hex(&keypair.private_key_hex()).unwrap();

        assert_eq!(stamper.public_key_hex(), keypair.public_key_hex());
    }

    #[test]
    fn test_from_invalid_private_key_fails() {
        assert!(ApiKeyStamper::from_private_key_hex("not hex").is_err());
    }
}

//! Crypto Module - P-256 Key Management
//!
//! Dieses Modul verwaltet das kryptographische Material der Anwendung:
//! - Generierung des Embedded Keys (P-256) beim ersten Start
//! - Hex-Serialisierung für die Ablage im Vault
//! - Entschlüsselung von Credential-Bundles (ECDH + HKDF + AES-GCM)
//! - ECDSA-Signierung für API-Stamps
//!

pub mod bundle;
mod keypair;

pub use bundle::BundleError;
pub use keypair::{KeyPair, KeyPairError};

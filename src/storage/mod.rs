//! Storage Module - Vault
//!
//! Dieses Modul verwaltet die lokale Persistenz:
//! - SQLite Key-Value-Store im Plattform-Datenverzeichnis
//! - Genau zwei Einträge: Embedded Key und Credential-Bundle
//!

mod vault;

pub use vault::{Vault, VaultError, CREDENTIAL_BUNDLE, EMBEDDED_KEY};

//! Vault Storage
//!
//! SQLite-basierter Key-Value-Store für die zwei persistenten Werte der
//! Anwendung: Embedded Private Key und Credential-Bundle. Werte werden
//! verbatim als Strings abgelegt.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Vault-Eintrag: Embedded Private Key (Hex)
pub const EMBEDDED_KEY: &str = "auth_embedded_key";

/// Vault-Eintrag: Credential-Bundle (verbatim, verschlüsselt)
pub const CREDENTIAL_BUNDLE: &str = "auth_credential_bundle";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create vault directory: {0}")]
    DirectoryCreation(#[from] std::io::Error),
}

// ============================================================================
// VAULT
// ============================================================================

/// Durabler Key-Value-Store (Thread-safe durch Mutex)
pub struct Vault {
    conn: Mutex<Connection>,
}

impl Vault {
    /// Öffnet oder erstellt den Vault im Plattform-Datenverzeichnis
    pub fn open() -> Result<Self, VaultError> {
        let db_path = Self::default_database_path()?;
        Self::open_at_path(&db_path)
    }

    /// Öffnet oder erstellt den Vault in einem expliziten Verzeichnis
    pub fn open_in_dir(dir: &Path) -> Result<Self, VaultError> {
        Self::open_at_path(&dir.join("vault.db"))
    }

    fn open_at_path(db_path: &Path) -> Result<Self, VaultError> {
        // Parent-Verzeichnis erstellen
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!("Opening vault at {:?}", db_path);

        let conn = Connection::open(db_path)?;
        let vault = Self {
            conn: Mutex::new(conn),
        };
        vault.init_schema()?;

        Ok(vault)
    }

    /// In-Memory Vault für Tests
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, VaultError> {
        let conn = Connection::open_in_memory()?;
        let vault = Self {
            conn: Mutex::new(conn),
        };
        vault.init_schema()?;
        Ok(vault)
    }

    /// Ermittelt den Standard-Pfad zur Vault-Datei
    fn default_database_path() -> Result<PathBuf, VaultError> {
        let proj_dirs =
            directories::ProjectDirs::from("com", "kaufm", "stempel").ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not determine app data directory",
                )
            })?;

        let mut path = proj_dirs.data_dir().to_path_buf();
        path.push("vault.db");
        Ok(path)
    }

    /// Initialisiert das Datenbank-Schema
    fn init_schema(&self) -> Result<(), VaultError> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS vault (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            [],
        )?;

        Ok(())
    }

    /// Liest einen Wert; `None` wenn der Eintrag fehlt
    pub fn get(&self, key: &str) -> Result<Option<String>, VaultError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                r#"
                SELECT value FROM vault WHERE key = ?1
                "#,
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Schreibt einen Wert (Upsert)
    pub fn set(&self, key: &str, value: &str) -> Result<(), VaultError> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO vault (key, value)
            VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// Löscht einen Eintrag
    pub fn remove(&self, key: &str) -> Result<(), VaultError> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            DELETE FROM vault WHERE key = ?1
            "#,
            params![key],
        )?;
        Ok(())
    }

    /// Löscht mehrere Einträge in einer Transaktion
    pub fn multi_remove(&self, keys: &[&str]) -> Result<(), VaultError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for key in keys {
            tx.execute(
                r#"
                DELETE FROM vault WHERE key = ?1
                "#,
                params![key],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Stempel - Embedded-Key Authentication Demo
//!
//! Eine CLI-Demo für den Embedded-Key-Flow der Turnkey API:
//! - P-256 Embedded Key, lokal generiert und im Vault persistiert
//! - Credential-Bundles injizieren und in der Session entschlüsseln
//! - Payloads stempeln (ECDSA + X-Stamp-Header)
//! - Whoami-Abfrage gegen die HTTPS-API
//! - SQLite für die zwei persistenten Werte

pub mod api;
pub mod crypto;
pub mod storage;

use api::{ApiClient, ApiKeyStamper, WhoamiResponse};
use clap::{Parser, Subcommand};
use crypto::{bundle, KeyPair};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{Vault, CREDENTIAL_BUNDLE, EMBEDDED_KEY};

/// Default API URL (kann über Umgebungsvariable überschrieben werden)
const DEFAULT_API_URL: &str = "https://api.turnkey.com";

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser)]
#[command(
    name = "stempel",
    version,
    about = "Embedded-Key Authentication Demo für die Turnkey API"
)]
pub struct Cli {
    /// Basis-URL der API (überschreibt TURNKEY_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Organization-ID für die Whoami-Abfrage (überschreibt TURNKEY_ORGANIZATION_ID)
    #[arg(long)]
    pub organization_id: Option<String>,

    /// Verzeichnis für die Vault-Datei (Standard: Plattform-Datenverzeichnis)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Erzeugt einen neuen Embedded Key und persistiert ihn
    Generate,

    /// Speichert ein Credential-Bundle und entschlüsselt es
    Inject {
        /// Bundle-String (ohne Angabe: das gespeicherte Bundle)
        bundle: Option<String>,
    },

    /// Signiert einen Payload mit dem entschlüsselten API-Key
    Stamp {
        /// Der zu signierende Text
        payload: String,
    },

    /// Fragt die Identität des API-Keys ab
    Whoami,

    /// Erzeugt ein Demo-Bundle für den aktuellen Embedded Key
    Mint,

    /// Löscht beide Vault-Einträge und setzt die Session zurück
    Clear,

    /// Zeigt den aktuellen Session-Zustand
    Status,
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Laufzeit-Konfiguration für API-Zugriffe
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub organization_id: String,
}

// ============================================================================
// SESSION STATE
// ============================================================================

/// In-Memory Zustand des Screens; überlebt den Prozess nicht
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Embedded Key (aus dem Vault geladen oder frisch generiert)
    pub embedded_key: Option<KeyPair>,

    /// Eingabefeld: Credential-Bundle
    pub credential_bundle: String,

    /// Eingabefeld: zu stempelnder Payload
    pub payload: String,

    /// Anzeige: Public Key des Embedded Keys (unkomprimiert, Hex)
    pub public_key: String,

    /// Entschlüsseltes Schlüsselmaterial (API Private Key, Hex)
    pub decrypted_key: Option<String>,

    /// Letzte Signatur (DER, Hex)
    pub signature: String,

    /// Whoami-Ergebnis
    pub organization_id: String,
    pub user_id: String,
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Globaler Application State
pub struct AppState {
    vault: Arc<Vault>,
    config: Config,
    session: RwLock<Session>,
}

impl AppState {
    /// Initialisiert den Application State
    pub fn init(config: Config, data_dir: Option<&Path>) -> Result<Arc<Self>, String> {
        // Logging initialisieren
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("stempel=info".parse().unwrap()),
            )
            .init();

        tracing::info!("Initializing Stempel...");

        // Vault öffnen
        let vault = match data_dir {
            Some(dir) => Vault::open_in_dir(dir),
            None => Vault::open(),
        }
        .map_err(|e| e.to_string())?;

        Ok(Arc::new(Self {
            vault: Arc::new(vault),
            config,
            session: RwLock::new(Session::default()),
        }))
    }

    /// In-Memory State für Tests (ohne Logging-Setup)
    #[cfg(test)]
    fn init_in_memory() -> Arc<Self> {
        Arc::new(Self {
            vault: Arc::new(Vault::open_in_memory().unwrap()),
            config: Config {
                api_url: DEFAULT_API_URL.to_string(),
                organization_id: "test-org".to_string(),
            },
            session: RwLock::new(Session::default()),
        })
    }

    /// Gibt eine Kopie der aktuellen Session zurück (für die Anzeige)
    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    /// Setzt das Bundle-Eingabefeld
    pub fn set_credential_bundle(&self, bundle: String) {
        self.session.write().credential_bundle = bundle;
    }

    /// Setzt das Payload-Eingabefeld
    pub fn set_payload(&self, payload: String) {
        self.session.write().payload = payload;
    }

    // ========================================================================
    // ACTION HANDLERS
    // ========================================================================

    /// Lädt die persistierten Werte beim Start
    ///
    /// Ohne gespeicherten Embedded Key wird sofort ein neuer generiert.
    /// Ein gespeichertes Bundle landet im Eingabefeld, wird aber nicht
    /// automatisch entschlüsselt.
    pub async fn load_stored_data(&self) -> Result<(), String> {
        let stored_embedded_key = self.vault.get(EMBEDDED_KEY).map_err(|e| e.to_string())?;
        let stored_bundle = self.vault.get(CREDENTIAL_BUNDLE).map_err(|e| e.to_string())?;

        match stored_embedded_key {
            None => {
                self.handle_generate_key().await?;
            }
            Some(private_key_hex) => {
                let keypair =
                    KeyPair::from_private_key_hex(&private_key_hex).map_err(|e| e.to_string())?;
                let public_key = keypair.public_key_uncompressed_hex();

                let mut session = self.session.write();
                session.embedded_key = Some(keypair);
                session.public_key = public_key;
            }
        }

        if let Some(bundle) = stored_bundle {
            self.session.write().credential_bundle = bundle;
        }

        Ok(())
    }

    /// Generiert einen neuen Embedded Key und persistiert den Private Key
    pub async fn handle_generate_key(&self) -> Result<String, String> {
        let keypair = KeyPair::generate();
        let public_key = keypair.public_key_uncompressed_hex();

        self.vault
            .set(EMBEDDED_KEY, &keypair.private_key_hex())
            .map_err(|e| e.to_string())?;

        {
            let mut session = self.session.write();
            session.embedded_key = Some(keypair);
            session.public_key = public_key.clone();
        }

        tracing::info!("Target public key: {}", public_key);
        Ok(public_key)
    }

    /// Persistiert das aktuelle Bundle und entschlüsselt es mit dem Embedded Key
    pub async fn handle_inject_bundle(&self) -> Result<String, String> {
        let (bundle, embedded_key) = {
            let session = self.session.read();
            (
                session.credential_bundle.clone(),
                session.embedded_key.clone(),
            )
        };

        // Bundle zuerst persistieren, dann entschlüsseln
        self.vault
            .set(CREDENTIAL_BUNDLE, &bundle)
            .map_err(|e| e.to_string())?;

        let embedded_key = embedded_key.ok_or("No embedded key available")?;
        let plaintext = bundle::open(&bundle, &embedded_key).map_err(|e| e.to_string())?;
        let decrypted_key = hex::encode(plaintext);

        self.session.write().decrypted_key = Some(decrypted_key.clone());
        Ok(decrypted_key)
    }

    /// Entfernt beide Vault-Einträge und setzt die Session zurück
    pub async fn handle_clear_storage(&self) -> Result<(), String> {
        self.vault
            .multi_remove(&[EMBEDDED_KEY, CREDENTIAL_BUNDLE])
            .map_err(|e| e.to_string())?;

        *self.session.write() = Session::default();

        tracing::info!("Storage cleared successfully");
        Ok(())
    }

    /// Signiert den aktuellen Payload mit dem entschlüsselten API-Key
    pub async fn handle_stamp_payload(&self) -> Result<String, String> {
        let (payload, decrypted_key) = {
            let session = self.session.read();
            (session.payload.clone(), session.decrypted_key.clone())
        };

        let decrypted_key =
            decrypted_key.ok_or("unable to stamp payload; must have decrypted data")?;

        let stamper =
            ApiKeyStamper::from_private_key_hex(&decrypted_key).map_err(|e| e.to_string())?;
        let stamp = stamper.stamp(&payload);
        let header = ApiKeyStamper::encode(&stamp).map_err(|e| e.to_string())?;

        self.session.write().signature = stamp.signature.clone();

        // Dieser Wert gehört als X-Stamp-Header an eigene API-Requests
        tracing::info!("X-Stamp: {}", header);
        Ok(stamp.signature)
    }

    /// Fragt die Identität des entschlüsselten API-Keys ab
    pub async fn handle_whoami(&self) -> Result<WhoamiResponse, String> {
        let decrypted_key = { self.session.read().decrypted_key.clone() };
        let decrypted_key = decrypted_key.ok_or("unable to get whoami; must have decrypted data")?;

        let stamper =
            ApiKeyStamper::from_private_key_hex(&decrypted_key).map_err(|e| e.to_string())?;
        let client = ApiClient::new(self.config.api_url.clone(), stamper);

        let response = client
            .get_whoami(&self.config.organization_id)
            .await
            .map_err(|e| e.to_string())?;

        {
            let mut session = self.session.write();
            session.organization_id = response.organization_id.clone();
            session.user_id = response.user_id.clone();
        }

        if let Some(name) = &response.organization_name {
            tracing::info!("Organization: {}", name);
        }
        if let Some(name) = &response.username {
            tracing::info!("User: {}", name);
        }

        Ok(response)
    }

    /// Erzeugt ein Demo-Bundle: frischer API-Key, verschlüsselt an den
    /// aktuellen Embedded Key, und legt es ins Bundle-Eingabefeld
    pub async fn handle_mint_bundle(&self) -> Result<String, String> {
        let public_key = {
            let session = self.session.read();
            session
                .embedded_key
                .as_ref()
                .map(|k| k.public_key_uncompressed_hex())
        };
        let public_key = public_key.ok_or("No embedded key available")?;

        let api_key = KeyPair::generate();
        let bundle =
            bundle::seal(&api_key.private_key_bytes(), &public_key).map_err(|e| e.to_string())?;

        tracing::info!("Minted demo bundle for API key {}", api_key.public_key_hex());

        self.session.write().credential_bundle = bundle.clone();
        Ok(bundle)
    }
}

// ============================================================================
// SCREEN
// ============================================================================

/// Gibt den Session-Zustand aus (die "Text-Anzeigen" des Screens)
fn print_screen(state: &AppState) {
    let session = state.session();
    println!();
    println!("Embedded Key:      {}", session.public_key);
    println!("Credential Bundle: {}", session.credential_bundle);
    println!("Payload:           {}", session.payload);
    println!(
        "Decrypted Key:     {}",
        session.decrypted_key.unwrap_or_default()
    );
    println!("Signature:         {}", session.signature);
    println!("Organization ID:   {}", session.organization_id);
    println!("User ID:           {}", session.user_id);
    println!();
}

fn print_help() {
    println!("Befehle:");
    println!("  generate          neuen Embedded Key erzeugen");
    println!("  bundle <text>     Credential-Bundle ins Eingabefeld legen");
    println!("  inject [bundle]   Bundle speichern und entschlüsseln");
    println!("  payload <text>    Payload ins Eingabefeld legen");
    println!("  stamp [payload]   Payload signieren");
    println!("  whoami            Identität des API-Keys abfragen");
    println!("  mint              Demo-Bundle für den Embedded Key erzeugen");
    println!("  clear             Vault und Session zurücksetzen");
    println!("  status            Zustand anzeigen");
    println!("  quit              beenden");
}

/// Interaktiver Modus: eine Aktion pro Zeile, Zustand nach jeder Aktion
async fn interactive_screen(state: &AppState) -> anyhow::Result<()> {
    println!("Email Authentication");
    print_help();
    print_screen(state);

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let (command, rest) = match input.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (input, ""),
        };

        // Fehler werden nur geloggt; der Zustand bleibt dann unverändert
        match command {
            "generate" => {
                if let Err(e) = state.handle_generate_key().await {
                    tracing::error!("Error generating key: {}", e);
                }
            }
            "bundle" => state.set_credential_bundle(rest.to_string()),
            "inject" => {
                if !rest.is_empty() {
                    state.set_credential_bundle(rest.to_string());
                }
                if let Err(e) = state.handle_inject_bundle().await {
                    tracing::error!("Error injecting bundle: {}", e);
                }
            }
            "payload" => state.set_payload(rest.to_string()),
            "stamp" => {
                if !rest.is_empty() {
                    state.set_payload(rest.to_string());
                }
                if let Err(e) = state.handle_stamp_payload().await {
                    tracing::error!("Error stamping payload: {}", e);
                }
            }
            "whoami" => {
                if let Err(e) = state.handle_whoami().await {
                    tracing::error!("Error fetching whoami: {}", e);
                }
            }
            "mint" => {
                if let Err(e) = state.handle_mint_bundle().await {
                    tracing::error!("Error minting bundle: {}", e);
                }
            }
            "clear" => {
                if let Err(e) = state.handle_clear_storage().await {
                    tracing::error!("Error clearing storage: {}", e);
                }
            }
            "status" => {}
            "help" => print_help(),
            "quit" | "exit" => break,
            other => println!("Unbekannter Befehl: {}", other),
        }

        print_screen(state);
    }

    Ok(())
}

// ============================================================================
// ONE-SHOT COMMANDS
// ============================================================================

/// Stellt für One-Shot-Kommandos sicher, dass das gespeicherte Bundle
/// injiziert wurde (Session-Speicher überlebt den Prozess nicht)
async fn ensure_bundle_injected(state: &AppState) -> Result<(), String> {
    let (has_decrypted, has_bundle) = {
        let session = state.session.read();
        (
            session.decrypted_key.is_some(),
            !session.credential_bundle.is_empty(),
        )
    };

    if has_decrypted || !has_bundle {
        return Ok(());
    }

    tracing::info!("Re-injecting stored credential bundle");
    state.handle_inject_bundle().await.map(|_| ())
}

async fn run_command(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Generate => {
            let public_key = state.handle_generate_key().await.map_err(anyhow::Error::msg)?;
            println!("{}", public_key);
        }
        Command::Inject { bundle } => {
            if let Some(bundle) = bundle {
                state.set_credential_bundle(bundle);
            }
            let decrypted_key = state
                .handle_inject_bundle()
                .await
                .map_err(anyhow::Error::msg)?;
            println!("{}", decrypted_key);
        }
        Command::Stamp { payload } => {
            ensure_bundle_injected(state).await.map_err(anyhow::Error::msg)?;
            state.set_payload(payload);
            let signature = state
                .handle_stamp_payload()
                .await
                .map_err(anyhow::Error::msg)?;
            println!("{}", signature);
        }
        Command::Whoami => {
            ensure_bundle_injected(state).await.map_err(anyhow::Error::msg)?;
            let response = state.handle_whoami().await.map_err(anyhow::Error::msg)?;
            println!("Organization ID: {}", response.organization_id);
            println!("User ID:         {}", response.user_id);
        }
        Command::Mint => {
            let bundle = state.handle_mint_bundle().await.map_err(anyhow::Error::msg)?;
            println!("{}", bundle);
        }
        Command::Clear => {
            state
                .handle_clear_storage()
                .await
                .map_err(anyhow::Error::msg)?;
        }
        Command::Status => print_screen(state),
    }

    Ok(())
}

// ============================================================================
// APP RUNNER
// ============================================================================

/// Startet die Anwendung
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default API URL (kann über Umgebungsvariablen überschrieben werden)
    let api_url = cli.api_url.clone().unwrap_or_else(|| {
        std::env::var("TURNKEY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string())
    });
    let organization_id = cli
        .organization_id
        .clone()
        .or_else(|| std::env::var("TURNKEY_ORGANIZATION_ID").ok())
        .unwrap_or_default();

    let config = Config {
        api_url,
        organization_id,
    };

    let state = AppState::init(config, cli.data_dir.as_deref()).map_err(anyhow::Error::msg)?;

    if let Err(e) = state.load_stored_data().await {
        tracing::error!("Error loading stored data: {}", e);
    }

    match cli.command {
        Some(command) => run_command(&state, command).await,
        None => interactive_screen(&state).await,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::{Signature, VerifyingKey};

    #[tokio::test]
    async fn test_load_generates_key_when_missing() {
        let state = AppState::init_in_memory();

        state.load_stored_data().await.unwrap();

        // Private Key liegt im Vault, Public Key in der Session
        let stored = state.vault.get(EMBEDDED_KEY).unwrap().unwrap();
        assert_eq!(stored.len(), 64);

        let session = state.session();
        assert!(session.embedded_key.is_some());
        assert_eq!(session.public_key.len(), 130);
    }

    #[tokio::test]
    async fn test_load_reuses_stored_key() {
        let state = AppState::init_in_memory();
        let keypair = KeyPair::generate();

        state
            .vault
            .set(EMBEDDED_KEY, &keypair.private_key_hex())
            .unwrap();

        state.load_stored_data().await.unwrap();

        // Kein neuer Key; der abgeleitete Public Key passt zum gespeicherten
        let stored = state.vault.get(EMBEDDED_KEY).unwrap().unwrap();
        assert_eq!(stored, keypair.private_key_hex());
        assert_eq!(
            state.session().public_key,
            keypair.public_key_uncompressed_hex()
        );
    }

    #[tokio::test]
    async fn test_load_prefills_stored_bundle() {
        let state = AppState::init_in_memory();
        state.vault.set(CREDENTIAL_BUNDLE, "stored-bundle").unwrap();

        state.load_stored_data().await.unwrap();

        let session = state.session();
        assert_eq!(session.credential_bundle, "stored-bundle");
        // Nur ins Eingabefeld geladen, nicht entschlüsselt
        assert_eq!(session.decrypted_key, None);
    }

    #[tokio::test]
    async fn test_generate_key_public_matches_stored() {
        let state = AppState::init_in_memory();

        let public_key = state.handle_generate_key().await.unwrap();

        let stored = state.vault.get(EMBEDDED_KEY).unwrap().unwrap();
        let restored = KeyPair::from_private_key_hex(&stored).unwrap();
        assert_eq!(restored.public_key_uncompressed_hex(), public_key);
    }

    #[tokio::test]
    async fn test_inject_bundle_roundtrip() {
        let state = AppState::init_in_memory();
        state.load_stored_data().await.unwrap();

        // Fixture: bekannter API-Key, an den Embedded Key verschlüsselt
        let api_key = KeyPair::generate();
        let bundle =
            bundle::seal(&api_key.private_key_bytes(), &state.session().public_key).unwrap();

        state.set_credential_bundle(bundle.clone());
        let decrypted_key = state.handle_inject_bundle().await.unwrap();

        assert_eq!(decrypted_key, api_key.private_key_hex());
        assert_eq!(
            state.session().decrypted_key,
            Some(api_key.private_key_hex())
        );
        assert_eq!(
            state.vault.get(CREDENTIAL_BUNDLE).unwrap(),
            Some(bundle)
        );
    }

    #[tokio::test]
    async fn test_inject_with_wrong_key_sets_nothing() {
        let state = AppState::init_in_memory();
        state.load_stored_data().await.unwrap();

        // Bundle für einen fremden Embedded Key
        let other = KeyPair::generate();
        let api_key = KeyPair::generate();
        let bundle = bundle::seal(
            &api_key.private_key_bytes(),
            &other.public_key_uncompressed_hex(),
        )
        .unwrap();

        state.set_credential_bundle(bundle.clone());
        assert!(state.handle_inject_bundle().await.is_err());

        // Kein Klartext in der Session; das Bundle selbst wurde persistiert
        assert_eq!(state.session().decrypted_key, None);
        assert_eq!(state.vault.get(CREDENTIAL_BUNDLE).unwrap(), Some(bundle));
    }

    #[tokio::test]
    async fn test_stamp_without_injection_is_noop() {
        let state = AppState::init_in_memory();
        state.load_stored_data().await.unwrap();

        state.set_payload("hello".to_string());
        let result = state.handle_stamp_payload().await;

        assert!(result.is_err());
        assert!(result.unwrap_err().contains("must have decrypted data"));
        assert_eq!(state.session().signature, "");
    }

    #[tokio::test]
    async fn test_stamp_after_inject_verifies() {
        let state = AppState::init_in_memory();
        state.load_stored_data().await.unwrap();

        // generate → mint → inject → stamp "hello"
        state.handle_mint_bundle().await.unwrap();
        let decrypted_key = state.handle_inject_bundle().await.unwrap();

        state.set_payload("hello".to_string());
        let signature_hex = state.handle_stamp_payload().await.unwrap();
        assert!(!signature_hex.is_empty());

        // Signatur gegen den aus dem Klartext abgeleiteten Public Key prüfen
        let api_key = KeyPair::from_private_key_hex(&decrypted_key).unwrap();
        let verifying_key = VerifyingKey::from(&api_key.public_key());
        let signature = Signature::from_der(&hex::decode(&signature_hex).unwrap()).unwrap();

        assert!(verifying_key.verify(b"hello".as_slice(), &signature).is_ok());
        assert_eq!(state.session().signature, signature_hex);
    }

    #[tokio::test]
    async fn test_whoami_guard_without_injection() {
        let state = AppState::init_in_memory();
        state.load_stored_data().await.unwrap();

        let result = state.handle_whoami().await;

        assert!(result.unwrap_err().contains("must have decrypted data"));
        let session = state.session();
        assert_eq!(session.organization_id, "");
        assert_eq!(session.user_id, "");
    }

    #[tokio::test]
    async fn test_clear_storage_resets_everything() {
        let state = AppState::init_in_memory();
        state.load_stored_data().await.unwrap();

        state.handle_mint_bundle().await.unwrap();
        state.handle_inject_bundle().await.unwrap();

        state.handle_clear_storage().await.unwrap();

        assert_eq!(state.vault.get(EMBEDDED_KEY).unwrap(), None);
        assert_eq!(state.vault.get(CREDENTIAL_BUNDLE).unwrap(), None);

        let session = state.session();
        assert!(session.embedded_key.is_none());
        assert_eq!(session.public_key, "");
        assert_eq!(session.credential_bundle, "");
        assert_eq!(session.decrypted_key, None);
        assert_eq!(session.signature, "");

        // Nächster Start generiert wieder einen frischen Key
        state.load_stored_data().await.unwrap();
        assert!(state.session().embedded_key.is_some());
    }

    #[tokio::test]
    async fn test_mint_requires_embedded_key() {
        let state = AppState::init_in_memory();

        let result = state.handle_mint_bundle().await;
        assert!(result.unwrap_err().contains("No embedded key"));
    }
}

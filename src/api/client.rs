//! HTTP Client für die Turnkey Query API
//!
//! Schickt gestempelte Requests an die HTTPS-API:
//! - Request-Body als kanonischer JSON-String
//! - `X-Stamp`-Header signiert über exakt diese Body-Bytes
//! - Fehler-Antworten werden als Status + Body durchgereicht

use thiserror::Error;

use super::messages::{WhoamiRequest, WhoamiResponse};
use super::stamper::{ApiKeyStamper, StamperError, STAMP_HEADER};

/// Pfad der Whoami-Abfrage
const WHOAMI_PATH: &str = "/public/v1/query/whoami";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to stamp request: {0}")]
    Stamp(#[from] StamperError),

    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
}

// ============================================================================
// API CLIENT
// ============================================================================

/// Client für gestempelte API-Requests
pub struct ApiClient {
    base_url: String,
    stamper: ApiKeyStamper,
    http: reqwest::Client,
}

impl ApiClient {
    /// Erstellt einen neuen Client
    ///
    /// `base_url` ohne trailing Slash, z.B. `https://api.turnkey.com`.
    pub fn new(base_url: String, stamper: ApiKeyStamper) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            stamper,
            http: reqwest::Client::new(),
        }
    }

    /// Fragt die Identität des API-Keys ab
    pub async fn get_whoami(&self, organization_id: &str) -> Result<WhoamiResponse, ApiError> {
        let request = WhoamiRequest::new(organization_id.to_string());

        // Der Stamp muss über exakt die Bytes gehen, die auf den Draht gehen
        let body = serde_json::to_string(&request)?;
        let stamp = self.stamper.stamp_header(&body)?;

        let url = format!("{}{}", self.base_url, WHOAMI_PATH);
        tracing::debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header(STAMP_HEADER, stamp)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<WhoamiResponse>().await?)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_base_url_normalization() {
        let stamper = ApiKeyStamper::new(KeyPair::generate());
        let client = ApiClient::new("https://api.turnkey.com/".to_string(), stamper);

        assert_eq!(client.base_url, "https://api.turnkey.com");
    }
}

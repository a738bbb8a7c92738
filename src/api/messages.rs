//! Message Types für die Turnkey Query API
//!
//! Diese Strukturen spiegeln die JSON-Definitionen der HTTP-API wider
//! und ermöglichen typsichere Kommunikation. Feldnamen auf dem Draht
//! sind camelCase.

use serde::{Deserialize, Serialize};

/// Signatur-Schema-Kennung für P-256 API-Keys
pub const SIGNATURE_SCHEME: &str = "SIGNATURE_SCHEME_TK_API_P256";

// ============================================================================
// CLIENT → SERVER MESSAGES
// ============================================================================

/// Whoami-Abfrage
///
/// Die Organization-ID darf auch die Parent-Org einer Sub-Org sein; das
/// reicht dem Server, um die Identität des API-Keys aufzulösen.
#[derive(Debug, Clone, Serialize)]
pub struct WhoamiRequest {
    #[serde(rename = "organizationId")]
    pub organization_id: String,
}

impl WhoamiRequest {
    pub fn new(organization_id: String) -> Self {
        Self { organization_id }
    }
}

/// Stamp-Envelope: wird base64url-codiert als `X-Stamp`-Header mitgeschickt
#[derive(Debug, Clone, Serialize)]
pub struct ApiStamp {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    pub scheme: &'static str,
    pub signature: String,
}

impl ApiStamp {
    pub fn new(public_key: String, signature: String) -> Self {
        Self {
            public_key,
            scheme: SIGNATURE_SCHEME,
            signature,
        }
    }
}

// ============================================================================
// SERVER → CLIENT MESSAGES
// ============================================================================

/// Whoami-Antwort
#[derive(Debug, Clone, Deserialize)]
pub struct WhoamiResponse {
    #[serde(rename = "organizationId")]
    pub organization_id: String,

    #[serde(rename = "organizationName")]
    pub organization_name: Option<String>,

    #[serde(rename = "userId")]
    pub user_id: String,

    pub username: Option<String>,
}

// ============================================================================
// TESTS
// ============================================================================

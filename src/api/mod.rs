//! API Module - Gestempelte HTTP-Requests
//!
//! Dieses Modul verwaltet die Kommunikation mit der Turnkey API:
//! - Request-Bodies signieren (Stamping)
//! - Whoami-Abfrage über HTTPS
//! - Typsichere Wire-Formate
//!

mod client;
mod messages;
mod stamper;

pub use client::{ApiClient, ApiError};
pub use messages::{ApiStamp, WhoamiRequest, WhoamiResponse, SIGNATURE_SCHEME};
pub use stamper::{ApiKeyStamper, StamperError, STAMP_HEADER};

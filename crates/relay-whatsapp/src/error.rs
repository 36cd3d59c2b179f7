//! Error types for relay-whatsapp

use thiserror::Error;

/// relay-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("Webhook verification failed")]
    WebhookVerificationFailed,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid Graph API response: {0}")]
    InvalidResponse(String),

    #[error("Server error: {0}")]
    Server(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;

//! Error types for `crm-bridge-tools`.

use thiserror::Error;

/// Main error type for resolving, building, sending and normalizing CRM requests.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Missing or invalid connection settings (base URL, credentials) or an invalid catalog.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller-supplied options out of bounds (pagination, write without body, bad option types).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The CRM answered with a non-success status or a payload we cannot read.
    ///
    /// `status` is the HTTP status when one was received; `message` preserves the CRM's text.
    #[error("Upstream error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Connection-level failures (DNS, TLS, timeouts). Messages never carry credentials.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Upstream status code, when the CRM answered at all.
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            message: format!("malformed CRM payload: {}", message.into()),
        }
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

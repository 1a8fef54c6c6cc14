//! Reconciliation error types

use thiserror::Error;

/// Reconciliation errors
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The parent collection answered 404 while fetching existing state.
    #[error("Not provisioned: {0}")]
    NotProvisioned(String),

    #[error("Remote call failed: {}", describe_remote(.status, .message))]
    Remote {
        /// HTTP-like status code reported by the remote, if any
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed entry: {0}")]
    MalformedEntry(String),

    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReconcileError {
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Numeric status code carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotProvisioned(_) => Some(404),
            Self::Remote { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the remote reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

fn describe_remote(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("{} ({})", message, code),
        None => message.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

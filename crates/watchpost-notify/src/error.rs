//! Notification error types.

use thiserror::Error;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NotifyError {
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    /// Whether a later attempt could succeed. Callers do not retry today; this
    /// only shapes log severity.
    pub fn is_transient(&self) -> bool {
        match self {
            NotifyError::Network(_) => true,
            NotifyError::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

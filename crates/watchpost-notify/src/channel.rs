//! Notification channel abstraction.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use watchpost_models::TemporaryReference;

use crate::error::NotifyResult;

/// Provider-assigned identifier of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sends one alert message to one recipient.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(
        &self,
        reference: &TemporaryReference,
        recipient: &str,
        label: &str,
    ) -> NotifyResult<MessageId>;

    /// Channel name for logging.
    fn name(&self) -> &'static str;
}

/// Message body sent for a detected class.
pub fn alert_body(label: &str) -> String {
    format!("Detected equipment: {}.", label)
}

/// Channel that only logs, used when no provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn notify(
        &self,
        reference: &TemporaryReference,
        recipient: &str,
        label: &str,
    ) -> NotifyResult<MessageId> {
        info!(
            recipient = %recipient,
            label = %label,
            url = %reference.url,
            body = %alert_body(label),
            "Alert notification (log channel)"
        );
        Ok(MessageId::new(format!("log-{}", reference.key)))
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

//! Twilio Messages API channel with WhatsApp addressing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use watchpost_models::TemporaryReference;

use crate::channel::{alert_body, MessageId, NotificationChannel};
use crate::error::{NotifyError, NotifyResult};

const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

/// Configuration for the Twilio client.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number, without the `whatsapp:` prefix
    pub from: String,
    /// API base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl TwilioConfig {
    /// Create config from environment variables.
    ///
    /// Returns `NotConfigured` when the account credentials or sender are missing.
    pub fn from_env() -> NotifyResult<Self> {
        let required = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| NotifyError::not_configured(format!("{} not set", name)))
        };

        Ok(Self {
            account_sid: required("TWILIO_ACCOUNT_SID")?,
            auth_token: required("TWILIO_AUTH_TOKEN")?,
            from: required("TWILIO_FROM")?,
            base_url: std::env::var("TWILIO_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("TWILIO_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            ),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: String,
}

/// Sends WhatsApp messages through Twilio.
pub struct TwilioChannel {
    http: Client,
    config: TwilioConfig,
}

impl TwilioChannel {
    pub fn new(config: TwilioConfig) -> NotifyResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(NotifyError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> NotifyResult<Self> {
        Self::new(TwilioConfig::from_env()?)
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.base_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

/// Normalize a phone number to `whatsapp:+<digits>`.
pub fn whatsapp_address(number: &str) -> NotifyResult<String> {
    let digits: String = number
        .trim()
        .trim_start_matches("whatsapp:")
        .chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-' | '(' | ')'))
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(NotifyError::InvalidRecipient(number.to_string()));
    }
    Ok(format!("whatsapp:+{}", digits))
}

#[async_trait]
impl NotificationChannel for TwilioChannel {
    async fn notify(
        &self,
        reference: &TemporaryReference,
        recipient: &str,
        label: &str,
    ) -> NotifyResult<MessageId> {
        let to = whatsapp_address(recipient)?;
        let from = whatsapp_address(&self.config.from)?;
        let body = alert_body(label);

        debug!(to = %to, label = %label, "Sending WhatsApp alert");

        let form = [
            ("From", from.as_str()),
            ("To", to.as_str()),
            ("Body", body.as_str()),
            ("MediaUrl", reference.url.as_str()),
        ];

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            warn!(status = status.as_u16(), to = %to, "Twilio rejected message: {}", message);
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let parsed: MessageResponse = serde_json::from_str(&text)
            .map_err(|e| NotifyError::InvalidResponse(format!("{}: {}", e, text)))?;

        Ok(MessageId::new(parsed.sid))
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}

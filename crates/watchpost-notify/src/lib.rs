//! Alert notification channels.
//!
//! This crate provides:
//! - The `NotificationChannel` trait
//! - A Twilio WhatsApp channel
//! - A log-only fallback channel

pub mod channel;
pub mod error;
pub mod twilio;

pub use channel::{alert_body, LogChannel, MessageId, NotificationChannel};
pub use error::{NotifyError, NotifyResult};
pub use twilio::{whatsapp_address, TwilioChannel, TwilioConfig};

#[cfg(any(test, feature = "test-util"))]
pub use channel::MockNotificationChannel;

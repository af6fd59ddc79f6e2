//! References to stored artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-limited, externally fetchable reference to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryReference {
    /// Object key in the store
    pub key: String,
    /// Presigned URL
    pub url: String,
    /// When the URL stops working
    pub expires_at: DateTime<Utc>,
}

impl TemporaryReference {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

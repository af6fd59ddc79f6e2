//! Artifact store used by the alert dispatcher.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use watchpost_models::TemporaryReference;

use crate::client::S3Client;
use crate::error::{StorageError, StorageResult};

/// Stores binary artifacts and returns a time-limited reference.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn store(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        ttl: Duration,
    ) -> StorageResult<TemporaryReference>;
}

/// Random object key keeping the extension of the content type.
pub fn artifact_key(content_type: &str) -> String {
    format!("{}{}", Uuid::new_v4(), extension_for(content_type))
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        _ => "",
    }
}

/// Artifact store backed by an S3 bucket with presigned GET URLs.
#[derive(Clone)]
pub struct S3ArtifactStore {
    client: S3Client,
}

impl S3ArtifactStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &S3Client {
        &self.client
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn store(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        ttl: Duration,
    ) -> StorageResult<TemporaryReference> {
        let key = artifact_key(content_type);
        let size = bytes.len();

        self.client.upload_bytes(bytes, &key, content_type).await?;
        let url = self.client.presign_get(&key, ttl).await?;

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::presign_failed(e.to_string()))?;

        info!(key = %key, bytes = size, bucket = %self.client.bucket(), "Stored artifact");
        Ok(TemporaryReference {
            key,
            url,
            expires_at: Utc::now() + ttl,
        })
    }
}

//! S3-compatible artifact storage.
//!
//! This crate provides:
//! - `S3Client` for AWS S3, Cloudflare R2 or MinIO
//! - The `ArtifactStore` trait and its S3 implementation (upload + presigned URL)

pub mod client;
pub mod error;
pub mod store;

pub use client::{S3Client, S3Config, DEFAULT_URL_TTL};
pub use error::{StorageError, StorageResult};
pub use store::{artifact_key, ArtifactStore, S3ArtifactStore};

#[cfg(any(test, feature = "test-util"))]
pub use store::MockArtifactStore;

// SPDX-License-Identifier: MIT
use std::path::Path;

use async_trait::async_trait;

/// Metadata describing a remote file, as reported by the storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub mime_type: String,
    pub size_bytes: u64,
}

/// External collaborator that materializes remote attachment content.
///
/// Concrete implementations (S3, GCS, a local fixture for tests, ...) live
/// outside this crate; `loom-attachments` only consumes the trait.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn get_file_metadata(&self, file_id: &str) -> anyhow::Result<FileMetadata>;

    /// Download `file_id`'s bytes to `dest_path`. Implementations should
    /// write atomically (the cache itself downloads to a `.tmp` path and
    /// renames, so a non-atomic write here is still safe as long as it
    /// either fully succeeds or leaves `dest_path` absent).
    async fn download_file(&self, file_id: &str, dest_path: &Path) -> anyhow::Result<()>;

    async fn get_signed_url(&self, file_id: &str, expiry_seconds: Option<u64>) -> anyhow::Result<String>;
}

pub mod local;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage for uploaded document files.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store raw bytes under `key`.
    async fn upload_bytes(&self, data: &[u8], key: &str) -> Result<(), StorageError>;

    /// Read a stored file back.
    async fn download_file(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Return the provider name for logs.
    fn provider_name(&self) -> &str;
}

/// Storage key for an upload: `{owner}/{blob_id}/{filename}`.
pub fn blob_key(owner: &str, blob_id: &str, filename: &str) -> String {
    let filename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    format!("{owner}/{blob_id}/{filename}")
}

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Blob storage provider trait.
/// Implementations are bound to one bucket (or directory) at construction.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `name`, overwriting any existing blob
    async fn put(&self, name: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Remove the blob stored under `name`; a missing blob is not an error
    async fn delete(&self, name: &str) -> Result<()>;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}

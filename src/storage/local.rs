use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

/// Local file system storage provider
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Blob names are flat; anything that could escape the base directory is refused
    fn get_full_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(AppError::Storage(format!("Invalid blob name: {}", name)));
        }
        Ok(self.base_path.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn put(&self, name: &str, data: Bytes, _content_type: &str) -> Result<()> {
        let full_path = self.get_full_path(name)?;

        fs::create_dir_all(&self.base_path).await?;

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!("Saved blob to {:?}", full_path);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let full_path = self.get_full_path(name)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!("Deleted blob {:?}", full_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete blob: {}", e))),
        }
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}

pub mod gcs;
pub mod local;
pub mod provider;

#[cfg(test)]
pub mod testing;

pub use gcs::*;
pub use local::*;
pub use provider::*;

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;

use crate::config::{StorageConfig, StorageProviderKind};
use crate::error::{AppError, Result};

/// Length of generated blob names
pub const BLOB_NAME_LEN: usize = 10;

/// Image storage: a blob provider plus the public URL scheme of its bucket
#[derive(Clone)]
pub struct ImageStore {
    provider: Arc<dyn BlobStore>,
    public_base_url: String,
}

impl ImageStore {
    pub fn new(provider: Arc<dyn BlobStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            provider,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the configured provider
    pub fn from_config(config: &StorageConfig) -> Self {
        let provider: Arc<dyn BlobStore> = match config.provider {
            StorageProviderKind::Gcs => {
                Arc::new(GcsStorage::new(&config.bucket, &config.access_token))
            }
            StorageProviderKind::Local => Arc::new(LocalStorage::new(&config.local_path)),
        };
        tracing::info!("Image storage: {}", provider.storage_type());
        Self::new(provider, &config.public_base_url)
    }

    /// Fresh random blob name; collisions are not checked
    pub fn random_name() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(BLOB_NAME_LEN)
            .map(char::from)
            .collect()
    }

    /// Public URL of a stored blob
    pub fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.public_base_url, name)
    }

    /// Recover the blob name from a URL produced by `public_url`
    pub fn blob_name_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.public_base_url)?
            .strip_prefix('/')
            .filter(|name| !name.is_empty())
    }

    /// Decode an image payload without touching the bucket
    pub fn decode(image_base64: &str) -> Result<DecodedImage> {
        DecodedImage::parse(image_base64)
    }

    /// Store an already decoded image under `name`
    pub async fn upload(&self, name: &str, image: DecodedImage) -> Result<()> {
        let content_type = image.content_type_for(name);
        self.provider.put(name, image.data, &content_type).await
    }

    /// Upload under a fresh random name and return the resulting public URL
    pub async fn upload_new(&self, image: DecodedImage) -> Result<String> {
        let name = Self::random_name();
        self.upload(&name, image).await?;
        Ok(self.public_url(&name))
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.provider.delete(name).await
    }
}

/// Image bytes decoded from a request payload
#[derive(Debug, Clone)]
pub struct DecodedImage {
    data: Bytes,
    declared_type: Option<String>,
}

impl DecodedImage {
    /// Decode a plain or `data:<mime>;base64,` payload
    fn parse(payload: &str) -> Result<Self> {
        let payload = payload.trim();
        let (declared_type, encoded) = match payload.strip_prefix("data:") {
            Some(rest) => {
                let (meta, data) = rest
                    .split_once(',')
                    .ok_or_else(|| AppError::Storage("Malformed data URL".to_string()))?;
                let mime = meta.strip_suffix(";base64").unwrap_or(meta);
                ((!mime.is_empty()).then(|| mime.to_string()), data)
            }
            None => (None, payload),
        };

        let data = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AppError::Storage(format!("Invalid base64 image: {}", e)))?;

        Ok(Self {
            data: Bytes::from(data),
            declared_type,
        })
    }

    /// The data URL type, else a guess from the blob name, else octet-stream
    fn content_type_for(&self, name: &str) -> String {
        self.declared_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(name)
                .first_or_octet_stream()
                .to_string()
        })
    }
}

//! Google Cloud Storage provider
//!
//! Talks to the GCS JSON API directly over HTTPS:
//! - media upload: `POST /upload/storage/v1/b/<bucket>/o?uploadType=media&name=<name>`
//! - delete: `DELETE /storage/v1/b/<bucket>/o/<name>`
//!
//! Requests carry an OAuth bearer token, either configured statically or
//! fetched from the GCE metadata server and cached until shortly before expiry.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

const API_BASE: &str = "https://storage.googleapis.com/storage/v1";
const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

// Refresh this long before the metadata token actually expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

enum TokenSource {
    Static(String),
    Metadata(RwLock<Option<CachedToken>>),
}

/// Google Cloud Storage provider bound to one bucket
pub struct GcsStorage {
    http: reqwest::Client,
    bucket: String,
    token: TokenSource,
}

impl GcsStorage {
    /// Create a provider; an empty `access_token` selects the metadata server
    pub fn new(bucket: impl Into<String>, access_token: &str) -> Self {
        let token = if access_token.trim().is_empty() {
            TokenSource::Metadata(RwLock::new(None))
        } else {
            TokenSource::Static(access_token.trim().to_string())
        };
        Self {
            http: reqwest::Client::new(),
            bucket: bucket.into(),
            token,
        }
    }

    fn upload_url(&self, name: &str) -> String {
        format!(
            "{}/b/{}/o?uploadType=media&name={}",
            UPLOAD_BASE,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(name)
        )
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "{}/b/{}/o/{}",
            API_BASE,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(name)
        )
    }

    async fn access_token(&self) -> Result<String> {
        let cache = match &self.token {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Metadata(cache) => cache,
        };

        if let Some(cached) = cache.read().await.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let mut guard = cache.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let res = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(AppError::Storage(format!(
                "Metadata token request failed: [{}]",
                res.status()
            )));
        }
        let token: MetadataToken = res.json().await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *guard = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::debug!("Refreshed GCS access token, valid for {:?}", lifetime);

        Ok(token.access_token)
    }
}

#[async_trait]
impl BlobStore for GcsStorage {
    async fn put(&self, name: &str, data: Bytes, content_type: &str) -> Result<()> {
        let token = self.access_token().await?;
        let size = data.len();

        let res = self
            .http
            .post(self.upload_url(name))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "GCS upload failed: [{}] {}",
                status, body
            )));
        }

        tracing::info!(
            "Uploaded to GCS: gs://{}/{} ({} bytes)",
            self.bucket,
            name,
            size
        );
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let token = self.access_token().await?;

        let res = self
            .http
            .delete(self.object_url(name))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("GCS object already gone: gs://{}/{}", self.bucket, name);
            return Ok(());
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "GCS delete failed: [{}] {}",
                status, body
            )));
        }

        tracing::info!("Deleted from GCS: gs://{}/{}", self.bucket, name);
        Ok(())
    }

    fn storage_type(&self) -> &'static str {
        "gcs"
    }
}

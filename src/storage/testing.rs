//! In-process blob store for tests

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

/// Keeps blobs in memory and records every call
#[derive(Default)]
pub struct RecordingStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingStore {
    /// Make every subsequent call fail with a storage error
    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(name).cloned()
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Storage("bucket unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for RecordingStore {
    async fn put(&self, name: &str, data: Bytes, _content_type: &str) -> Result<()> {
        self.check()?;
        self.uploads.lock().unwrap().push(name.to_string());
        self.blobs.lock().unwrap().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.check()?;
        self.deletes.lock().unwrap().push(name.to_string());
        self.blobs.lock().unwrap().remove(name);
        Ok(())
    }

    fn storage_type(&self) -> &'static str {
        "recording"
    }
}

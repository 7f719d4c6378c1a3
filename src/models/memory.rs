use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Memory model
#[derive(Debug, Clone, FromRow)]
pub struct Memory {
    pub id: i64,
    pub uid: String,
    pub title: String,
    pub content: String,
    pub date: NaiveDate,
    pub image_url: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Memory as returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryResponse {
    pub id: i64,
    pub uid: String,
    pub title: String,
    pub content: String,
    pub date: NaiveDate,
    pub image_url: String,
    /// Input-only field, always emitted empty
    pub image_base64: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Memory> for MemoryResponse {
    fn from(memory: Memory) -> Self {
        Self {
            id: memory.id,
            uid: memory.uid,
            title: memory.title,
            content: memory.content,
            date: memory.date,
            image_url: memory.image_url,
            image_base64: String::new(),
            created_at: memory.created_at,
            updated_at: memory.updated_at,
        }
    }
}

/// Create / update request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub image_base64: String,
}

impl MemoryPayload {
    /// Take the image payload out of the request, leaving it empty
    pub fn take_image(&mut self) -> Option<String> {
        let image = std::mem::take(&mut self.image_base64);
        if image.is_empty() {
            None
        } else {
            Some(image)
        }
    }

    /// Persistable fields, paired with the resolved image URL
    pub fn into_draft(self, image_url: String) -> MemoryDraft {
        MemoryDraft {
            title: self.title,
            content: self.content,
            date: self.date,
            image_url,
        }
    }
}

/// Fields written by create and update
#[derive(Debug, Clone)]
pub struct MemoryDraft {
    pub title: String,
    pub content: String,
    pub date: NaiveDate,
    pub image_url: String,
}

/// List query parameters
#[derive(Debug, Default, Deserialize)]
pub struct MemoryQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

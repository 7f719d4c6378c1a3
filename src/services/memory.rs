use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Memory, MemoryDraft};

/// Year / month narrowing for memory listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Memory repository. Every lookup is scoped by owner id as well as row id.
pub struct MemoryService;

impl MemoryService {
    /// Insert a new memory for `uid`
    pub async fn create(db: &Database, uid: &str, draft: MemoryDraft) -> Result<Memory> {
        let now = Utc::now().to_rfc3339();

        let id = sqlx::query(
            r#"
            INSERT INTO memories (uid, title, content, date, image_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uid)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(draft.date)
        .bind(&draft.image_url)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await?
        .last_insert_rowid();

        Self::find_one(db, id, uid)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Memory {} vanished after insert", id)))
    }

    /// List the owner's memories, newest date first
    pub async fn find_many(db: &Database, uid: &str, filter: DateFilter) -> Result<Vec<Memory>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM memories WHERE uid = ");
        query.push_bind(uid);

        if let Some(year) = filter.year {
            query
                .push(" AND strftime('%Y', date) = ")
                .push_bind(format!("{:04}", year));
        }
        if let Some(month) = filter.month {
            query
                .push(" AND strftime('%m', date) = ")
                .push_bind(format!("{:02}", month));
        }

        query.push(" ORDER BY date DESC, id DESC");

        let memories = query
            .build_query_as::<Memory>()
            .fetch_all(db.pool())
            .await?;
        Ok(memories)
    }

    /// Look up a memory by id, visible only to its owner
    pub async fn find_one(db: &Database, id: i64, uid: &str) -> Result<Option<Memory>> {
        let memory = sqlx::query_as("SELECT * FROM memories WHERE id = ? AND uid = ?")
            .bind(id)
            .bind(uid)
            .fetch_optional(db.pool())
            .await?;
        Ok(memory)
    }

    /// Replace the mutable fields of an owned memory
    pub async fn update(db: &Database, id: i64, uid: &str, draft: MemoryDraft) -> Result<Memory> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE memories
            SET title = ?, content = ?, date = ?, image_url = ?, updated_at = ?
            WHERE id = ? AND uid = ?
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(draft.date)
        .bind(&draft.image_url)
        .bind(&now)
        .bind(id)
        .bind(uid)
        .execute(db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFoundOrNotOwner);
        }

        Self::find_one(db, id, uid)
            .await?
            .ok_or(AppError::NotFoundOrNotOwner)
    }

    /// Remove an owned memory
    pub async fn delete(db: &Database, id: i64, uid: &str) -> Result<()> {
        sqlx::query("DELETE FROM memories WHERE id = ? AND uid = ?")
            .bind(id)
            .bind(uid)
            .execute(db.pool())
            .await?;
        Ok(())
    }
}

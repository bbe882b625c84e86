//! # Sync Queue Repository
//!
//! The upload outbox: finalized records wait here until the remote system
//! acknowledges them.
//!
//! ## Guarantees
//! - An entry is written in the same transaction that finalizes its record
//!   (see `RecordRepository::finalize`), so neither exists without the other.
//! - Entries are NEVER deleted on upload failure; only `is_uploaded` flips,
//!   and only after a positive acknowledgment naming the `document_id`.
//! - `mark_uploaded` is idempotent: the second call is a no-op, not an error.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use meridian_core::{RecordKind, SyncQueueEntry};

/// Repository for sync-queue operations.
#[derive(Debug, Clone)]
pub struct SyncQueueRepository {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct QueueRow {
    document_id: String,
    kind: String,
    payload: String,
    is_uploaded: bool,
    attempts: i64,
    last_error: Option<String>,
    queued_at: DateTime<Utc>,
    uploaded_at: Option<DateTime<Utc>>,
}

impl QueueRow {
    fn into_entry(self) -> StoreResult<SyncQueueEntry> {
        let kind = RecordKind::parse(&self.kind).ok_or_else(|| StoreError::CorruptRow {
            entity: "sync_queue".to_string(),
            id: self.document_id.clone(),
            reason: format!("unknown kind '{}'", self.kind),
        })?;
        Ok(SyncQueueEntry {
            document_id: self.document_id,
            kind,
            payload: self.payload,
            is_uploaded: self.is_uploaded,
            attempts: self.attempts,
            last_error: self.last_error,
            queued_at: self.queued_at,
            uploaded_at: self.uploaded_at,
        })
    }
}

impl SyncQueueRepository {
    /// Creates a new SyncQueueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncQueueRepository { pool }
    }

    /// Entries still waiting for acknowledgment, oldest first, optionally
    /// filtered by flow kind.
    pub async fn list_unuploaded(
        &self,
        kind: Option<RecordKind>,
        limit: u32,
    ) -> StoreResult<Vec<SyncQueueEntry>> {
        let rows: Vec<QueueRow> = match kind {
            Some(kind) => {
                sqlx::query_as(
                    r#"
                    SELECT document_id, kind, payload, is_uploaded, attempts, last_error,
                           queued_at, uploaded_at
                    FROM sync_queue
                    WHERE is_uploaded = 0 AND kind = ?1
                    ORDER BY queued_at ASC
                    LIMIT ?2
                    "#,
                )
                .bind(kind.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT document_id, kind, payload, is_uploaded, attempts, last_error,
                           queued_at, uploaded_at
                    FROM sync_queue
                    WHERE is_uploaded = 0
                    ORDER BY queued_at ASC
                    LIMIT ?1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(QueueRow::into_entry).collect()
    }

    /// Looks up a single queue entry.
    pub async fn find(&self, document_id: &str) -> StoreResult<Option<SyncQueueEntry>> {
        let row: Option<QueueRow> = sqlx::query_as(
            r#"
            SELECT document_id, kind, payload, is_uploaded, attempts, last_error,
                   queued_at, uploaded_at
            FROM sync_queue
            WHERE document_id = ?1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QueueRow::into_entry).transpose()
    }

    /// Marks an entry as uploaded after a positive acknowledgment.
    ///
    /// Idempotent: `uploaded_at` is kept from the first call and calling
    /// again is a no-op. An unknown `document_id` is `NotFound` - that is a
    /// programming error, not a retry case.
    pub async fn mark_uploaded(&self, document_id: &str) -> StoreResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sync_queue SET
                is_uploaded = 1,
                uploaded_at = COALESCE(uploaded_at, ?2)
            WHERE document_id = ?1
            "#,
        )
        .bind(document_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("sync_queue entry", document_id));
        }

        debug!(document_id = %document_id, "queue entry marked uploaded");
        Ok(())
    }

    /// Records a failed upload attempt. The entry stays in the queue.
    pub async fn mark_failed(&self, document_id: &str, error: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_queue SET
                attempts = attempts + 1,
                last_error = ?2
            WHERE document_id = ?1
            "#,
        )
        .bind(document_id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts entries still waiting for acknowledgment.
    pub async fn count_unuploaded(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE is_uploaded = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

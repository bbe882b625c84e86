//! # Transaction Record Repository
//!
//! Persistence for transaction records and their manifest lines.
//!
//! ## Record Lifecycle in Storage
//! ```text
//! save(draft/open/scanning/pending)  - upsert header + full line rewrite,
//!                                      one transaction
//! finalize(record)                   - header + lines + sync_queue entry,
//!                                      ONE transaction (outbox pattern:
//!                                      the record can never be final
//!                                      without its queue entry, or vice
//!                                      versa)
//! mark_status_uploaded(document_id)  - Final -> Uploaded after remote ack
//! reset(document_id)                 - explicit abandon before Final
//! purge_uploaded(document_id)        - explicit cleanup after upload
//! ```
//!
//! Saving under a `document_id` owned by a different session is a
//! `ConstraintViolation` unless the caller is resuming, so two sessions
//! cannot silently trample one record.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use meridian_core::matcher::{LineKey, Manifest, ManifestLine};
use meridian_core::{
    Money, RecordKind, RecordStatus, RecordSummary, TransactionRecord,
};

/// Repository for transaction-record operations.
#[derive(Debug, Clone)]
pub struct RecordRepository {
    pool: SqlitePool,
}

// =============================================================================
// Row Shapes
// =============================================================================

#[derive(Debug, FromRow)]
struct RecordRow {
    document_id: String,
    kind: String,
    status: String,
    session_id: String,
    branch: String,
    operator: String,
    note: Option<String>,
    total_lines: i64,
    lines_complete: i64,
    total_expected: i64,
    total_matched: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
    last_scanned_key: Option<String>,
}

#[derive(Debug, FromRow)]
struct LineRow {
    sku: String,
    variant: String,
    barcode: String,
    name: String,
    expected_qty: i64,
    matched_qty: i64,
    unit_price: Option<i64>,
}

impl From<LineRow> for ManifestLine {
    fn from(row: LineRow) -> Self {
        ManifestLine {
            sku: row.sku,
            variant: row.variant,
            barcode: row.barcode,
            name: row.name,
            expected_qty: row.expected_qty,
            matched_qty: row.matched_qty,
            unit_price: row.unit_price.map(Money::from_minor),
        }
    }
}

fn record_from_rows(header: RecordRow, lines: Vec<LineRow>) -> StoreResult<TransactionRecord> {
    let kind = RecordKind::parse(&header.kind).ok_or_else(|| StoreError::CorruptRow {
        entity: "transaction_record".to_string(),
        id: header.document_id.clone(),
        reason: format!("unknown kind '{}'", header.kind),
    })?;
    let status = RecordStatus::parse(&header.status).ok_or_else(|| StoreError::CorruptRow {
        entity: "transaction_record".to_string(),
        id: header.document_id.clone(),
        reason: format!("unknown status '{}'", header.status),
    })?;

    let manifest = Manifest {
        lines: lines.into_iter().map(ManifestLine::from).collect(),
        last_scanned: header
            .last_scanned_key
            .as_deref()
            .and_then(LineKey::from_storage_key),
    };

    Ok(TransactionRecord {
        document_id: header.document_id,
        kind,
        status,
        session_id: header.session_id,
        branch: header.branch,
        operator: header.operator,
        note: header.note,
        manifest,
        summary: RecordSummary {
            total_lines: header.total_lines,
            lines_complete: header.lines_complete,
            total_expected: header.total_expected,
            total_matched: header.total_matched,
        },
        created_at: header.created_at,
        updated_at: header.updated_at,
        finalized_at: header.finalized_at,
    })
}

// =============================================================================
// Repository
// =============================================================================

impl RecordRepository {
    /// Creates a new RecordRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RecordRepository { pool }
    }

    /// Upserts a record and rewrites its manifest lines in one transaction.
    ///
    /// A partially-applied save is never observable: header and lines
    /// commit together. `as_resume` permits taking over a record saved by a
    /// previous session (the resume flow); without it, a `document_id`
    /// owned by another session is a `ConstraintViolation`.
    pub async fn save(&self, record: &TransactionRecord, as_resume: bool) -> StoreResult<()> {
        self.guard_ownership(record, as_resume).await?;

        debug!(
            document_id = %record.document_id,
            status = record.status.as_str(),
            lines = record.manifest.lines.len(),
            "saving record"
        );

        let mut tx = self.pool.begin().await?;
        write_record(&mut tx, record).await?;
        tx.commit().await?;

        Ok(())
    }

    /// Loads a record with its manifest lines.
    pub async fn load(&self, document_id: &str) -> StoreResult<Option<TransactionRecord>> {
        let header: Option<RecordRow> = sqlx::query_as(
            r#"
            SELECT document_id, kind, status, session_id, branch, operator, note,
                   total_lines, lines_complete, total_expected, total_matched,
                   created_at, updated_at, finalized_at, last_scanned_key
            FROM transaction_records
            WHERE document_id = ?1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let lines: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT sku, variant, barcode, name, expected_qty, matched_qty, unit_price
            FROM manifest_lines
            WHERE document_id = ?1
            ORDER BY position
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        record_from_rows(header, lines).map(Some)
    }

    /// Loads just the manifest of a record; `NotFound` when the document
    /// doesn't exist.
    pub async fn load_manifest(&self, document_id: &str) -> StoreResult<Manifest> {
        match self.load(document_id).await? {
            Some(record) => Ok(record.manifest),
            None => Err(StoreError::not_found("manifest", document_id)),
        }
    }

    /// Writes a finalized record and its sync-queue entry in ONE
    /// transaction, so a crash cannot leave a final record that will never
    /// upload (or a queue entry with no record).
    ///
    /// The record must already be in `Final` status (the core state machine
    /// guards that transition).
    pub async fn finalize(&self, record: &TransactionRecord) -> StoreResult<()> {
        if record.status != RecordStatus::Final {
            return Err(StoreError::constraint(format!(
                "finalize requires Final status, record {} is {}",
                record.document_id,
                record.status.as_str()
            )));
        }
        self.guard_ownership(record, false).await?;

        let payload = record.to_payload()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        write_record(&mut tx, record).await?;

        // PK on document_id makes a double finalize a ConstraintViolation.
        sqlx::query(
            r#"
            INSERT INTO sync_queue (document_id, kind, payload, is_uploaded, attempts, queued_at)
            VALUES (?1, ?2, ?3, 0, 0, ?4)
            "#,
        )
        .bind(&record.document_id)
        .bind(record.kind.as_str())
        .bind(&payload)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(document_id = %record.document_id, "record finalized and queued");
        Ok(())
    }

    /// Flips a record from `Final` to `Uploaded`. Idempotent: an already
    /// uploaded record is left alone.
    pub async fn mark_status_uploaded(&self, document_id: &str) -> StoreResult<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE transaction_records
            SET status = 'uploaded', updated_at = ?2
            WHERE document_id = ?1 AND status = 'final'
            "#,
        )
        .bind(document_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Explicitly abandons a record that was never finalized. Nothing has
    /// been uploaded, so this has no remote side effects.
    pub async fn reset(&self, document_id: &str) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM transaction_records
            WHERE document_id = ?1 AND status NOT IN ('final', 'uploaded')
            "#,
        )
        .bind(document_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::constraint(format!(
                "record {document_id} is finalized or missing; reset refused"
            )));
        }

        debug!(document_id = %document_id, "record reset");
        Ok(())
    }

    /// Explicitly purges a record after a confirmed upload. Refused while
    /// the queue entry is still unuploaded - purging then would silently
    /// lose data the remote system never received.
    pub async fn purge_uploaded(&self, document_id: &str) -> StoreResult<()> {
        let uploaded: Option<bool> =
            sqlx::query_scalar("SELECT is_uploaded FROM sync_queue WHERE document_id = ?1")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?;

        match uploaded {
            None => return Err(StoreError::not_found("sync_queue entry", document_id)),
            Some(false) => {
                return Err(StoreError::constraint(format!(
                    "record {document_id} has not been uploaded; purge refused"
                )))
            }
            Some(true) => {}
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sync_queue WHERE document_id = ?1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        // Manifest lines cascade.
        sqlx::query("DELETE FROM transaction_records WHERE document_id = ?1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(document_id = %document_id, "uploaded record purged");
        Ok(())
    }

    /// Lists document ids by kind and status (screens resume from here).
    pub async fn list_by_status(
        &self,
        kind: RecordKind,
        status: RecordStatus,
    ) -> StoreResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT document_id FROM transaction_records
            WHERE kind = ?1 AND status = ?2
            ORDER BY updated_at DESC
            "#,
        )
        .bind(kind.as_str())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn guard_ownership(&self, record: &TransactionRecord, as_resume: bool) -> StoreResult<()> {
        let owner: Option<String> =
            sqlx::query_scalar("SELECT session_id FROM transaction_records WHERE document_id = ?1")
                .bind(&record.document_id)
                .fetch_optional(&self.pool)
                .await?;

        if let Some(owner) = owner {
            if owner != record.session_id && !as_resume {
                return Err(StoreError::constraint(format!(
                    "document {} is owned by session {}, not {}",
                    record.document_id, owner, record.session_id
                )));
            }
        }
        Ok(())
    }
}

/// Upserts the header and rewrites all manifest lines inside the caller's
/// transaction.
async fn write_record(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    record: &TransactionRecord,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transaction_records (
            document_id, kind, status, session_id, branch, operator, note,
            total_lines, lines_complete, total_expected, total_matched,
            created_at, updated_at, finalized_at, last_scanned_key
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        ON CONFLICT (document_id) DO UPDATE SET
            kind = excluded.kind,
            status = excluded.status,
            session_id = excluded.session_id,
            branch = excluded.branch,
            operator = excluded.operator,
            note = excluded.note,
            total_lines = excluded.total_lines,
            lines_complete = excluded.lines_complete,
            total_expected = excluded.total_expected,
            total_matched = excluded.total_matched,
            updated_at = excluded.updated_at,
            finalized_at = excluded.finalized_at,
            last_scanned_key = excluded.last_scanned_key
        "#,
    )
    .bind(&record.document_id)
    .bind(record.kind.as_str())
    .bind(record.status.as_str())
    .bind(&record.session_id)
    .bind(&record.branch)
    .bind(&record.operator)
    .bind(&record.note)
    .bind(record.summary.total_lines)
    .bind(record.summary.lines_complete)
    .bind(record.summary.total_expected)
    .bind(record.summary.total_matched)
    .bind(record.created_at)
    .bind(record.updated_at)
    .bind(record.finalized_at)
    .bind(
        record
            .manifest
            .last_scanned
            .as_ref()
            .map(|k| k.as_storage_key()),
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM manifest_lines WHERE document_id = ?1")
        .bind(&record.document_id)
        .execute(&mut **tx)
        .await?;

    for (position, line) in record.manifest.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO manifest_lines (
                document_id, line_key, position, sku, variant, barcode, name,
                expected_qty, matched_qty, unit_price
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&record.document_id)
        .bind(line.key().as_storage_key())
        .bind(position as i64)
        .bind(&line.sku)
        .bind(&line.variant)
        .bind(&line.barcode)
        .bind(&line.name)
        .bind(line.expected_qty)
        .bind(line.matched_qty)
        .bind(line.unit_price.map(|p| p.minor()))
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

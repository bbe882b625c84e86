//! # Reconciliation Session
//!
//! Orchestrates one unit of work: allocate a document id, load (or build) a
//! manifest, feed scan events through the matcher, checkpoint to the store,
//! resume after a restart, finalize into the sync queue.
//!
//! ## Session Flow
//! ```text
//! ReconcileSession::begin ──► Draft record saved
//!         │ attach_manifest / open_free_scan
//!         ▼
//!        Open ──► scan()* ──► Scanning        (in memory, ordered)
//!         │                      │
//!         │                      ├── save_progress() ──► Pending (durable)
//!         │                      │        ▲
//!         │                      │        └── resume() after restart
//!         │                      └── finalize() ──► Final + queue entry
//!         └── abandon() at any point before Final
//! ```
//!
//! Scans are applied strictly in the order received - each scan's outcome
//! can depend on the state the previous one left. Store I/O happens only at
//! the labelled points; scanning itself never awaits.

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::pool::Store;
use crate::repository::sequence::SequenceScope;
use meridian_core::input::parse_scan_input;
use meridian_core::matcher::{LineKey, Manifest, MatchPolicy, ScanOutcome};
use meridian_core::types::{
    RecordKind, RecordStatus, RecordSummary, ReferenceCatalog, TransactionRecord,
};

/// A live reconciliation session over one transaction record.
///
/// Holds the manifest in memory between checkpoints; the store is the
/// single owner of durable state.
#[derive(Debug)]
pub struct ReconcileSession {
    store: Store,
    policy: MatchPolicy,
    catalog: ReferenceCatalog,
    record: TransactionRecord,
}

impl ReconcileSession {
    /// Starts a new session: allocates a document id for the scope and
    /// saves a durable draft.
    pub async fn begin(
        store: Store,
        kind: RecordKind,
        scope: &SequenceScope,
        policy: MatchPolicy,
        catalog: ReferenceCatalog,
    ) -> StoreResult<Self> {
        let document_id = store.sequences().allocate(kind, scope).await?;
        let session_id = Uuid::new_v4().to_string();

        let record = TransactionRecord::new(
            &document_id,
            kind,
            &session_id,
            &scope.branch,
            &scope.operator,
        );
        store.records().save(&record, false).await?;

        info!(document_id = %document_id, kind = kind.as_str(), "session started");

        Ok(ReconcileSession {
            store,
            policy,
            catalog,
            record,
        })
    }

    /// Attaches an expected manifest (fetched remotely or built locally)
    /// and moves the record to `Open`.
    pub async fn attach_manifest(&mut self, manifest: Manifest) -> StoreResult<()> {
        self.record.transition(RecordStatus::Open)?;
        self.record.manifest = manifest;
        self.record.refresh_summary();
        self.store.records().save(&self.record, false).await?;

        debug!(
            document_id = %self.record.document_id,
            lines = self.record.manifest.lines.len(),
            "manifest attached"
        );
        Ok(())
    }

    /// Opens the session in free-scan mode: an empty manifest that grows a
    /// line per distinct barcode scanned.
    pub async fn open_free_scan(&mut self) -> StoreResult<()> {
        self.attach_manifest(Manifest::default()).await
    }

    /// Resumes a pending record saved by an earlier session (possibly
    /// before an app restart). Reproduces the exact matched state that was
    /// checkpointed.
    pub async fn resume(
        store: Store,
        document_id: &str,
        policy: MatchPolicy,
        catalog: ReferenceCatalog,
    ) -> StoreResult<Self> {
        let mut record = store
            .records()
            .load(document_id)
            .await?
            .ok_or_else(|| StoreError::not_found("record", document_id))?;

        if !record.status.is_mutable() {
            return Err(StoreError::constraint(format!(
                "record {document_id} is {}; it cannot be resumed",
                record.status.as_str()
            )));
        }

        // The resuming session takes ownership under a fresh identity.
        record.session_id = Uuid::new_v4().to_string();
        if record.status == RecordStatus::Pending {
            record.transition(RecordStatus::Scanning)?;
        }
        store.records().save(&record, true).await?;

        info!(document_id = %document_id, "session resumed");

        Ok(ReconcileSession {
            store,
            policy,
            catalog,
            record,
        })
    }

    /// Feeds one raw scan input (barcode or `count*barcode`) through the
    /// matcher. Pure in-memory work - rejections and warnings come back as
    /// values and the scanning loop never unwinds.
    pub fn scan(&mut self, raw_input: &str) -> ScanOutcome {
        let event = match parse_scan_input(raw_input) {
            Ok(event) => event,
            Err(err) => {
                debug!(input = raw_input, %err, "scan input rejected");
                return ScanOutcome::Rejected(meridian_core::matcher::RejectReason::InvalidInput {
                    reason: err.to_string(),
                });
            }
        };

        let outcome = self
            .record
            .manifest
            .apply_scan(&event, &self.policy, &self.catalog);

        if outcome.accepted() {
            // First accepted scan moves Open -> Scanning; scanning on after
            // a checkpoint moves Pending -> Scanning. Both are always legal.
            if matches!(self.record.status, RecordStatus::Open | RecordStatus::Pending) {
                let _ = self.record.transition(RecordStatus::Scanning);
            }
            self.record.refresh_summary();
        }

        outcome
    }

    /// Explicit correction: reduces a line's matched quantity by 1, floored
    /// at 0.
    pub fn decrement(&mut self, key: &LineKey) -> i64 {
        let remaining = self.record.manifest.decrement_line(key);
        self.record.refresh_summary();
        remaining
    }

    /// Durable checkpoint: persists the record as `Pending` so the device
    /// can be closed and the session resumed later without losing progress.
    pub async fn save_progress(&mut self) -> StoreResult<()> {
        self.record.transition(RecordStatus::Pending)?;
        self.record.refresh_summary();
        self.store.records().save(&self.record, false).await?;

        info!(
            document_id = %self.record.document_id,
            matched = self.record.summary.total_matched,
            "progress checkpointed"
        );
        Ok(())
    }

    /// The irreversible commit: moves the record to `Final` and writes it
    /// plus its sync-queue entry in one transaction. After this, the record
    /// must eventually sync or be explicitly purged - never silently
    /// dropped.
    pub async fn finalize(mut self) -> StoreResult<TransactionRecord> {
        self.record.transition(RecordStatus::Final)?;
        self.record.refresh_summary();
        self.store.records().finalize(&self.record).await?;

        info!(
            document_id = %self.record.document_id,
            matched = self.record.summary.total_matched,
            expected = self.record.summary.total_expected,
            "record finalized"
        );
        Ok(self.record)
    }

    /// Abandons the session before finalization. Nothing was uploaded, so
    /// there are no remote side effects.
    pub async fn abandon(self) -> StoreResult<()> {
        self.store.records().reset(&self.record.document_id).await
    }

    /// Current reconciliation totals.
    pub fn summary(&self) -> RecordSummary {
        self.record.summary
    }

    /// The record being worked on.
    pub fn record(&self) -> &TransactionRecord {
        &self.record
    }

    /// Lines in recency-biased display order (most recent scan first).
    pub fn display_lines(&self) -> Vec<&meridian_core::matcher::ManifestLine> {
        self.record.manifest.display_order()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

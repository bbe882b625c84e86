//! # Sync Coordinator
//!
//! Moves `Final` records to `Uploaded` exactly once, tolerating partial and
//! total failures, and runs the download-side refreshes.
//!
//! ## Upload Pass
//! ```text
//! 1. Poll:   list_unuploaded(kind, batch_size)   - uploaded entries are
//!                                                  filtered out here, which
//!                                                  is what makes repeated
//!                                                  passes safe
//! 2. Skip:   entries past max_attempts (logged, retained)
//! 3. Send:   gateway.submit(document_id, payload) per document
//! 4. Mark:   Ack naming the id -> mark_uploaded + record -> Uploaded
//!            Reject/transport  -> attempts+1, last_error, entry retained
//! 5. Report: SyncReport { uploaded, failed } - a batch summary, never
//!            silently swallowed
//! ```
//!
//! The unit of atomicity is one document: a failure is recorded and the
//! pass moves on, so one bad document never blocks or reverts the others.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{DocumentRef, RemoteGateway, SubmitOutcome};
use meridian_core::input::validate_reference_item;
use meridian_core::matcher::Manifest;
use meridian_core::{RecordKind, ReferenceDomain};
use meridian_store::Store;

// =============================================================================
// Sync Report
// =============================================================================

/// Why one document failed to upload. Transport trouble and remote
/// refusal retry the same way but must read differently to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadFailure {
    /// Network/server unreachable.
    Transport(String),
    /// The remote system validated and refused; reason verbatim.
    Rejected(String),
    /// Acknowledgment named a different document; nothing was marked.
    AckMismatch { acknowledged: String },
}

/// One failed document in a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub document_id: String,
    pub failure: UploadFailure,
}

/// Batch summary of one `sync_pending` pass.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Document ids acknowledged and marked uploaded this pass.
    pub uploaded: Vec<String>,
    /// Documents that stay queued for the next pass.
    pub failed: Vec<FailedUpload>,
    /// Entries skipped because they exceeded the attempt ceiling.
    pub skipped: Vec<String>,
}

impl SyncReport {
    /// True when nothing was pending.
    pub fn is_empty(&self) -> bool {
        self.uploaded.is_empty() && self.failed.is_empty() && self.skipped.is_empty()
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Coordinates uploads and reference downloads between the local store and
/// a remote gateway.
pub struct SyncCoordinator {
    store: Store,
    gateway: Arc<dyn RemoteGateway>,
    config: SyncConfig,
}

impl SyncCoordinator {
    /// Creates a coordinator over an injected store handle and gateway.
    pub fn new(store: Store, gateway: Arc<dyn RemoteGateway>, config: SyncConfig) -> Self {
        SyncCoordinator {
            store,
            gateway,
            config,
        }
    }

    /// Uploads pending documents, optionally restricted to one flow kind.
    ///
    /// Safe to call repeatedly: entries already marked uploaded never leave
    /// the store again, and a pass with nothing pending is a cheap no-op.
    pub async fn sync_pending(&self, kind: Option<RecordKind>) -> SyncResult<SyncReport> {
        let entries = self
            .store
            .sync_queue()
            .list_unuploaded(kind, self.config.sync.batch_size)
            .await?;

        if entries.is_empty() {
            debug!("no pending documents");
            return Ok(SyncReport::default());
        }

        info!(count = entries.len(), "starting upload pass");
        let mut report = SyncReport::default();

        for entry in entries {
            if entry.attempts >= self.config.sync.max_attempts {
                warn!(
                    document_id = %entry.document_id,
                    attempts = entry.attempts,
                    "entry exceeded attempt ceiling; skipping this pass"
                );
                report.skipped.push(entry.document_id);
                continue;
            }

            match self.upload_one(&entry.document_id, &entry.payload).await {
                Ok(()) => report.uploaded.push(entry.document_id),
                Err(err) => {
                    let failure = match err {
                        SyncError::RemoteReject { reason, .. } => UploadFailure::Rejected(reason),
                        SyncError::AckMismatch { acknowledged, .. } => {
                            UploadFailure::AckMismatch { acknowledged }
                        }
                        other => UploadFailure::Transport(other.to_string()),
                    };
                    let message = match &failure {
                        UploadFailure::Transport(msg) => format!("transport: {msg}"),
                        UploadFailure::Rejected(reason) => format!("rejected: {reason}"),
                        UploadFailure::AckMismatch { acknowledged } => {
                            format!("ack named {acknowledged}")
                        }
                    };
                    self.store
                        .sync_queue()
                        .mark_failed(&entry.document_id, &message)
                        .await?;
                    report.failed.push(FailedUpload {
                        document_id: entry.document_id,
                        failure,
                    });
                }
            }
        }

        info!(
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "upload pass complete"
        );
        Ok(report)
    }

    /// Uploads one specific document right now (the "upload now" button).
    ///
    /// Already-uploaded documents are a no-op. Failures are recorded on the
    /// queue entry exactly as in a batch pass, then surfaced typed:
    /// `RemoteReject` with the verbatim reason, `Transport`, `AckMismatch`.
    pub async fn sync_document(&self, document_id: &str) -> SyncResult<()> {
        let entry = self
            .store
            .sync_queue()
            .find(document_id)
            .await?
            .ok_or_else(|| {
                SyncError::Store(meridian_store::StoreError::not_found(
                    "sync_queue entry",
                    document_id,
                ))
            })?;

        if entry.is_uploaded {
            debug!(document_id = %document_id, "already uploaded; nothing to do");
            return Ok(());
        }

        match self.upload_one(&entry.document_id, &entry.payload).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.store
                    .sync_queue()
                    .mark_failed(document_id, &err.to_string())
                    .await?;
                Err(err)
            }
        }
    }

    /// Submits one document and commits the uploaded state only on a
    /// positive acknowledgment naming it.
    async fn upload_one(&self, document_id: &str, payload: &str) -> SyncResult<()> {
        let outcome = self.gateway.submit(document_id, payload).await?;

        match outcome {
            SubmitOutcome::Ack { document_id: acked } => {
                if acked != document_id {
                    warn!(
                        submitted = %document_id,
                        acknowledged = %acked,
                        "acknowledgment mismatch"
                    );
                    return Err(SyncError::AckMismatch {
                        submitted: document_id.to_string(),
                        acknowledged: acked,
                    });
                }

                // Queue flag first, then the record status; both are
                // idempotent, so a crash between them heals on the next
                // pass.
                self.store.sync_queue().mark_uploaded(document_id).await?;
                self.store.records().mark_status_uploaded(document_id).await?;

                debug!(document_id = %document_id, "document uploaded");
                Ok(())
            }
            SubmitOutcome::Reject { reason } => {
                debug!(document_id = %document_id, reason = %reason, "document rejected");
                Err(SyncError::RemoteReject {
                    document_id: document_id.to_string(),
                    reason,
                })
            }
        }
    }

    /// Fetches the expected manifest for a remote document reference.
    /// Any non-success collapses to `ManifestNotFound` - the caller prompts
    /// the user to re-select.
    pub async fn load_manifest_for(&self, document: &DocumentRef) -> SyncResult<Manifest> {
        match self.gateway.fetch_manifest(document).await {
            Ok(Some(payload)) => Ok(payload.into_manifest()),
            Ok(None) => Err(SyncError::ManifestNotFound {
                reference: document.reference.clone(),
            }),
            Err(err) => {
                debug!(reference = %document.reference, %err, "manifest fetch failed");
                Err(SyncError::ManifestNotFound {
                    reference: document.reference.clone(),
                })
            }
        }
    }

    /// Downloads a full reference snapshot and swaps it into the store.
    ///
    /// The swap is not touched until the complete payload has arrived AND
    /// validated - a failure anywhere leaves the previous snapshot intact.
    /// Returns the number of items stored.
    pub async fn refresh_reference(
        &self,
        domain: ReferenceDomain,
        scope_filter: &str,
    ) -> SyncResult<usize> {
        let items = self
            .gateway
            .fetch_reference_snapshot(domain, scope_filter)
            .await?;

        for item in &items {
            validate_reference_item(item).map_err(|err| {
                SyncError::SnapshotInvalid(format!(
                    "item {}/{}: {err}",
                    item.barcode, item.variant
                ))
            })?;
        }

        self.store.reference().replace_all(domain, &items).await?;

        info!(domain = %domain, count = items.len(), "reference snapshot refreshed");
        Ok(items.len())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ManifestLinePayload, ManifestPayload};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use meridian_core::{Money, RecordStatus, ReferenceItem, TransactionRecord};
    use meridian_store::{SequenceScope, Store, StoreConfig};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted gateway double: per-document outcomes plus submission
    /// counters, so tests can assert exactly what went over the wire.
    #[derive(Default)]
    struct ScriptedGateway {
        /// document_id -> scripted response
        scripts: Mutex<HashMap<String, Script>>,
        submissions: Mutex<Vec<String>>,
        manifests: Mutex<HashMap<String, ManifestPayload>>,
        snapshot: Mutex<Option<SyncResult<Vec<ReferenceItem>>>>,
    }

    enum Script {
        Ack,
        AckWrongId(String),
        Reject(String),
        Transport(String),
    }

    impl ScriptedGateway {
        fn script(&self, document_id: &str, script: Script) {
            self.scripts
                .lock()
                .unwrap()
                .insert(document_id.to_string(), script);
        }

        fn submissions(&self) -> Vec<String> {
            self.submissions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteGateway for ScriptedGateway {
        async fn fetch_manifest(
            &self,
            document: &DocumentRef,
        ) -> SyncResult<Option<ManifestPayload>> {
            Ok(self.manifests.lock().unwrap().get(&document.reference).cloned())
        }

        async fn submit(&self, document_id: &str, _payload: &str) -> SyncResult<SubmitOutcome> {
            self.submissions.lock().unwrap().push(document_id.to_string());
            match self.scripts.lock().unwrap().get(document_id) {
                Some(Script::Ack) | None => Ok(SubmitOutcome::Ack {
                    document_id: document_id.to_string(),
                }),
                Some(Script::AckWrongId(other)) => Ok(SubmitOutcome::Ack {
                    document_id: other.clone(),
                }),
                Some(Script::Reject(reason)) => Ok(SubmitOutcome::Reject {
                    reason: reason.clone(),
                }),
                Some(Script::Transport(msg)) => Err(SyncError::Transport(msg.clone())),
            }
        }

        async fn fetch_reference_snapshot(
            &self,
            _domain: ReferenceDomain,
            _scope_filter: &str,
        ) -> SyncResult<Vec<ReferenceItem>> {
            match self.snapshot.lock().unwrap().take() {
                Some(result) => result,
                None => Ok(Vec::new()),
            }
        }
    }

    fn test_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.device.branch = "JKT01".to_string();
        config.device.operator = "OP7".to_string();
        config
    }

    async fn store() -> Store {
        Store::open(StoreConfig::in_memory()).await.unwrap()
    }

    /// Creates and finalizes a record, returning its document id.
    async fn finalize_one(store: &Store) -> String {
        let scope = SequenceScope::new(
            "JKT01",
            "OP7",
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
        );
        let document_id = store
            .sequences()
            .allocate(meridian_core::RecordKind::Receiving, &scope)
            .await
            .unwrap();

        let mut record = TransactionRecord::new(
            &document_id,
            meridian_core::RecordKind::Receiving,
            "session-1",
            "JKT01",
            "OP7",
        );
        record.transition(RecordStatus::Open).unwrap();
        record.transition(RecordStatus::Final).unwrap();
        store.records().finalize(&record).await.unwrap();
        document_id
    }

    #[tokio::test]
    async fn test_partial_batch_isolation() {
        let store = store().await;
        let doc_a = finalize_one(&store).await;
        let doc_b = finalize_one(&store).await;

        let gateway = Arc::new(ScriptedGateway::default());
        gateway.script(&doc_a, Script::Transport("connection reset".into()));
        gateway.script(&doc_b, Script::Ack);

        let coordinator = SyncCoordinator::new(store.clone(), gateway, test_config());
        let report = coordinator.sync_pending(None).await.unwrap();

        // A failed, B succeeded; A's failure did not revert B.
        assert_eq!(report.uploaded, vec![doc_b.clone()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].document_id, doc_a);
        assert!(matches!(report.failed[0].failure, UploadFailure::Transport(_)));

        let pending = store.sync_queue().list_unuploaded(None, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].document_id, doc_a);
        assert!(!pending[0].is_uploaded);

        // B's record reached the global terminal state.
        let b = store.records().load(&doc_b).await.unwrap().unwrap();
        assert_eq!(b.status, RecordStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_idempotent_upload_across_passes() {
        let store = store().await;
        let doc = finalize_one(&store).await;

        let gateway = Arc::new(ScriptedGateway::default());
        let coordinator = SyncCoordinator::new(store.clone(), gateway.clone(), test_config());

        let first = coordinator.sync_pending(None).await.unwrap();
        assert_eq!(first.uploaded, vec![doc.clone()]);

        // Second pass with no intervening work: nothing is resubmitted.
        let second = coordinator.sync_pending(None).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(gateway.submissions(), vec![doc]);
    }

    #[tokio::test]
    async fn test_remote_reject_preserved_and_retried() {
        let store = store().await;
        let doc = finalize_one(&store).await;

        let gateway = Arc::new(ScriptedGateway::default());
        gateway.script(&doc, Script::Reject("document date outside period".into()));

        let coordinator = SyncCoordinator::new(store.clone(), gateway.clone(), test_config());
        let report = coordinator.sync_pending(None).await.unwrap();

        assert!(report.uploaded.is_empty());
        assert_eq!(
            report.failed[0].failure,
            UploadFailure::Rejected("document date outside period".into())
        );

        // Entry retained with the verbatim reason; record still Final.
        let pending = store.sync_queue().list_unuploaded(None, 10).await.unwrap();
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("document date outside period"));
        let record = store.records().load(&doc).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Final);

        // After correction upstream, the next pass retries and succeeds.
        gateway.script(&doc, Script::Ack);
        let retry = coordinator.sync_pending(None).await.unwrap();
        assert_eq!(retry.uploaded, vec![doc]);
    }

    #[tokio::test]
    async fn test_ack_naming_wrong_document_marks_nothing() {
        let store = store().await;
        let doc = finalize_one(&store).await;

        let gateway = Arc::new(ScriptedGateway::default());
        gateway.script(&doc, Script::AckWrongId("SOMETHING-ELSE".into()));

        let coordinator = SyncCoordinator::new(store.clone(), gateway, test_config());
        let report = coordinator.sync_pending(None).await.unwrap();

        assert!(report.uploaded.is_empty());
        assert!(matches!(
            report.failed[0].failure,
            UploadFailure::AckMismatch { .. }
        ));
        assert_eq!(store.sync_queue().count_unuploaded().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_attempt_ceiling_skips_but_retains() {
        let store = store().await;
        let doc = finalize_one(&store).await;
        for _ in 0..10 {
            store.sync_queue().mark_failed(&doc, "down").await.unwrap();
        }

        let gateway = Arc::new(ScriptedGateway::default());
        let coordinator = SyncCoordinator::new(store.clone(), gateway.clone(), test_config());
        let report = coordinator.sync_pending(None).await.unwrap();

        assert_eq!(report.skipped, vec![doc]);
        assert!(gateway.submissions().is_empty());
        // Never deleted.
        assert_eq!(store.sync_queue().count_unuploaded().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sync_document_single_upload() {
        let store = store().await;
        let doc = finalize_one(&store).await;

        let gateway = Arc::new(ScriptedGateway::default());
        gateway.script(&doc, Script::Reject("missing cost center".into()));

        let coordinator = SyncCoordinator::new(store.clone(), gateway.clone(), test_config());

        // Typed rejection with the verbatim reason; attempt recorded.
        let err = coordinator.sync_document(&doc).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteReject { .. }));
        assert!(err.to_string().contains("missing cost center"));
        let entry = store.sync_queue().find(&doc).await.unwrap().unwrap();
        assert_eq!(entry.attempts, 1);

        // Fixed upstream: succeeds, and a second call is a no-op.
        gateway.script(&doc, Script::Ack);
        coordinator.sync_document(&doc).await.unwrap();
        coordinator.sync_document(&doc).await.unwrap();
        assert_eq!(gateway.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_load_manifest_for_not_found() {
        let store = store().await;
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.manifests.lock().unwrap().insert(
            "PO-1029".to_string(),
            ManifestPayload {
                reference: "PO-1029".to_string(),
                lines: vec![ManifestLinePayload {
                    sku: "SKU-A".to_string(),
                    variant: String::new(),
                    barcode: "111".to_string(),
                    name: "Item A".to_string(),
                    expected_qty: 4,
                    unit_price: None,
                }],
            },
        );

        let coordinator = SyncCoordinator::new(store, gateway, test_config());

        let manifest = coordinator
            .load_manifest_for(&DocumentRef {
                kind: meridian_core::RecordKind::Receiving,
                reference: "PO-1029".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(manifest.lines.len(), 1);

        let err = coordinator
            .load_manifest_for(&DocumentRef {
                kind: meridian_core::RecordKind::Receiving,
                reference: "PO-9999".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ManifestNotFound { .. }));
    }

    #[tokio::test]
    async fn test_refresh_reference_failure_leaves_old_snapshot() {
        let store = store().await;
        let old = vec![ReferenceItem {
            barcode: "111".to_string(),
            sku: "OLD".to_string(),
            variant: String::new(),
            name: "Old Item".to_string(),
            list_price: Money::from_minor(1_000),
            special_price: None,
            stock_qty: None,
            category: None,
        }];
        store
            .reference()
            .replace_all(ReferenceDomain::Products, &old)
            .await
            .unwrap();

        let gateway = Arc::new(ScriptedGateway::default());
        let coordinator = SyncCoordinator::new(store.clone(), gateway.clone(), test_config());

        // Transport failure mid-download: old snapshot intact.
        *gateway.snapshot.lock().unwrap() =
            Some(Err(SyncError::Transport("connection reset".into())));
        assert!(coordinator
            .refresh_reference(ReferenceDomain::Products, "")
            .await
            .is_err());
        assert_eq!(store.reference().count(ReferenceDomain::Products).await.unwrap(), 1);

        // Invalid payload: refused before the swap, old snapshot intact.
        *gateway.snapshot.lock().unwrap() = Some(Ok(vec![ReferenceItem {
            barcode: String::new(), // invalid
            sku: "NEW".to_string(),
            variant: String::new(),
            name: "New Item".to_string(),
            list_price: Money::from_minor(2_000),
            special_price: None,
            stock_qty: None,
            category: None,
        }]));
        let err = coordinator
            .refresh_reference(ReferenceDomain::Products, "")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SnapshotInvalid(_)));
        let kept = store
            .reference()
            .find_by_barcode(ReferenceDomain::Products, "111")
            .await
            .unwrap();
        assert_eq!(kept[0].sku, "OLD");

        // A good payload finally swaps.
        *gateway.snapshot.lock().unwrap() = Some(Ok(vec![ReferenceItem {
            barcode: "222".to_string(),
            sku: "NEW".to_string(),
            variant: String::new(),
            name: "New Item".to_string(),
            list_price: Money::from_minor(2_000),
            special_price: None,
            stock_qty: None,
            category: None,
        }]));
        let stored = coordinator
            .refresh_reference(ReferenceDomain::Products, "")
            .await
            .unwrap();
        assert_eq!(stored, 1);
        assert!(store
            .reference()
            .find_by_barcode(ReferenceDomain::Products, "111")
            .await
            .unwrap()
            .is_empty());
    }
}

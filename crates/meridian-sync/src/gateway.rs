//! # Remote Gateway Seam
//!
//! The narrow boundary between the engine and the outside world. The
//! application supplies an implementation (HTTP, gRPC, a test double); the
//! engine only ever sees these canonical shapes.
//!
//! Different backend endpoints historically wrapped manifests and
//! acknowledgments in different envelopes. That adaptation belongs in the
//! gateway implementation - one canonical `ManifestPayload` and one
//! `SubmitOutcome` cross this seam, never endpoint-specific JSON.
//!
//! Each call either succeeds or fails atomically; retry backoff is the
//! transport's concern, not the engine's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use meridian_core::matcher::{Manifest, ManifestLine};
use meridian_core::{Money, RecordKind, ReferenceDomain, ReferenceItem};

// =============================================================================
// Wire Shapes
// =============================================================================

/// Reference to a remote document (the number the user keyed or scanned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: RecordKind,
    pub reference: String,
}

/// One expected line as the remote system sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestLinePayload {
    pub sku: String,
    #[serde(default)]
    pub variant: String,
    pub barcode: String,
    pub name: String,
    pub expected_qty: i64,
    #[serde(default)]
    pub unit_price: Option<i64>,
}

/// The canonical downloaded manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPayload {
    /// Remote document number this manifest belongs to.
    pub reference: String,
    pub lines: Vec<ManifestLinePayload>,
}

impl ManifestPayload {
    /// Converts the wire shape into a fresh matcher manifest
    /// (`matched_qty` starts at 0).
    pub fn into_manifest(self) -> Manifest {
        Manifest::from_expected(
            self.lines
                .into_iter()
                .map(|line| ManifestLine {
                    sku: line.sku,
                    variant: line.variant,
                    barcode: line.barcode,
                    name: line.name,
                    expected_qty: line.expected_qty,
                    matched_qty: 0,
                    unit_price: line.unit_price.map(Money::from_minor),
                })
                .collect(),
        )
    }
}

/// Result of submitting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitOutcome {
    /// The remote system accepted and recorded the document. The id MUST
    /// equal the submitted `document_id`; the coordinator refuses to mark
    /// anything uploaded otherwise.
    Ack { document_id: String },
    /// The remote system validated and refused. Surfaced to the user
    /// verbatim.
    Reject { reason: String },
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// The engine's only view of the remote system.
///
/// Implementations must make each call atomic: it either succeeds or fails
/// as a whole (an `Err` is a transport failure; a refusal is
/// `Ok(SubmitOutcome::Reject)`).
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetches the expected manifest for a document reference. `Ok(None)`
    /// when the remote system doesn't know the reference.
    async fn fetch_manifest(&self, document: &DocumentRef) -> SyncResult<Option<ManifestPayload>>;

    /// Submits one finalized document (canonical record payload).
    async fn submit(&self, document_id: &str, payload: &str) -> SyncResult<SubmitOutcome>;

    /// Fetches a full reference snapshot for a domain. `scope_filter` is an
    /// opaque server-side filter (branch, assortment, ...).
    async fn fetch_reference_snapshot(
        &self,
        domain: ReferenceDomain,
        scope_filter: &str,
    ) -> SyncResult<Vec<ReferenceItem>>;
}

// =============================================================================
// Unit Tests
// =============================================================================

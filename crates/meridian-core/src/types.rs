//! # Domain Types
//!
//! Core domain types used throughout Meridian.
//!
//! ## Type Hierarchy
//! ```text
//! ReferenceItem      - master-data snapshot row (barcode + variant identity)
//! ReferenceCatalog   - in-memory barcode index for free-scan lookups
//! TransactionRecord  - one unit of work (receiving doc, count session, sale)
//! RecordStatus       - Draft -> Open -> Scanning -> {Pending|Final} -> Uploaded
//! RecordKind         - which operational flow produced the record
//! SyncQueueEntry     - outbox row wrapping a finalized record
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Reference rows are keyed by `barcode + variant`: a barcode is the scan
//! key but is NOT unique across size variants, so the variant must be part
//! of the identity or one size silently overwrites another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::matcher::Manifest;
use crate::money::Money;

// =============================================================================
// Reference Data
// =============================================================================

/// Which master-data set a reference snapshot belongs to.
///
/// Each domain is replaced wholesale on refresh - never patched
/// field-by-field, so a half-fresh set is impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceDomain {
    Products,
    Customers,
    Accounts,
}

impl ReferenceDomain {
    /// Stable storage key for the domain.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReferenceDomain::Products => "products",
            ReferenceDomain::Customers => "customers",
            ReferenceDomain::Accounts => "accounts",
        }
    }

    /// Parses a storage key back into a domain.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "products" => Some(ReferenceDomain::Products),
            "customers" => Some(ReferenceDomain::Customers),
            "accounts" => Some(ReferenceDomain::Accounts),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReferenceDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a master-data snapshot.
///
/// Immutable from the engine's perspective; the whole set for a domain is
/// swapped on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    /// Scan key. Not unique across size variants.
    pub barcode: String,

    /// Product code.
    pub sku: String,

    /// Size/unit variant. Empty string when the item has no variants.
    pub variant: String,

    /// Display name shown on scan feedback.
    pub name: String,

    /// List price in minor units.
    pub list_price: Money,

    /// Promotional price, when one is active.
    pub special_price: Option<Money>,

    /// Stock level at snapshot time.
    pub stock_qty: Option<i64>,

    /// Category/type tag; pricing scope predicates match against this.
    pub category: Option<String>,
}

impl ReferenceItem {
    /// The price a new cart line starts from: special price when present,
    /// list price otherwise.
    #[inline]
    pub fn effective_price(&self) -> Money {
        self.special_price.unwrap_or(self.list_price)
    }
}

/// In-memory barcode index over one reference domain.
///
/// Built once per session from the store; consulted by the matcher when a
/// free-scan needs to synthesize a line for an unknown barcode. When several
/// variants share a barcode the first loaded wins - the manifest key still
/// separates them once lines exist.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    by_barcode: HashMap<String, ReferenceItem>,
}

impl ReferenceCatalog {
    /// Builds a catalog from snapshot rows.
    pub fn from_items(items: Vec<ReferenceItem>) -> Self {
        let mut by_barcode = HashMap::with_capacity(items.len());
        for item in items {
            by_barcode.entry(item.barcode.clone()).or_insert(item);
        }
        ReferenceCatalog { by_barcode }
    }

    /// An empty catalog. Free-scan against it rejects every unknown barcode,
    /// which is the right behavior for strictly manifest-bound flows.
    pub fn empty() -> Self {
        ReferenceCatalog::default()
    }

    /// Looks up an item by barcode.
    pub fn by_barcode(&self, barcode: &str) -> Option<&ReferenceItem> {
        self.by_barcode.get(barcode)
    }

    /// Number of indexed barcodes.
    pub fn len(&self) -> usize {
        self.by_barcode.len()
    }

    /// True when no items are indexed.
    pub fn is_empty(&self) -> bool {
        self.by_barcode.is_empty()
    }
}

// =============================================================================
// Record Kind
// =============================================================================

/// The operational flow a transaction record belongs to.
///
/// The same reconciliation engine drives all of them; the kind picks the
/// document-number prefix and lets sync passes filter by flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Receiving a supplier shipment against its manifest.
    Receiving,
    /// Receiving an inter-branch transfer.
    TransferIn,
    /// Receiving returned goods.
    ReturnReceiving,
    /// Packing against a request.
    Packing,
    /// Physical stock count session.
    StockCount,
    /// Point-of-sale transaction.
    Sale,
}

impl RecordKind {
    /// Document-number prefix for the sequence allocator.
    pub const fn prefix(&self) -> &'static str {
        match self {
            RecordKind::Receiving => "RCV",
            RecordKind::TransferIn => "TRF",
            RecordKind::ReturnReceiving => "RTN",
            RecordKind::Packing => "PCK",
            RecordKind::StockCount => "CNT",
            RecordKind::Sale => "SLS",
        }
    }

    /// Stable storage key.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Receiving => "receiving",
            RecordKind::TransferIn => "transfer_in",
            RecordKind::ReturnReceiving => "return_receiving",
            RecordKind::Packing => "packing",
            RecordKind::StockCount => "stock_count",
            RecordKind::Sale => "sale",
        }
    }

    /// Parses a storage key back into a kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "receiving" => Some(RecordKind::Receiving),
            "transfer_in" => Some(RecordKind::TransferIn),
            "return_receiving" => Some(RecordKind::ReturnReceiving),
            "packing" => Some(RecordKind::Packing),
            "stock_count" => Some(RecordKind::StockCount),
            "sale" => Some(RecordKind::Sale),
            _ => None,
        }
    }
}

// =============================================================================
// Record Status
// =============================================================================

/// Lifecycle of a transaction record.
///
/// `Pending` is a durable checkpoint the device can resume from; `Final` is
/// the user's irreversible commit; `Uploaded` is set only after a positive
/// remote acknowledgment naming the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Created, no manifest yet.
    Draft,
    /// Manifest loaded (or free-scan mode entered).
    Open,
    /// Scan events applied.
    Scanning,
    /// Durable mid-work checkpoint.
    Pending,
    /// User committed; terminal locally.
    Final,
    /// Remote acknowledged receipt; terminal globally.
    Uploaded,
}

impl RecordStatus {
    /// Stable storage key.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Draft => "draft",
            RecordStatus::Open => "open",
            RecordStatus::Scanning => "scanning",
            RecordStatus::Pending => "pending",
            RecordStatus::Final => "final",
            RecordStatus::Uploaded => "uploaded",
        }
    }

    /// Parses a storage key back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(RecordStatus::Draft),
            "open" => Some(RecordStatus::Open),
            "scanning" => Some(RecordStatus::Scanning),
            "pending" => Some(RecordStatus::Pending),
            "final" => Some(RecordStatus::Final),
            "uploaded" => Some(RecordStatus::Uploaded),
            _ => None,
        }
    }

    /// State machine guard.
    ///
    /// `Pending <-> Scanning` may loop indefinitely (device closed and
    /// reopened); there is no transition out of `Uploaded` and none out of
    /// `Final` except `Uploaded`.
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, next),
            (Draft, Open)
                | (Open, Scanning)
                | (Open, Pending)
                | (Open, Final)
                | (Scanning, Scanning)
                | (Scanning, Pending)
                | (Scanning, Final)
                | (Pending, Scanning)
                | (Pending, Final)
                | (Final, Uploaded)
        )
    }

    /// True for statuses a session may still mutate.
    pub fn is_mutable(&self) -> bool {
        !matches!(self, RecordStatus::Final | RecordStatus::Uploaded)
    }
}

impl Default for RecordStatus {
    fn default() -> Self {
        RecordStatus::Draft
    }
}

// =============================================================================
// Record Summary
// =============================================================================

/// Denormalized reconciliation totals, recomputed on every mutation.
///
/// Never a source of truth - the manifest lines are; this is what screens
/// and the remote system read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub total_lines: i64,
    /// Lines where `matched_qty == expected_qty` exactly - both under- and
    /// over-receipt keep a line incomplete so discrepancy stays visible.
    pub lines_complete: i64,
    pub total_expected: i64,
    pub total_matched: i64,
}

// =============================================================================
// Transaction Record
// =============================================================================

/// A unit of work: a receiving document, a stock-count session, a sale.
///
/// Owns its manifest. Serialization of this struct is the canonical upload
/// payload for every flow; boundary adapters that need another shape live
/// outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Locally-allocated document identifier (see the sequence allocator).
    pub document_id: String,
    pub kind: RecordKind,
    pub status: RecordStatus,

    /// Identity of the session that owns this record. Saving under a
    /// different session is a constraint violation unless resuming.
    pub session_id: String,

    pub branch: String,
    pub operator: String,

    /// Free-text note attached by the operator.
    pub note: Option<String>,

    /// The expected-vs-matched line state.
    pub manifest: Manifest,

    /// Recomputed by [`TransactionRecord::refresh_summary`] after every
    /// manifest mutation.
    pub summary: RecordSummary,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    /// Creates a new draft record with an empty manifest.
    pub fn new(
        document_id: impl Into<String>,
        kind: RecordKind,
        session_id: impl Into<String>,
        branch: impl Into<String>,
        operator: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        TransactionRecord {
            document_id: document_id.into(),
            kind,
            status: RecordStatus::Draft,
            session_id: session_id.into(),
            branch: branch.into(),
            operator: operator.into(),
            note: None,
            manifest: Manifest::default(),
            summary: RecordSummary::default(),
            created_at: now,
            updated_at: now,
            finalized_at: None,
        }
    }

    /// Moves the record to `next`, guarding against illegal jumps.
    pub fn transition(&mut self, next: RecordStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next == RecordStatus::Final {
            self.finalized_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Recomputes the denormalized summary from the manifest.
    pub fn refresh_summary(&mut self) {
        self.summary = self.manifest.summary();
        self.updated_at = Utc::now();
    }

    /// Serializes the canonical upload payload.
    pub fn to_payload(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes a canonical payload back into a record.
    pub fn from_payload(payload: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

// =============================================================================
// Sync Queue Entry
// =============================================================================

/// An entry in the upload queue.
///
/// Wraps a finalized record. Never deleted by the engine on failure: only
/// `is_uploaded` flips, and only after a positive acknowledgment naming this
/// exact `document_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    pub document_id: String,
    pub kind: RecordKind,

    /// Canonical record payload captured at finalize time.
    pub payload: String,

    pub is_uploaded: bool,

    /// Number of upload attempts so far.
    pub attempts: i64,

    /// Last failure message, for the operator.
    pub last_error: Option<String>,

    pub queued_at: DateTime<Utc>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(barcode: &str, sku: &str) -> ReferenceItem {
        ReferenceItem {
            barcode: barcode.to_string(),
            sku: sku.to_string(),
            variant: String::new(),
            name: sku.to_string(),
            list_price: Money::from_minor(1000),
            special_price: None,
            stock_qty: Some(10),
            category: None,
        }
    }

    #[test]
    fn test_effective_price_prefers_special() {
        let mut it = item("111", "A");
        assert_eq!(it.effective_price().minor(), 1000);
        it.special_price = Some(Money::from_minor(900));
        assert_eq!(it.effective_price().minor(), 900);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = ReferenceCatalog::from_items(vec![item("111", "A"), item("222", "B")]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.by_barcode("111").unwrap().sku, "A");
        assert!(catalog.by_barcode("999").is_none());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            RecordStatus::Draft,
            RecordStatus::Open,
            RecordStatus::Scanning,
            RecordStatus::Pending,
            RecordStatus::Final,
            RecordStatus::Uploaded,
        ] {
            assert_eq!(RecordStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            RecordKind::Receiving,
            RecordKind::TransferIn,
            RecordKind::ReturnReceiving,
            RecordKind::Packing,
            RecordKind::StockCount,
            RecordKind::Sale,
        ] {
            assert_eq!(RecordKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_transition_guard() {
        let mut record =
            TransactionRecord::new("RCV-X-Y-20260101-0001", RecordKind::Receiving, "s1", "X", "Y");
        record.transition(RecordStatus::Open).unwrap();
        record.transition(RecordStatus::Scanning).unwrap();
        record.transition(RecordStatus::Pending).unwrap();
        record.transition(RecordStatus::Scanning).unwrap();
        record.transition(RecordStatus::Final).unwrap();
        assert!(record.finalized_at.is_some());

        // Final is terminal locally; scanning again is forbidden.
        let err = record.transition(RecordStatus::Scanning).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatusTransition { .. }));

        record.transition(RecordStatus::Uploaded).unwrap();
        assert!(record.transition(RecordStatus::Final).is_err());
    }

    #[test]
    fn test_payload_round_trip() {
        let record =
            TransactionRecord::new("CNT-X-Y-20260101-0001", RecordKind::StockCount, "s1", "X", "Y");
        let payload = record.to_payload().unwrap();
        let parsed = TransactionRecord::from_payload(&payload).unwrap();
        assert_eq!(parsed.document_id, record.document_id);
        assert_eq!(parsed.kind, RecordKind::StockCount);
    }
}

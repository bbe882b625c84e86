//! # Manifest Matcher
//!
//! Folds barcode scan events into an expected-quantity manifest and reports
//! the outcome of every scan.
//!
//! ## Matching Flow
//! ```text
//! ScanEvent { barcode, quantity_delta }
//!      │
//!      ▼
//! line with that barcode in the manifest?
//!      ├── yes ──► would exceed expected_qty?
//!      │            ├── no ───────────────► Matched
//!      │            ├── yes + Reject ─────► Rejected(OverageRejected)
//!      │            └── yes + Warn ───────► OverageWarning (still counted)
//!      └── no ───► mode?
//!                   ├── ManifestBound ────► Rejected(NotInDocument)
//!                   └── FreeScan ─────────► catalog hit?
//!                                            ├── yes ► NewFreeLine (expected 0)
//!                                            └── no ─► Rejected(UnknownBarcode)
//! ```
//!
//! Every outcome is a value. Rejections are expected, frequent, and must not
//! unwind the scanning loop, so nothing here returns `Err`.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{RecordSummary, ReferenceCatalog, ReferenceItem};
use crate::MAX_MANIFEST_LINES;

// =============================================================================
// Line Key
// =============================================================================

/// Identity of a manifest line: `sku + variant`.
///
/// The barcode is the scan key but not the identity - two size variants may
/// share a barcode, and each keeps its own line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub sku: String,
    pub variant: String,
}

impl LineKey {
    pub fn new(sku: impl Into<String>, variant: impl Into<String>) -> Self {
        LineKey {
            sku: sku.into(),
            variant: variant.into(),
        }
    }

    /// Stable composite key for storage (`sku#variant`).
    pub fn as_storage_key(&self) -> String {
        format!("{}#{}", self.sku, self.variant)
    }

    /// Parses a storage key written by [`LineKey::as_storage_key`].
    pub fn from_storage_key(key: &str) -> Option<Self> {
        let (sku, variant) = key.split_once('#')?;
        Some(LineKey::new(sku, variant))
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.variant.is_empty() {
            write!(f, "{}", self.sku)
        } else {
            write!(f, "{} ({})", self.sku, self.variant)
        }
    }
}

// =============================================================================
// Manifest Line
// =============================================================================

/// One expected line item in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLine {
    pub sku: String,
    pub variant: String,
    pub barcode: String,

    /// Display name snapshot - scan feedback must not depend on a catalog
    /// being loaded.
    pub name: String,

    /// Quantity the document expects. 0 for ad-hoc free-scan lines.
    pub expected_qty: i64,

    /// Running count of scans folded into this line. Monotonically
    /// non-decreasing except explicit decrement; never below 0.
    pub matched_qty: i64,

    /// Unit price snapshot, for flows that value their lines (sales,
    /// receiving value totals). Not used by matching itself.
    pub unit_price: Option<Money>,
}

impl ManifestLine {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.sku.clone(), self.variant.clone())
    }

    /// Complete means exact equality - a line that was over-received is NOT
    /// complete, so the discrepancy stays visible.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.matched_qty == self.expected_qty
    }

    /// Expected minus matched; negative when over-received.
    #[inline]
    pub fn discrepancy(&self) -> i64 {
        self.expected_qty - self.matched_qty
    }
}

// =============================================================================
// Scan Event
// =============================================================================

/// A single scan, or a `count*barcode` bulk entry.
///
/// Pure input - never persisted; it is folded into a line's `matched_qty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub barcode: String,
    pub quantity_delta: i64,
}

impl ScanEvent {
    /// A single-unit scan.
    pub fn single(barcode: impl Into<String>) -> Self {
        ScanEvent {
            barcode: barcode.into(),
            quantity_delta: 1,
        }
    }

    /// A bulk entry of `quantity_delta` units.
    pub fn bulk(barcode: impl Into<String>, quantity_delta: i64) -> Self {
        ScanEvent {
            barcode: barcode.into(),
            quantity_delta,
        }
    }
}

// =============================================================================
// Match Policy
// =============================================================================

/// What to do when a scan would push a line past its expected quantity.
///
/// Source flows disagree on this, so it is an explicit parameter: receiving
/// against a fixed manifest wants `Reject` (over-receipt is corrected
/// administratively), free-form adjustment flows want `AcceptWithWarning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OveragePolicy {
    /// Refuse the scan; the line stays at `expected_qty`.
    Reject,
    /// Count the scan and flag it.
    AcceptWithWarning,
}

/// Whether unknown barcodes may grow the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Only barcodes already on the document are accepted.
    ManifestBound,
    /// Unknown barcodes synthesize a new line from the reference catalog.
    FreeScan,
}

/// Per-invocation matcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    pub mode: ScanMode,
    pub overage: OveragePolicy,
}

impl MatchPolicy {
    /// Manifest-bound, overage rejected: receiving a fixed document.
    pub const fn strict() -> Self {
        MatchPolicy {
            mode: ScanMode::ManifestBound,
            overage: OveragePolicy::Reject,
        }
    }

    /// Free-scan, overage warned: adjustments and stock counts.
    pub const fn open() -> Self {
        MatchPolicy {
            mode: ScanMode::FreeScan,
            overage: OveragePolicy::AcceptWithWarning,
        }
    }
}

// =============================================================================
// Scan Outcome
// =============================================================================

/// Why a scan was refused. A value, not an error - state is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Barcode is not on the document (manifest-bound mode).
    NotInDocument { barcode: String },
    /// Scan would exceed `expected_qty` under [`OveragePolicy::Reject`].
    OverageRejected {
        barcode: String,
        expected_qty: i64,
        matched_qty: i64,
    },
    /// Barcode unknown to the reference catalog (free-scan mode).
    UnknownBarcode { barcode: String },
    /// Zero or negative quantity delta.
    InvalidQuantity { quantity_delta: i64 },
    /// Raw input failed validation before it became an event.
    InvalidInput { reason: String },
    /// Manifest is at [`MAX_MANIFEST_LINES`]; no new free line.
    ManifestFull,
}

/// Result of folding one scan into a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Scan landed on an existing line.
    Matched { key: LineKey, matched_qty: i64 },
    /// Scan landed and pushed the line past its expected quantity.
    OverageWarning {
        key: LineKey,
        matched_qty: i64,
        expected_qty: i64,
    },
    /// Free-scan synthesized a new ad-hoc line (`expected_qty = 0`).
    NewFreeLine { key: LineKey, matched_qty: i64 },
    /// Scan refused; manifest unchanged.
    Rejected(RejectReason),
}

impl ScanOutcome {
    /// True when the scan mutated the manifest.
    pub fn accepted(&self) -> bool {
        !matches!(self, ScanOutcome::Rejected(_))
    }
}

// =============================================================================
// Manifest
// =============================================================================

/// The expected set of line items a reconciliation session scans against.
///
/// Storage order of `lines` is stable; the recency-biased ordering screens
/// want is a projection ([`Manifest::display_order`]), never a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub lines: Vec<ManifestLine>,

    /// Key of the line the most recent accepted scan landed on.
    pub last_scanned: Option<LineKey>,
}

impl Manifest {
    /// Builds a manifest from expected lines, resetting matched state.
    pub fn from_expected(lines: Vec<ManifestLine>) -> Self {
        Manifest {
            lines,
            last_scanned: None,
        }
    }

    /// Folds one scan event into the manifest. See the module docs for the
    /// decision tree.
    pub fn apply_scan(
        &mut self,
        event: &ScanEvent,
        policy: &MatchPolicy,
        catalog: &ReferenceCatalog,
    ) -> ScanOutcome {
        if event.quantity_delta <= 0 {
            return ScanOutcome::Rejected(RejectReason::InvalidQuantity {
                quantity_delta: event.quantity_delta,
            });
        }

        if let Some(idx) = self.select_line(&event.barcode) {
            return self.fold_into_line(idx, event, policy);
        }

        match policy.mode {
            ScanMode::ManifestBound => ScanOutcome::Rejected(RejectReason::NotInDocument {
                barcode: event.barcode.clone(),
            }),
            ScanMode::FreeScan => self.synthesize_free_line(event, policy, catalog),
        }
    }

    /// Reduces a line's matched quantity by 1, floored at 0. Never errors:
    /// decrementing an unknown key or an already-zero line is a no-op.
    pub fn decrement_line(&mut self, key: &LineKey) -> i64 {
        match self.line_mut(key) {
            Some(line) => {
                if line.matched_qty > 0 {
                    line.matched_qty -= 1;
                }
                line.matched_qty
            }
            None => 0,
        }
    }

    /// Recomputes reconciliation totals. Called after every
    /// `apply_scan`/`decrement_line` by the owning record.
    pub fn summary(&self) -> RecordSummary {
        let mut summary = RecordSummary {
            total_lines: self.lines.len() as i64,
            ..RecordSummary::default()
        };
        for line in &self.lines {
            if line.is_complete() {
                summary.lines_complete += 1;
            }
            summary.total_expected += line.expected_qty;
            summary.total_matched += line.matched_qty;
        }
        summary
    }

    /// Recency-biased projection for screens: the most recently matched line
    /// first, the rest in storage order. Several flows rely on "most recent
    /// scan visually on top" as their only feedback mechanism.
    pub fn display_order(&self) -> Vec<&ManifestLine> {
        let mut ordered: Vec<&ManifestLine> = Vec::with_capacity(self.lines.len());
        if let Some(last) = &self.last_scanned {
            if let Some(recent) = self.lines.iter().find(|l| &l.key() == last) {
                ordered.push(recent);
            }
        }
        for line in &self.lines {
            if Some(&line.key()) != self.last_scanned.as_ref() {
                ordered.push(line);
            }
        }
        ordered
    }

    /// Looks up a line by key.
    pub fn line(&self, key: &LineKey) -> Option<&ManifestLine> {
        self.lines.iter().find(|l| &l.key() == key)
    }

    fn line_mut(&mut self, key: &LineKey) -> Option<&mut ManifestLine> {
        self.lines.iter_mut().find(|l| &l.key() == key)
    }

    /// Picks the line a barcode lands on: the first incomplete line with
    /// that barcode, falling back to the first line. With variants sharing a
    /// barcode this fills lines in document order instead of piling all
    /// overage onto the first one.
    fn select_line(&self, barcode: &str) -> Option<usize> {
        let mut first_match = None;
        for (idx, line) in self.lines.iter().enumerate() {
            if line.barcode != barcode {
                continue;
            }
            if first_match.is_none() {
                first_match = Some(idx);
            }
            if !line.is_complete() || line.expected_qty == 0 {
                return Some(idx);
            }
        }
        first_match
    }

    fn fold_into_line(
        &mut self,
        idx: usize,
        event: &ScanEvent,
        policy: &MatchPolicy,
    ) -> ScanOutcome {
        let line = &mut self.lines[idx];
        let would_be = line.matched_qty + event.quantity_delta;

        // Overage only applies to real expectations; ad-hoc lines
        // (expected 0) just accumulate.
        if line.expected_qty > 0 && would_be > line.expected_qty {
            match policy.overage {
                OveragePolicy::Reject => {
                    return ScanOutcome::Rejected(RejectReason::OverageRejected {
                        barcode: event.barcode.clone(),
                        expected_qty: line.expected_qty,
                        matched_qty: line.matched_qty,
                    });
                }
                OveragePolicy::AcceptWithWarning => {
                    line.matched_qty = would_be;
                    let key = line.key();
                    let expected_qty = line.expected_qty;
                    self.last_scanned = Some(key.clone());
                    return ScanOutcome::OverageWarning {
                        key,
                        matched_qty: would_be,
                        expected_qty,
                    };
                }
            }
        }

        line.matched_qty = would_be;
        let key = line.key();
        self.last_scanned = Some(key.clone());
        ScanOutcome::Matched {
            key,
            matched_qty: would_be,
        }
    }

    fn synthesize_free_line(
        &mut self,
        event: &ScanEvent,
        policy: &MatchPolicy,
        catalog: &ReferenceCatalog,
    ) -> ScanOutcome {
        let item = match catalog.by_barcode(&event.barcode) {
            Some(item) => item,
            None => {
                return ScanOutcome::Rejected(RejectReason::UnknownBarcode {
                    barcode: event.barcode.clone(),
                })
            }
        };

        // A product can carry several barcodes (old and new packaging). If
        // a line with this item's identity already exists, fold into it -
        // line keys must stay unique per manifest.
        let key = LineKey::new(item.sku.clone(), item.variant.clone());
        if let Some(idx) = self.lines.iter().position(|l| l.key() == key) {
            return self.fold_into_line(idx, event, policy);
        }

        if self.lines.len() >= MAX_MANIFEST_LINES {
            return ScanOutcome::Rejected(RejectReason::ManifestFull);
        }

        let line = free_line_from(item, event.quantity_delta);
        self.lines.push(line);
        self.last_scanned = Some(key.clone());
        ScanOutcome::NewFreeLine {
            key,
            matched_qty: event.quantity_delta,
        }
    }
}

/// Ad-hoc line synthesized from a reference item in free-scan mode.
fn free_line_from(item: &ReferenceItem, matched_qty: i64) -> ManifestLine {
    ManifestLine {
        sku: item.sku.clone(),
        variant: item.variant.clone(),
        barcode: item.barcode.clone(),
        name: item.name.clone(),
        expected_qty: 0,
        matched_qty,
        unit_price: Some(item.effective_price()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReferenceItem;

    fn expected_line(barcode: &str, sku: &str, expected: i64) -> ManifestLine {
        ManifestLine {
            sku: sku.to_string(),
            variant: String::new(),
            barcode: barcode.to_string(),
            name: sku.to_string(),
            expected_qty: expected,
            matched_qty: 0,
            unit_price: None,
        }
    }

    fn catalog_with(barcode: &str, sku: &str) -> ReferenceCatalog {
        ReferenceCatalog::from_items(vec![ReferenceItem {
            barcode: barcode.to_string(),
            sku: sku.to_string(),
            variant: String::new(),
            name: sku.to_string(),
            list_price: Money::from_minor(5_000),
            special_price: None,
            stock_qty: None,
            category: None,
        }])
    }

    #[test]
    fn test_reconciliation_round_trip() {
        // Manifest [{barcode:"A", expected:5}]; 5 scans complete the line.
        let mut manifest = Manifest::from_expected(vec![expected_line("A", "SKU-A", 5)]);
        let policy = MatchPolicy::strict();
        let catalog = ReferenceCatalog::empty();

        for _ in 0..5 {
            let outcome = manifest.apply_scan(&ScanEvent::single("A"), &policy, &catalog);
            assert!(outcome.accepted());
        }

        let summary = manifest.summary();
        assert_eq!(summary.lines_complete, 1);
        assert_eq!(summary.total_matched, 5);

        // 6th scan under overage-reject leaves state untouched.
        let outcome = manifest.apply_scan(&ScanEvent::single("A"), &policy, &catalog);
        assert_eq!(
            outcome,
            ScanOutcome::Rejected(RejectReason::OverageRejected {
                barcode: "A".to_string(),
                expected_qty: 5,
                matched_qty: 5,
            })
        );
        assert_eq!(manifest.summary().total_matched, 5);

        // Under overage-warn it counts and flags.
        let warn_policy = MatchPolicy {
            mode: ScanMode::ManifestBound,
            overage: OveragePolicy::AcceptWithWarning,
        };
        let outcome = manifest.apply_scan(&ScanEvent::single("A"), &warn_policy, &catalog);
        assert!(matches!(outcome, ScanOutcome::OverageWarning { matched_qty: 6, .. }));
        assert_eq!(manifest.summary().total_matched, 6);
        // Over-received line is no longer complete.
        assert_eq!(manifest.summary().lines_complete, 0);
    }

    #[test]
    fn test_matched_qty_monotonic_without_decrement() {
        let mut manifest = Manifest::from_expected(vec![expected_line("A", "SKU-A", 100)]);
        let policy = MatchPolicy::open();
        let catalog = ReferenceCatalog::empty();

        let mut previous = 0;
        for step in 1..=20 {
            manifest.apply_scan(&ScanEvent::bulk("A", step % 3 + 1), &policy, &catalog);
            let matched = manifest.lines[0].matched_qty;
            assert!(matched >= previous, "matched_qty decreased");
            previous = matched;
        }
    }

    #[test]
    fn test_manifest_bound_rejects_unknown_barcode() {
        let mut manifest = Manifest::from_expected(vec![expected_line("A", "SKU-A", 1)]);
        let outcome = manifest.apply_scan(
            &ScanEvent::single("ZZZ"),
            &MatchPolicy::strict(),
            &ReferenceCatalog::empty(),
        );
        assert_eq!(
            outcome,
            ScanOutcome::Rejected(RejectReason::NotInDocument {
                barcode: "ZZZ".to_string()
            })
        );
        assert_eq!(manifest.lines.len(), 1);
    }

    #[test]
    fn test_free_scan_synthesizes_line_from_catalog() {
        let mut manifest = Manifest::default();
        let catalog = catalog_with("B", "SKU-B");

        let outcome = manifest.apply_scan(&ScanEvent::bulk("B", 3), &MatchPolicy::open(), &catalog);
        assert!(matches!(outcome, ScanOutcome::NewFreeLine { matched_qty: 3, .. }));
        assert_eq!(manifest.lines.len(), 1);
        assert_eq!(manifest.lines[0].expected_qty, 0);
        assert_eq!(manifest.lines[0].unit_price, Some(Money::from_minor(5_000)));

        // Second scan of the same barcode lands on the existing free line,
        // with no overage even under Reject (expected is 0).
        let strict_free = MatchPolicy {
            mode: ScanMode::FreeScan,
            overage: OveragePolicy::Reject,
        };
        let outcome = manifest.apply_scan(&ScanEvent::single("B"), &strict_free, &catalog);
        assert!(matches!(outcome, ScanOutcome::Matched { matched_qty: 4, .. }));
    }

    #[test]
    fn test_free_scan_second_barcode_of_same_item_folds_into_line() {
        // One product, two barcodes (old and new packaging).
        let make = |barcode: &str| ReferenceItem {
            barcode: barcode.to_string(),
            sku: "SKU-D".to_string(),
            variant: String::new(),
            name: "Item D".to_string(),
            list_price: Money::from_minor(4_000),
            special_price: None,
            stock_qty: None,
            category: None,
        };
        let catalog = ReferenceCatalog::from_items(vec![make("old-1"), make("new-2")]);

        let mut manifest = Manifest::default();
        manifest.apply_scan(&ScanEvent::single("old-1"), &MatchPolicy::open(), &catalog);
        let outcome = manifest.apply_scan(&ScanEvent::single("new-2"), &MatchPolicy::open(), &catalog);

        // No duplicate line key; the second barcode lands on the same line.
        assert!(matches!(outcome, ScanOutcome::Matched { matched_qty: 2, .. }));
        assert_eq!(manifest.lines.len(), 1);
    }

    #[test]
    fn test_free_scan_unknown_barcode_rejected() {
        let mut manifest = Manifest::default();
        let outcome = manifest.apply_scan(
            &ScanEvent::single("NOPE"),
            &MatchPolicy::open(),
            &ReferenceCatalog::empty(),
        );
        assert_eq!(
            outcome,
            ScanOutcome::Rejected(RejectReason::UnknownBarcode {
                barcode: "NOPE".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_quantity_rejected() {
        let mut manifest = Manifest::from_expected(vec![expected_line("A", "SKU-A", 5)]);
        let outcome = manifest.apply_scan(
            &ScanEvent::bulk("A", 0),
            &MatchPolicy::open(),
            &ReferenceCatalog::empty(),
        );
        assert_eq!(
            outcome,
            ScanOutcome::Rejected(RejectReason::InvalidQuantity { quantity_delta: 0 })
        );
    }

    #[test]
    fn test_shared_barcode_fills_variants_in_order() {
        // Two size variants share barcode "A".
        let mut small = expected_line("A", "SKU-A", 2);
        small.variant = "S".to_string();
        let mut large = expected_line("A", "SKU-A", 2);
        large.variant = "L".to_string();
        let mut manifest = Manifest::from_expected(vec![small, large]);
        let policy = MatchPolicy::strict();
        let catalog = ReferenceCatalog::empty();

        for _ in 0..4 {
            assert!(manifest
                .apply_scan(&ScanEvent::single("A"), &policy, &catalog)
                .accepted());
        }
        assert_eq!(manifest.lines[0].matched_qty, 2);
        assert_eq!(manifest.lines[1].matched_qty, 2);
        assert_eq!(manifest.summary().lines_complete, 2);
    }

    #[test]
    fn test_decrement_floors_at_zero_and_never_errors() {
        let mut manifest = Manifest::from_expected(vec![expected_line("A", "SKU-A", 5)]);
        let key = manifest.lines[0].key();

        assert_eq!(manifest.decrement_line(&key), 0); // already zero
        manifest.apply_scan(
            &ScanEvent::bulk("A", 2),
            &MatchPolicy::strict(),
            &ReferenceCatalog::empty(),
        );
        assert_eq!(manifest.decrement_line(&key), 1);
        assert_eq!(manifest.decrement_line(&key), 0);
        assert_eq!(manifest.decrement_line(&key), 0);

        // Unknown key is a no-op.
        assert_eq!(manifest.decrement_line(&LineKey::new("GHOST", "")), 0);
    }

    #[test]
    fn test_display_order_puts_recent_scan_first() {
        let mut manifest = Manifest::from_expected(vec![
            expected_line("A", "SKU-A", 5),
            expected_line("B", "SKU-B", 5),
            expected_line("C", "SKU-C", 5),
        ]);
        let policy = MatchPolicy::strict();
        let catalog = ReferenceCatalog::empty();

        manifest.apply_scan(&ScanEvent::single("C"), &policy, &catalog);
        let ordered: Vec<&str> = manifest.display_order().iter().map(|l| l.sku.as_str()).collect();
        assert_eq!(ordered, vec!["SKU-C", "SKU-A", "SKU-B"]);

        // Storage order is untouched.
        let stored: Vec<&str> = manifest.lines.iter().map(|l| l.sku.as_str()).collect();
        assert_eq!(stored, vec!["SKU-A", "SKU-B", "SKU-C"]);

        // A rejected scan does not move the projection.
        manifest.apply_scan(&ScanEvent::single("ZZZ"), &policy, &catalog);
        let ordered: Vec<&str> = manifest.display_order().iter().map(|l| l.sku.as_str()).collect();
        assert_eq!(ordered[0], "SKU-C");
    }

    #[test]
    fn test_line_key_storage_round_trip() {
        let key = LineKey::new("SKU-9", "XL");
        assert_eq!(
            LineKey::from_storage_key(&key.as_storage_key()),
            Some(key)
        );
    }
}

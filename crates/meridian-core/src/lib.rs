//! # meridian-core: Pure Business Logic for Meridian
//!
//! This crate is the **heart** of the Meridian field-operations engine. It
//! contains the reconciliation and pricing logic as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! Screens (external) ──► meridian-store (sessions, SQLite)
//!                               │
//!                               ▼
//!                    ★ meridian-core (THIS CRATE) ★
//!          types · money · matcher · pricing · input · error
//!              NO I/O • NO DATABASE • NO NETWORK
//!                               ▲
//!                               │
//!                        meridian-sync (upload coordinator)
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ReferenceItem, TransactionRecord, queue entry)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`matcher`] - Manifest matcher: folds scan events into expected lines
//! - [`pricing`] - Threshold-bundle price resolution for mutable carts
//! - [`input`] - Scan input validation and the `count*barcode` shorthand
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output; `resolve` run twice on an
//!    unchanged cart produces identical prices
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are minor currency units (i64)
//! 4. **Outcomes as values**: a rejected scan is a [`matcher::ScanOutcome`],
//!    never an `Err` - rejections are expected and must not unwind the
//!    scanning loop

pub mod error;
pub mod input;
pub mod matcher;
pub mod money;
pub mod pricing;
pub mod types;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity a single scan event may carry (`500*barcode` is fine,
/// `50000*barcode` is a typo).
pub const MAX_SCAN_QUANTITY: i64 = 9_999;

/// Maximum number of lines a manifest may hold. Free-scan mode stops
/// synthesizing new lines past this point.
pub const MAX_MANIFEST_LINES: usize = 500;

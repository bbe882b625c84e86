//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! meridian-core errors (this file)
//! ├── CoreError        - Domain rule violations
//! └── ValidationError  - Input validation failures
//!
//! meridian-store errors (separate crate)
//! └── StoreError       - Persistence failures, constraint violations
//!
//! meridian-sync errors (separate crate)
//! └── SyncError        - Transport failures, remote rejections
//! ```
//!
//! Scan rejections and overage warnings are NOT errors: they are
//! [`crate::matcher::ScanOutcome`] values, because they are expected,
//! frequent, and must not unwind the scanning loop.

use thiserror::Error;

use crate::types::RecordStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record was asked to move to a status its state machine forbids
    /// (e.g. `Uploaded` back to `Scanning`, or finalizing a `Draft`).
    #[error("cannot transition record from {from:?} to {to:?}")]
    InvalidStatusTransition { from: RecordStatus, to: RecordStatus },

    /// Canonical payload serialization failed.
    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation of scan input and downloaded reference rows
/// before domain logic runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (bad shorthand, whitespace in a barcode, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A price that must not be negative is negative.
    #[error("{field} must not be negative")]
    NegativePrice { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! Transport failures and remote rejections look the same for retry
//! purposes (the entry stays queued) but are distinct variants so the
//! caller can display them differently - a timeout is not "the server
//! refused your document".

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering upload and download failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Transport / Remote
    // =========================================================================
    /// Network or server unreachable. Retryable; never data loss - the
    /// queue entry is retained.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote system validated and refused a document. Surfaced
    /// verbatim; the local record is preserved for correction.
    #[error("remote rejected {document_id}: {reason}")]
    RemoteReject { document_id: String, reason: String },

    /// Acknowledgment did not name the submitted document.
    #[error("acknowledgment for {submitted} named {acknowledged}; not marking uploaded")]
    AckMismatch {
        submitted: String,
        acknowledged: String,
    },

    /// Manifest could not be fetched; any non-success response collapses to
    /// this so the caller prompts a re-select.
    #[error("manifest not found for {reference}")]
    ManifestNotFound { reference: String },

    /// A downloaded reference snapshot failed validation; the local
    /// snapshot was left untouched.
    #[error("reference snapshot invalid: {0}")]
    SnapshotInvalid(String),

    // =========================================================================
    // Configuration
    // =========================================================================
    /// Invalid sync configuration.
    #[error("invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Local layers
    // =========================================================================
    /// Store operation failed underneath a sync pass.
    #[error("store error: {0}")]
    Store(#[from] meridian_store::StoreError),

    /// Failed to (de)serialize a payload.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// True when the same operation may simply be attempted again on the
    /// next pass.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::AckMismatch { .. }
        )
    }

    /// True when this failure came from the remote validating and refusing,
    /// as opposed to not being reachable at all.
    pub fn is_remote_reject(&self) -> bool {
        matches!(self, SyncError::RemoteReject { .. })
    }
}

//! # meridian-sync: Sync Coordinator for Meridian
//!
//! Reconciles locally-queued records with the remote system exactly once,
//! surviving partial failures, and pulls manifests and reference snapshots
//! down through a single gateway seam.
//!
//! ## Sync Flow
//! ```text
//! sync_queue (meridian-store)            RemoteGateway (implemented by the
//!      │                                 application's transport layer)
//!      │ list_unuploaded                        ▲
//!      ▼                                        │ submit(document_id, payload)
//! SyncCoordinator::sync_pending ────────────────┘
//!      │
//!      ├── Ack naming the document ──► mark_uploaded + record -> Uploaded
//!      ├── Reject(reason)           ──► attempts+1, entry retained
//!      └── transport failure        ──► attempts+1, entry retained
//!                                        (next pass retries; uploaded
//!                                         entries are filtered out, so
//!                                         repeated passes never resubmit)
//! ```
//!
//! ## Modules
//!
//! - [`gateway`] - the `RemoteGateway` trait and canonical wire shapes
//! - [`coordinator`] - upload passes, reference refresh, manifest fetch
//! - [`config`] - device configuration (TOML)
//! - [`error`] - sync error types

pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;

pub use config::{DeviceConfig, SyncConfig, SyncSettings};
pub use coordinator::{SyncCoordinator, SyncReport, UploadFailure};
pub use error::{SyncError, SyncResult};
pub use gateway::{DocumentRef, ManifestLinePayload, ManifestPayload, RemoteGateway, SubmitOutcome};

//! # meridian-store: Local Durable Store
//!
//! Durable, crash-safe persistence for the Meridian engine, plus the
//! session orchestration that feeds scans through the matcher and back into
//! storage.
//!
//! ## Data Flow
//! ```text
//! Screen (external)
//!      │
//!      ▼
//! ReconcileSession (session.rs)         ← scan / decrement / save / resume
//!      │
//!      ▼
//! Store (pool.rs) ── repositories ──► SQLite (WAL)
//!                     reference.rs      reference_items
//!                     record.rs         transaction_records + manifest_lines
//!                     queue.rs          sync_queue
//!                     sequence.rs       sequence_counters
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - store handle, connection pool creation and configuration
//! - [`migrations`] - embedded database migrations
//! - [`error`] - store error types
//! - [`repository`] - repository implementations per table
//! - [`session`] - reconciliation session orchestration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_store::{Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::new("path/to/meridian.db")).await?;
//! let catalog = store.reference().load_catalog(ReferenceDomain::Products).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod session;

pub use error::{StoreError, StoreResult};
pub use pool::{Store, StoreConfig};
pub use session::ReconcileSession;

pub use repository::queue::SyncQueueRepository;
pub use repository::record::RecordRepository;
pub use repository::reference::ReferenceRepository;
pub use repository::sequence::{SequenceAllocator, SequenceScope};

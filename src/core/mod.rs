//! Core import logic
//!
//! This module contains the import components:
//! - `traits` - Collaborator traits (record store, dedup store, publisher, locks)
//! - `version` - Expected-version table and validator
//! - `lifecycle` - Stage directories and the transition function
//! - `pipeline` - The importer driving a file through every step
//! - `jobs` - Export trigger and retention purge
//! - `dedup_store`, `record_store`, `local` - In-memory and lock-file collaborators

pub mod dedup_store;
pub mod jobs;
pub mod lifecycle;
pub mod local;
pub mod pipeline;
pub mod record_store;
pub mod traits;
pub mod version;

pub use dedup_store::InMemoryDedupStore;
pub use jobs::{confirm_export, ExportJob, JobRun, RetentionJob};
pub use lifecycle::{transition, DirectoryLayout, DirectorySet, Event, Lifecycle, Moved};
pub use local::{FileLockProvider, LocalLockProvider, LogPublisher};
pub use pipeline::{Importer, RetryPolicy};
pub use record_store::InMemoryRecordStore;
pub use traits::{
    acquire, DedupStore, ExportPublisher, ExportRequest, LockGuard, LockProvider, RecordStore,
};
pub use version::{validate, VersionTable};

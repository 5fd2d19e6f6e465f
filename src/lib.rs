//! HLZ legacy file importer
//! # Overview
//!
//! This library imports the fixed-layout, whitespace-delimited files produced
//! by legacy reverse vending machines (HLZ format) into typed records, and
//! tracks every file through a directory-based lifecycle.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (records, outcomes, stages, errors)
//! - [`io`] - Everything between raw bytes and typed records:
//!   - [`io::tokenizer`] - Whitespace tokenizer with positions
//!   - [`io::decoder`] - Positional decoders, one per schema version
//!   - [`io::mapping`] - Coercion into settled domain records
//!   - [`io::integrity`] - Companion-hash fingerprint check
//!   - [`io::dedup_index`] - Dedup index saved between CLI runs
//! - [`core`] - Business logic components:
//!   - [`core::pipeline`] - The importer driving a file through every step
//!   - [`core::lifecycle`] - Stage directories and the transition function
//!   - [`core::version`] - Expected-version table
//!   - [`core::jobs`] - Export trigger and retention purge
//! - [`strategy`] - Sync and concurrent polling
//! - [`config`] - TOML configuration
//! - [`cli`] - CLI arguments parsing
//!
//! # Artifact Kinds
//!
//! - **transactions**: machine batches, schema versions `016` and `017`
//! - **bags**: deposit bags, version `001`
//! - **label-orders**: label ranges allocated to customers, version `001`
//! - **articles**, **rejected-transactions**: routed through the lifecycle,
//!   no body decoder registered
//!
//! # File Lifecycle
//!
//! Each file sits in exactly one stage directory:
//! `from` → `accepted` | `rejected` | `failed` | `already-exists`, then
//! `accepted` → `in-queue` → `confirmed` | `already-exists`.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use config::Config;
pub use core::{Importer, InMemoryDedupStore, InMemoryRecordStore, RetryPolicy};
pub use types::{ArtifactKind, ImportError, ImportOutcome, ImportReport, ImportStatus, Stage};

//! Types module
//!
//! Contains core data structures used throughout the importer.
//! This module organizes types into logical submodules:
//! - `record`: decoded header and body records
//! - `settled`: typed domain records produced by mapping
//! - `dedup`: natural keys and label ranges
//! - `outcome`: import status, diagnostics and reports
//! - `stage`: lifecycle stages of a file
//! - `error`: error types for the importer

pub mod dedup;
pub mod error;
pub mod outcome;
pub mod record;
pub mod settled;
pub mod stage;

pub use dedup::{DedupEntry, LabelRange, NaturalKey};
pub use error::ImportError;
pub use outcome::{ImportMessage, ImportOutcome, ImportReport, ImportStatus};
pub use record::{
    ArtifactKind, BagBody, BatchBody, BatchCounter, BodyRecord, DecodedBody, HeaderRecord,
    LabelOrderBody, TokenPosition,
};
pub use settled::{
    DedupClaim, SettledBag, SettledBatch, SettledLabelOrder, SettledRecord,
};
pub use stage::Stage;

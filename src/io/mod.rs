//! I/O module
//!
//! Handles everything between raw file bytes and typed records.
//!
//! # Components
//!
//! - `tokenizer` - Whitespace tokenizer with a position-tracking cursor
//! - `decoder` - Positional header and body decoders, one per schema version
//! - `mapping` - Coercion of decoded string fields into settled records
//! - `integrity` - Companion-hash fingerprint check
//! - `result_artifact` - CSV result file written next to moved files
//! - `dedup_index` - CSV dedup index kept between CLI runs
//! - `discovery` - Listing of pending files in a stage directory

pub mod decoder;
pub mod dedup_index;
pub mod discovery;
pub mod integrity;
pub mod mapping;
pub mod result_artifact;
pub mod tokenizer;

pub use decoder::{decode_bodies, decode_header, BodyLayout};
pub use discovery::pending_files;
pub use integrity::{compute_fingerprint, verify, Verification};
pub use mapping::map_body;
pub use result_artifact::{read_outcome_csv, result_path, write_outcome_csv};
pub use tokenizer::TokenCursor;

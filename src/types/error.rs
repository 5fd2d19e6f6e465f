//! Error types for the HLZ importer
//!
//! This module defines every error that can occur while a file travels through
//! the import pipeline. Errors carry enough context to be turned into a
//! diagnostic line of an [`ImportOutcome`](crate::types::ImportOutcome).
//!
//! # Error Categories
//!
//! - **Decode Errors**: truncated records, unknown schema versions
//! - **Validation Errors**: wrong version, unparseable fields, empty files
//! - **Integrity Errors**: companion hash missing or not matching
//! - **Dedup Errors**: natural key or label range already recorded
//! - **Fatal Errors**: a lifecycle move failed, leaving the file state ambiguous

use crate::types::{ArtifactKind, ImportStatus, TokenPosition};
use thiserror::Error;

/// Main error type for the importer
///
/// Every variant except [`ImportError::FileMove`], [`ImportError::Io`] and
/// [`ImportError::Config`] is recovered locally by the pipeline and folded into
/// an import outcome. See [`ImportError::status`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    /// The file ended before the schema's fixed field count was consumed
    #[error("Truncated record: expected field '{expected_field}' at {position}")]
    TruncatedRecord {
        /// Name of the field that could not be read
        expected_field: String,
        /// Position right after the last token that was read
        position: TokenPosition,
    },

    /// No body decoder is registered for the declared version
    #[error("Unsupported version '{version}' for {kind} files")]
    UnsupportedVersion {
        /// Artifact kind the file was submitted as
        kind: ArtifactKind,
        /// Version token declared in the header
        version: String,
    },

    /// The declared version differs from the one expected for the company
    #[error("Wrong version: declared '{declared}', expected '{expected}'")]
    WrongVersion {
        /// Version token declared in the header
        declared: String,
        /// Version configured for the (company, kind) pair
        expected: String,
    },

    /// The companion hash file does not match the file contents
    #[error("Hash mismatch for {file}: companion holds '{expected}', content hashes to '{actual}'")]
    IntegrityMismatch {
        /// File name of the primary artifact
        file: String,
        /// Digest found in the companion file
        expected: String,
        /// Digest computed from the primary file
        actual: String,
    },

    /// The companion hash file has not been written (yet)
    #[error("Hash file missing for {file}")]
    IntegrityMissing {
        /// File name of the primary artifact
        file: String,
    },

    /// A natural key of the file was already recorded as latest
    #[error("Duplicate record: {key} was already imported")]
    DuplicateNaturalKey {
        /// Display form of the colliding key
        key: String,
    },

    /// A label-order range overlaps an existing, not yet exhausted range
    #[error("Duplicate label order for customer {customer}: range {first}-{last} overlaps an open order")]
    DuplicateRangeOverlap {
        /// Customer number the range is allocated to
        customer: String,
        /// First label of the new range
        first: u64,
        /// Last label of the new range
        last: u64,
    },

    /// A decoded field could not be coerced into its domain type
    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    InvalidField {
        /// Field name from the decoder table
        field: String,
        /// Raw token as it appeared in the file
        value: String,
        /// Why the coercion failed
        reason: String,
    },

    /// The file holds a header but no body record
    #[error("File {file} contains no records")]
    EmptyFile {
        /// File name of the primary artifact
        file: String,
    },

    /// The record or dedup store rejected an operation
    #[error("Persistence error: {message}")]
    Persistence {
        /// Description of the store failure
        message: String,
    },

    /// A lifecycle move failed
    ///
    /// This is the one fatal error: source and destination state are now
    /// ambiguous, so the file is left where it is for manual intervention.
    #[error("Failed to move '{from}' to '{to}': {message}")]
    FileMove {
        /// Source path
        from: String,
        /// Destination path
        to: String,
        /// Underlying I/O error
        message: String,
    },

    /// I/O error outside of a lifecycle move
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },
}

impl From<std::io::Error> for ImportError {
    fn from(error: std::io::Error) -> Self {
        ImportError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(error: csv::Error) -> Self {
        ImportError::Io {
            message: error.to_string(),
        }
    }
}

impl ImportError {
    /// Create a TruncatedRecord error
    pub fn truncated(expected_field: &str, position: TokenPosition) -> Self {
        ImportError::TruncatedRecord {
            expected_field: expected_field.to_string(),
            position,
        }
    }

    /// Create an UnsupportedVersion error
    pub fn unsupported_version(kind: ArtifactKind, version: &str) -> Self {
        ImportError::UnsupportedVersion {
            kind,
            version: version.to_string(),
        }
    }

    /// Create a WrongVersion error
    pub fn wrong_version(declared: &str, expected: &str) -> Self {
        ImportError::WrongVersion {
            declared: declared.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Create an InvalidField error
    pub fn invalid_field(field: &str, value: &str, reason: impl Into<String>) -> Self {
        ImportError::InvalidField {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        ImportError::Persistence {
            message: message.into(),
        }
    }

    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        ImportError::Config {
            message: message.into(),
        }
    }

    /// Terminal status a file ends in when this error stops its import
    ///
    /// Structural, integrity and store failures are `Failed`; validation
    /// failures are `Rejected`; key collisions are `Duplicate`.
    pub fn status(&self) -> ImportStatus {
        match self {
            ImportError::UnsupportedVersion { .. }
            | ImportError::WrongVersion { .. }
            | ImportError::InvalidField { .. }
            | ImportError::EmptyFile { .. } => ImportStatus::Rejected,
            ImportError::DuplicateNaturalKey { .. } | ImportError::DuplicateRangeOverlap { .. } => {
                ImportStatus::Duplicate
            }
            ImportError::TruncatedRecord { .. }
            | ImportError::IntegrityMismatch { .. }
            | ImportError::IntegrityMissing { .. }
            | ImportError::Persistence { .. }
            | ImportError::FileMove { .. }
            | ImportError::Io { .. }
            | ImportError::Config { .. } => ImportStatus::Failed,
        }
    }

    /// Whether the error breaks the lifecycle invariant and must reach the operator
    pub fn is_fatal(&self) -> bool {
        matches!(self, ImportError::FileMove { .. })
    }

    /// Whether the error comes from the integrity guard
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            ImportError::IntegrityMismatch { .. } | ImportError::IntegrityMissing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::truncated(
        ImportError::truncated("batchId", TokenPosition { line: 3, offset: 7 }),
        "Truncated record: expected field 'batchId' at line 3, token 7"
    )]
    #[case::unsupported_version(
        ImportError::unsupported_version(ArtifactKind::Articles, "003"),
        "Unsupported version '003' for articles files"
    )]
    #[case::wrong_version(
        ImportError::wrong_version("017", "016"),
        "Wrong version: declared '017', expected '016'"
    )]
    #[case::integrity_missing(
        ImportError::IntegrityMissing { file: "a.hlz".to_string() },
        "Hash file missing for a.hlz"
    )]
    #[case::range_overlap(
        ImportError::DuplicateRangeOverlap { customer: "C1".to_string(), first: 150, last: 180 },
        "Duplicate label order for customer C1: range 150-180 overlaps an open order"
    )]
    #[case::invalid_field(
        ImportError::invalid_field("numberInBatch", "x1", "not a number"),
        "Invalid value 'x1' for field 'numberInBatch': not a number"
    )]
    fn test_error_display(#[case] error: ImportError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::truncated(ImportError::truncated("x", TokenPosition::default()), ImportStatus::Failed)]
    #[case::missing_hash(ImportError::IntegrityMissing { file: "f".into() }, ImportStatus::Failed)]
    #[case::wrong_version(ImportError::wrong_version("1", "2"), ImportStatus::Rejected)]
    #[case::unsupported(ImportError::unsupported_version(ArtifactKind::Bags, "9"), ImportStatus::Rejected)]
    #[case::duplicate(ImportError::DuplicateNaturalKey { key: "k".into() }, ImportStatus::Duplicate)]
    #[case::persistence(ImportError::persistence("down"), ImportStatus::Failed)]
    fn test_error_status(#[case] error: ImportError, #[case] expected: ImportStatus) {
        assert_eq!(error.status(), expected);
    }

    #[test]
    fn test_only_file_move_is_fatal() {
        let fatal = ImportError::FileMove {
            from: "a".into(),
            to: "b".into(),
            message: "denied".into(),
        };
        assert!(fatal.is_fatal());
        assert!(!ImportError::persistence("x").is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: ImportError = io_error.into();
        assert!(matches!(error, ImportError::Io { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}

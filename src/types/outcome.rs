//! Import outcome types
//!
//! An [`ImportOutcome`] is produced exactly once per file and never changes
//! afterwards. It is written next to the moved file for audit.

use crate::types::{ImportError, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Terminal status of one import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Accepted,
    Rejected,
    Failed,
    Duplicate,
}

impl ImportStatus {
    /// Severity used to pick the worst applicable status
    fn severity(self) -> u8 {
        match self {
            ImportStatus::Accepted => 0,
            ImportStatus::Duplicate => 1,
            ImportStatus::Rejected => 2,
            ImportStatus::Failed => 3,
        }
    }

    /// The more severe of two statuses
    pub fn worst(self, other: ImportStatus) -> ImportStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportStatus::Accepted => "accepted",
            ImportStatus::Rejected => "rejected",
            ImportStatus::Failed => "failed",
            ImportStatus::Duplicate => "duplicate",
        };
        f.write_str(s)
    }
}

/// One diagnostic line of an outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMessage {
    /// 1-based line in the source file, `0` when the message concerns the whole file
    pub line: usize,
    pub message: String,
}

impl ImportMessage {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Final result of importing one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    status: ImportStatus,
    messages: Vec<ImportMessage>,
}

impl ImportOutcome {
    pub fn new(status: ImportStatus, messages: Vec<ImportMessage>) -> Self {
        Self { status, messages }
    }

    /// Accepted outcome with informational messages
    pub fn accepted(messages: Vec<ImportMessage>) -> Self {
        Self {
            status: ImportStatus::Accepted,
            messages,
        }
    }

    /// Outcome built from a list of errors, each tagged with its line
    ///
    /// The status is the worst status among the errors. An empty list yields
    /// an accepted outcome.
    pub fn from_errors(errors: Vec<(usize, ImportError)>) -> Self {
        let status = errors
            .iter()
            .fold(ImportStatus::Accepted, |acc, (_, e)| acc.worst(e.status()));
        let messages = errors
            .into_iter()
            .map(|(line, e)| ImportMessage::new(line, e.to_string()))
            .collect();
        Self { status, messages }
    }

    /// Outcome for a single error stopping the import
    pub fn from_error(line: usize, error: &ImportError) -> Self {
        Self {
            status: error.status(),
            messages: vec![ImportMessage::new(line, error.to_string())],
        }
    }

    pub fn status(&self) -> ImportStatus {
        self.status
    }

    pub fn messages(&self) -> &[ImportMessage] {
        &self.messages
    }

    pub fn is_accepted(&self) -> bool {
        self.status == ImportStatus::Accepted
    }
}

/// What a pipeline run did with one file
#[derive(Debug, Clone, PartialEq)]
pub enum ImportReport {
    /// The outcome is final and the file now sits in `stage`
    Completed {
        file: PathBuf,
        outcome: ImportOutcome,
        stage: Stage,
        persisted: usize,
    },
    /// The integrity check did not pass yet; the file stays in `from`
    Deferred { file: PathBuf, outcome: ImportOutcome },
    /// Another worker claimed the file first
    Skipped { file: PathBuf },
    /// In-memory payload, no file was moved
    Payload {
        name: String,
        outcome: ImportOutcome,
        persisted: usize,
    },
}

impl ImportReport {
    /// Outcome of the run, if one was produced
    pub fn outcome(&self) -> Option<&ImportOutcome> {
        match self {
            ImportReport::Completed { outcome, .. }
            | ImportReport::Deferred { outcome, .. }
            | ImportReport::Payload { outcome, .. } => Some(outcome),
            ImportReport::Skipped { .. } => None,
        }
    }

    /// Number of settled records handed to the store
    pub fn persisted(&self) -> usize {
        match self {
            ImportReport::Completed { persisted, .. } | ImportReport::Payload { persisted, .. } => {
                *persisted
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ImportStatus::Accepted, ImportStatus::Duplicate, ImportStatus::Duplicate)]
    #[case(ImportStatus::Rejected, ImportStatus::Duplicate, ImportStatus::Rejected)]
    #[case(ImportStatus::Rejected, ImportStatus::Failed, ImportStatus::Failed)]
    #[case(ImportStatus::Failed, ImportStatus::Accepted, ImportStatus::Failed)]
    fn test_worst_status(
        #[case] a: ImportStatus,
        #[case] b: ImportStatus,
        #[case] expected: ImportStatus,
    ) {
        assert_eq!(a.worst(b), expected);
        assert_eq!(b.worst(a), expected);
    }

    #[test]
    fn test_from_errors_keeps_order_and_worst_status() {
        let outcome = ImportOutcome::from_errors(vec![
            (4, ImportError::invalid_field("user", "?", "empty")),
            (9, ImportError::DuplicateNaturalKey { key: "k".into() }),
        ]);

        assert_eq!(outcome.status(), ImportStatus::Rejected);
        assert_eq!(outcome.messages().len(), 2);
        assert_eq!(outcome.messages()[0].line, 4);
        assert_eq!(outcome.messages()[1].line, 9);
    }

    #[test]
    fn test_from_errors_empty_is_accepted() {
        assert!(ImportOutcome::from_errors(Vec::new()).is_accepted());
    }

    #[test]
    fn test_status_display_matches_serde() {
        assert_eq!(ImportStatus::Duplicate.to_string(), "duplicate");
    }
}

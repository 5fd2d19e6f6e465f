//! Result artifact written next to every moved file
//!
//! The artifact is a small CSV with columns `status,line,message`, one row per
//! diagnostic. An outcome without diagnostics is written as a single row with
//! empty `line` and `message` so the status is always recorded.

use crate::types::{ImportError, ImportMessage, ImportOutcome, ImportStatus};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to the artifact's file name
pub const RESULT_SUFFIX: &str = ".result.csv";

#[derive(Debug, Serialize, Deserialize)]
struct ResultRow {
    status: ImportStatus,
    line: Option<usize>,
    message: Option<String>,
}

/// Path of the result artifact for a file at `path`
pub fn result_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(RESULT_SUFFIX);
    path.with_file_name(name)
}

/// Whether `path` names a result artifact
pub fn is_result_artifact(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(RESULT_SUFFIX))
        .unwrap_or(false)
}

/// Serialize an outcome as CSV
pub fn write_outcome_csv(
    outcome: &ImportOutcome,
    output: &mut dyn Write,
) -> Result<(), ImportError> {
    let mut writer = csv::Writer::from_writer(output);

    if outcome.messages().is_empty() {
        writer.serialize(ResultRow {
            status: outcome.status(),
            line: None,
            message: None,
        })?;
    }
    for message in outcome.messages() {
        writer.serialize(ResultRow {
            status: outcome.status(),
            line: Some(message.line),
            message: Some(message.message.clone()),
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// Read an outcome back from its CSV form
pub fn read_outcome_csv(input: impl Read) -> Result<ImportOutcome, ImportError> {
    let mut reader = csv::Reader::from_reader(input);
    let mut status = None;
    let mut messages = Vec::new();

    for row in reader.deserialize::<ResultRow>() {
        let row = row?;
        status = Some(row.status);
        if let (Some(line), Some(message)) = (row.line, row.message) {
            messages.push(ImportMessage::new(line, message));
        }
    }

    status
        .map(|status| ImportOutcome::new(status, messages))
        .ok_or_else(|| ImportError::Io {
            message: "result artifact has no rows".to_string(),
        })
}

//! Companion-hash integrity guard
//!
//! Producers write a companion file next to every artifact, with the same base
//! name and a distinct extension, holding the hex SHA-256 of the artifact
//! bytes. The companion is often written slightly after the artifact itself,
//! so a missing or mismatching companion means "not verified yet" rather than
//! "corrupt".

use crate::types::ImportError;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Result of comparing a fingerprint with a companion file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Match,
    /// Companion exists but holds a different digest
    Mismatch { expected: String },
    /// No companion file
    Missing,
}

/// Lowercase hex SHA-256 of the file bytes
pub fn compute_fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Compare a digest with the contents of a companion file
///
/// The companion may carry surrounding whitespace and a trailing file name
/// (`sha256sum` output); only the first token is compared, case-insensitively.
pub fn verify(digest: &str, companion: Option<&str>) -> Verification {
    match companion {
        None => Verification::Missing,
        Some(contents) => {
            let expected = contents.split_whitespace().next().unwrap_or("");
            if expected.eq_ignore_ascii_case(digest) {
                Verification::Match
            } else {
                Verification::Mismatch {
                    expected: expected.to_string(),
                }
            }
        }
    }
}

/// Path of the companion hash file for `path`
pub fn companion_path(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}

/// Read the companion file, `None` when it does not exist
pub fn read_companion(path: &Path, extension: &str) -> io::Result<Option<String>> {
    match fs::read_to_string(companion_path(path, extension)) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Verify `bytes` read from `path` against its companion
///
/// # Errors
///
/// `IntegrityMissing` or `IntegrityMismatch` when the check does not pass,
/// `Io` when the companion cannot be read.
pub fn check(path: &Path, bytes: &[u8], extension: &str) -> Result<(), ImportError> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digest = compute_fingerprint(bytes);
    let companion = read_companion(path, extension)?;

    match verify(&digest, companion.as_deref()) {
        Verification::Match => Ok(()),
        Verification::Missing => Err(ImportError::IntegrityMissing { file }),
        Verification::Mismatch { expected } => Err(ImportError::IntegrityMismatch {
            file,
            expected,
            actual: digest,
        }),
    }
}

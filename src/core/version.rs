//! Schema version validation
//!
//! A file's header declares its schema version. Before any body is decoded the
//! declared version is compared with the one configured for the submitting
//! company and artifact kind, so files addressed to the wrong consumer are
//! rejected without further work.

use crate::config::VersionConfig;
use crate::types::{ArtifactKind, ImportError};
use std::collections::HashMap;

/// Compare a declared version with the expected one
///
/// # Errors
///
/// `WrongVersion` carrying both values when they differ.
pub fn validate(declared: &str, expected: &str) -> Result<(), ImportError> {
    if declared == expected {
        Ok(())
    } else {
        Err(ImportError::wrong_version(declared, expected))
    }
}

/// Expected version per (company, artifact kind)
///
/// Company entries take precedence over per-kind defaults.
#[derive(Debug, Clone, Default)]
pub struct VersionTable {
    defaults: HashMap<ArtifactKind, String>,
    companies: HashMap<(String, ArtifactKind), String>,
}

impl VersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &VersionConfig) -> Self {
        let mut table = Self::new();
        for (kind, version) in &config.defaults {
            table.set_default(*kind, version);
        }
        for (company, kinds) in &config.companies {
            for (kind, version) in kinds {
                table.set(company, *kind, version);
            }
        }
        table
    }

    pub fn set_default(&mut self, kind: ArtifactKind, version: &str) {
        self.defaults.insert(kind, version.to_string());
    }

    pub fn set(&mut self, company: &str, kind: ArtifactKind, version: &str) {
        self.companies
            .insert((company.to_string(), kind), version.to_string());
    }

    /// Expected version, `None` when nothing is configured
    pub fn expected(&self, company: &str, kind: ArtifactKind) -> Option<&str> {
        self.companies
            .get(&(company.to_string(), kind))
            .or_else(|| self.defaults.get(&kind))
            .map(String::as_str)
    }

    /// Validate a declared version for a company
    ///
    /// Without a configured expectation every version passes; the decoder
    /// lookup still rejects versions without a registered layout.
    pub fn check(
        &self,
        company: &str,
        kind: ArtifactKind,
        declared: &str,
    ) -> Result<(), ImportError> {
        match self.expected(company, kind) {
            Some(expected) => validate(declared, expected),
            None => Ok(()),
        }
    }
}

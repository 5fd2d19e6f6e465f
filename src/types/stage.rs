//! Lifecycle stages of an artifact file
//!
//! Each stage is one directory. A file lives in exactly one of them at a time,
//! with [`Stage::Backup`] as the only non-exclusive copy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// New arrival, not yet imported
    From,
    /// Accepted and handed to the downstream export
    InQueue,
    Accepted,
    Rejected,
    Failed,
    /// Export confirmed by the downstream consumer
    Confirmed,
    /// Downstream consumer already had the content
    AlreadyExists,
    /// Audit copy
    Backup,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::From,
        Stage::InQueue,
        Stage::Accepted,
        Stage::Rejected,
        Stage::Failed,
        Stage::Confirmed,
        Stage::AlreadyExists,
        Stage::Backup,
    ];

    /// Directory name of the stage under a kind's root
    pub fn dir_name(self) -> &'static str {
        match self {
            Stage::From => "from",
            Stage::InQueue => "in-queue",
            Stage::Accepted => "accepted",
            Stage::Rejected => "rejected",
            Stage::Failed => "failed",
            Stage::Confirmed => "confirmed",
            Stage::AlreadyExists => "already-exists",
            Stage::Backup => "backup",
        }
    }

    /// Whether no further transition leaves this stage
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Stage::Rejected | Stage::Failed | Stage::Confirmed | Stage::AlreadyExists
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

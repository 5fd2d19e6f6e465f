//! Polling strategy module
//!
//! This module defines the Strategy pattern for one polling cycle: list the
//! files waiting in the `from` directory of an artifact kind and run each of
//! them through the importer. Implementations differ only in how many files
//! they process at once and can be selected at runtime.

use crate::cli::StrategyType;
use crate::core::Importer;
use crate::types::{ArtifactKind, ImportError, ImportReport, ImportStatus};
use std::path::PathBuf;
use std::sync::Arc;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncPollingStrategy, WorkerConfig};
pub use sync::SyncPollingStrategy;

/// Polling strategy trait
///
/// A strategy never stops at the first failing file: fatal errors are
/// collected in the summary and the remaining files are still processed.
pub trait PollingStrategy: Send + Sync {
    /// Import every file currently pending for `company` and `kind`
    ///
    /// # Errors
    ///
    /// Returns an error only when the `from` directory cannot be listed or
    /// the worker runtime cannot start.
    fn poll(
        &self,
        importer: Arc<Importer>,
        company: &str,
        kind: ArtifactKind,
    ) -> Result<PollSummary, ImportError>;
}

/// Reports and fatal errors of one polling cycle
#[derive(Debug, Default)]
pub struct PollSummary {
    pub reports: Vec<ImportReport>,
    pub errors: Vec<(PathBuf, ImportError)>,
}

impl PollSummary {
    pub fn push(&mut self, file: PathBuf, result: Result<ImportReport, ImportError>) {
        match result {
            Ok(report) => self.reports.push(report),
            Err(e) => {
                log::error!("{}: {}", file.display(), e);
                self.errors.push((file, e));
            }
        }
    }

    /// Files that reached a stage with the given status
    pub fn count(&self, status: ImportStatus) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r, ImportReport::Completed { .. }))
            .filter_map(ImportReport::outcome)
            .filter(|o| o.status() == status)
            .count()
    }

    pub fn deferred(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r, ImportReport::Deferred { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r, ImportReport::Skipped { .. }))
            .count()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Create a polling strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of polling strategy to create (Sync or Async)
/// * `config` - Optional worker configuration (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<WorkerConfig>,
) -> Box<dyn PollingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncPollingStrategy),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncPollingStrategy::new(config))
        }
    }
}

//! Synchronous polling strategy
//!
//! Processes the pending files of one polling cycle one after another, in
//! file-name order, on the calling thread.

use crate::core::Importer;
use crate::strategy::{PollSummary, PollingStrategy};
use crate::types::{ArtifactKind, ImportError, Stage};
use std::sync::Arc;

/// Synchronous polling strategy
///
/// # Examples
///
/// ```no_run
/// use hlz_importer::config::Config;
/// use hlz_importer::core::{Importer, InMemoryDedupStore, InMemoryRecordStore};
/// use hlz_importer::strategy::{PollingStrategy, SyncPollingStrategy};
/// use hlz_importer::types::ArtifactKind;
/// use std::sync::Arc;
///
/// let importer = Arc::new(Importer::new(
///     &Config::default(),
///     Arc::new(InMemoryRecordStore::new()),
///     Arc::new(InMemoryDedupStore::new()),
/// ));
/// let summary = SyncPollingStrategy
///     .poll(importer, "ACME", ArtifactKind::Transactions)
///     .expect("from directory unreadable");
/// println!("{} files processed", summary.reports.len());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SyncPollingStrategy;

impl PollingStrategy for SyncPollingStrategy {
    fn poll(
        &self,
        importer: Arc<Importer>,
        company: &str,
        kind: ArtifactKind,
    ) -> Result<PollSummary, ImportError> {
        let files = importer.lifecycle(kind).pending(Stage::From)?;
        log::debug!("{} {} files pending", files.len(), kind);

        let mut summary = PollSummary::default();
        for file in files {
            let result = importer.import_file(company, kind, &file);
            summary.push(file, result);
        }
        Ok(summary)
    }
}

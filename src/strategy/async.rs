//! Concurrent polling strategy
//!
//! This module provides a multi-threaded implementation of the
//! PollingStrategy trait. Each pending file is imported on tokio's blocking
//! pool, with a semaphore bounding how many files are in flight.
//!
//! # Architecture
//!
//! ```text
//! AsyncPollingStrategy
//!     ├── WorkerConfig (max_concurrent)
//!     ├── claim set (DashSet of in-flight paths)
//!     └── per file: Semaphore permit -> spawn_blocking(Importer::import_file)
//! ```
//!
//! # Mutual Exclusion
//!
//! A file is processed by at most one task of this process: a path already in
//! the claim set is reported as skipped. Across processes the rename out of
//! `from` decides; the loser sees the file vanish and reports it as skipped.

use crate::core::Importer;
use crate::strategy::{PollSummary, PollingStrategy};
use crate::types::{ArtifactKind, ImportError, ImportReport, Stage};
use dashmap::DashSet;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Configuration for concurrent polling
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Maximum number of files imported at the same time
    pub max_concurrent: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get(),
        }
    }
}

impl WorkerConfig {
    /// Create a new WorkerConfig, falling back to the default for zero
    pub fn new(max_concurrent: usize) -> Self {
        if max_concurrent == 0 {
            let default = Self::default();
            log::warn!(
                "Invalid max_concurrent ({}), using default ({})",
                max_concurrent,
                default.max_concurrent
            );
            return default;
        }
        Self { max_concurrent }
    }
}

/// Concurrent polling strategy
///
/// The claim set lives as long as the strategy, so overlapping cycles of the
/// same strategy never pick up a file twice.
#[derive(Debug, Clone)]
pub struct AsyncPollingStrategy {
    config: WorkerConfig,
    claims: Arc<DashSet<PathBuf>>,
}

impl AsyncPollingStrategy {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            claims: Arc::new(DashSet::new()),
        }
    }

    /// Files currently being imported
    pub fn in_flight(&self) -> usize {
        self.claims.len()
    }
}

impl PollingStrategy for AsyncPollingStrategy {
    fn poll(
        &self,
        importer: Arc<Importer>,
        company: &str,
        kind: ArtifactKind,
    ) -> Result<PollSummary, ImportError> {
        let files = importer.lifecycle(kind).pending(Stage::From)?;
        log::debug!(
            "{} {} files pending, {} workers",
            files.len(),
            kind,
            self.config.max_concurrent
        );

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent)
            .max_blocking_threads(self.config.max_concurrent)
            .build()
            .map_err(|e| ImportError::Io {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));

            let tasks = files.into_iter().map(|file| {
                let importer = Arc::clone(&importer);
                let semaphore = Arc::clone(&semaphore);
                let claims = Arc::clone(&self.claims);
                let company = company.to_string();

                async move {
                    if !claims.insert(file.clone()) {
                        log::debug!("{} already in flight", file.display());
                        return (file.clone(), Ok(ImportReport::Skipped { file }));
                    }

                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => {
                            let path = file.clone();
                            tokio::task::spawn_blocking(move || {
                                importer.import_file(&company, kind, &path)
                            })
                            .await
                            .unwrap_or_else(|e| {
                                Err(ImportError::Io {
                                    message: format!("Import task failed: {}", e),
                                })
                            })
                        }
                        Err(e) => Err(ImportError::Io {
                            message: format!("Worker pool closed: {}", e),
                        }),
                    };

                    claims.remove(&file);
                    (file, result)
                }
            });

            let mut summary = PollSummary::default();
            for (file, result) in join_all(tasks).await {
                summary.push(file, result);
            }
            Ok(summary)
        })
    }
}

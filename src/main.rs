//! HLZ importer CLI
//!
//! Command-line interface for importing legacy HLZ files.
//!
//! # Usage
//!
//! ```bash
//! hlz-importer poll --company ACME --kind transactions
//! hlz-importer poll --company ACME --kind bags --strategy sync
//! hlz-importer --config /etc/hlz.toml poll --company ACME --kind label-orders --max-concurrent 8
//! hlz-importer import --company ACME --kind transactions data/transactions/from/b1.hlz
//! hlz-importer export --kind transactions
//! hlz-importer confirm --kind transactions b1.hlz
//! hlz-importer purge
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).
//!
//! # State
//!
//! The dedup index is kept in `<root>/dedup-index.csv` between runs, so a
//! later `poll` or `import` sees keys recorded by earlier ones and `purge`
//! works on the saved history. Job locks are files under `<root>/locks/`.
//! Settled records go to an in-memory store; their database lives outside
//! this binary.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Configuration error, a file could not be moved, or `import` found
//!   the dedup index held by another run

use anyhow::{bail, Context, Result};
use chrono::Utc;
use hlz_importer::cli::{self, Command, StrategyType};
use hlz_importer::config::Config;
use hlz_importer::core::{
    acquire, confirm_export, ExportJob, FileLockProvider, Importer, InMemoryDedupStore,
    InMemoryRecordStore, JobRun, Lifecycle, LogPublisher, Moved, RetentionJob, RetryPolicy,
};
use hlz_importer::io::dedup_index::{self, INDEX_FILE};
use hlz_importer::strategy;
use hlz_importer::types::{ArtifactKind, ImportStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Held for a whole poll, import or purge so runs do not overwrite each other's index
const INDEX_LOCK: &str = "dedup-index";
const INDEX_LOCK_TTL: Duration = Duration::from_secs(3600);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = cli::parse_args();
    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    let root = &config.directories.root;
    let index_path = root.join(INDEX_FILE);
    let locks = Arc::new(FileLockProvider::new(root.join("locks")));

    match args.command {
        Command::Poll(poll) => {
            let Some(_index) = acquire(locks.as_ref(), INDEX_LOCK, INDEX_LOCK_TTL) else {
                log::warn!("Poll skipped, the dedup index is held by another run");
                return Ok(());
            };
            let dedup = load_index(&index_path)?;
            let importer = importer(&config, &dedup);

            let worker_config = match poll.strategy {
                StrategyType::Async => Some(poll.to_worker_config(&config)),
                StrategyType::Sync => None,
            };
            let strategy = strategy::create_strategy(poll.strategy, worker_config);
            let polled = strategy.poll(importer, &poll.company, poll.kind);
            save_index(&index_path, &dedup)?;
            let summary = polled.with_context(|| format!("Failed to poll {} files", poll.kind))?;

            log::info!(
                "{} accepted, {} rejected, {} failed, {} duplicate, {} deferred, {} skipped",
                summary.count(ImportStatus::Accepted),
                summary.count(ImportStatus::Rejected),
                summary.count(ImportStatus::Failed),
                summary.count(ImportStatus::Duplicate),
                summary.deferred(),
                summary.skipped()
            );
            if summary.has_errors() {
                bail!("{} files could not be moved", summary.errors.len());
            }
        }
        Command::Import(import) => {
            let Some(_index) = acquire(locks.as_ref(), INDEX_LOCK, INDEX_LOCK_TTL) else {
                bail!("The dedup index is held by another run, retry later");
            };
            let dedup = load_index(&index_path)?;
            let importer = importer(&config, &dedup);

            let retry = RetryPolicy::from_config(&config.integrity);
            let imported =
                importer.import_message(&import.company, import.kind, &import.file, retry);
            save_index(&index_path, &dedup)?;
            let report =
                imported.with_context(|| format!("Failed to import {}", import.file.display()))?;
            log::debug!("{:?}", report);
        }
        Command::Export { kind } => {
            let job = ExportJob::new(Arc::new(LogPublisher::new()), locks.clone());
            if let JobRun::Ran(queued) = job.run(kind, &lifecycle(&config, kind))? {
                log::debug!("{} files now in-queue", queued);
            }
        }
        Command::Confirm {
            kind,
            file_name,
            already_exists,
        } => {
            let moved = confirm_export(&lifecycle(&config, kind), &file_name, already_exists)
                .with_context(|| format!("Failed to confirm {}", file_name))?;
            if moved == Moved::Vanished {
                log::warn!("{} is not waiting in in-queue", file_name);
            }
        }
        Command::Purge => {
            let Some(_index) = acquire(locks.as_ref(), INDEX_LOCK, INDEX_LOCK_TTL) else {
                log::warn!("Purge skipped, the dedup index is held by another run");
                return Ok(());
            };
            let dedup = load_index(&index_path)?;
            let job = RetentionJob::new(dedup.clone(), locks.clone(), config.retention.days);
            if let JobRun::Ran(_) = job.run(Utc::now())? {
                save_index(&index_path, &dedup)?;
            }
        }
    }

    Ok(())
}

fn importer(config: &Config, dedup: &Arc<InMemoryDedupStore>) -> Arc<Importer> {
    Arc::new(Importer::new(
        config,
        Arc::new(InMemoryRecordStore::new()),
        dedup.clone(),
    ))
}

fn lifecycle(config: &Config, kind: ArtifactKind) -> Lifecycle {
    Lifecycle::new(
        config.layout().set(kind),
        &config.integrity.hash_extension,
        config.backup,
    )
}

fn load_index(path: &Path) -> Result<Arc<InMemoryDedupStore>> {
    let entries = dedup_index::load(path)
        .with_context(|| format!("Failed to load dedup index {}", path.display()))?;
    log::debug!("Loaded {} dedup entries from {}", entries.len(), path.display());
    Ok(Arc::new(InMemoryDedupStore::from_entries(entries)))
}

fn save_index(path: &Path, dedup: &InMemoryDedupStore) -> Result<()> {
    dedup_index::save(path, &dedup.entries())
        .with_context(|| format!("Failed to save dedup index {}", path.display()))
}

//! Scheduled jobs
//!
//! `ExportJob` hands accepted files to the downstream export and
//! `RetentionJob` purges old dedup entries. Both take a named lock first and
//! skip the cycle when another instance holds it.

use crate::core::lifecycle::{Event, Lifecycle, Moved};
use crate::core::traits::{acquire, DedupStore, ExportPublisher, ExportRequest, LockProvider};
use crate::types::{ArtifactKind, ImportError, Stage};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Default time a job lock is held before others may take it over
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(600);

/// What one job cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRun {
    /// Another instance holds the lock
    Skipped,
    /// Number of files moved or entries purged
    Ran(usize),
}

/// Moves accepted files to `in-queue` and requests their export
pub struct ExportJob {
    publisher: Arc<dyn ExportPublisher>,
    locks: Arc<dyn LockProvider>,
    ttl: Duration,
}

impl ExportJob {
    pub fn new(publisher: Arc<dyn ExportPublisher>, locks: Arc<dyn LockProvider>) -> Self {
        Self {
            publisher,
            locks,
            ttl: DEFAULT_LOCK_TTL,
        }
    }

    /// Run one cycle over the `accepted` directory of `kind`
    ///
    /// The request is published before the move, so a file whose move fails
    /// is published again on the next cycle.
    ///
    /// # Errors
    ///
    /// Returns the first publish or move failure; files handled before it
    /// stay in `in-queue`.
    pub fn run(&self, kind: ArtifactKind, lifecycle: &Lifecycle) -> Result<JobRun, ImportError> {
        let Some(_guard) = acquire(self.locks.as_ref(), &format!("export-{}", kind), self.ttl)
        else {
            log::warn!("Export of {} skipped, lock held elsewhere", kind);
            return Ok(JobRun::Skipped);
        };

        let mut queued = 0;
        for file in lifecycle.pending(Stage::Accepted)? {
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.publisher.publish(&ExportRequest { kind, file_name })?;
            let moved = lifecycle.advance(&file, Stage::Accepted, Event::Queued, None)?;
            if let Moved::To { .. } = moved {
                queued += 1;
            }
        }

        log::info!("Queued {} {} files for export", queued, kind);
        Ok(JobRun::Ran(queued))
    }
}

/// Record the downstream answer for a file waiting in `in-queue`
///
/// `already_exists` routes the file to `already-exists` instead of
/// `confirmed`. A file no longer in `in-queue` yields [`Moved::Vanished`].
pub fn confirm_export(
    lifecycle: &Lifecycle,
    file_name: &str,
    already_exists: bool,
) -> Result<Moved, ImportError> {
    let event = if already_exists {
        Event::ExportAlreadyExists
    } else {
        Event::ExportConfirmed
    };
    let file = lifecycle.dirs().path(Stage::InQueue).join(file_name);
    lifecycle.advance(&file, Stage::InQueue, event, None)
}

/// Purges dedup entries older than the retention window
pub struct RetentionJob {
    dedup: Arc<dyn DedupStore>,
    locks: Arc<dyn LockProvider>,
    days: i64,
    ttl: Duration,
}

impl RetentionJob {
    pub fn new(dedup: Arc<dyn DedupStore>, locks: Arc<dyn LockProvider>, days: i64) -> Self {
        Self {
            dedup,
            locks,
            days,
            ttl: DEFAULT_LOCK_TTL,
        }
    }

    /// Purge entries recorded before `now` minus the retention window
    pub fn run(&self, now: DateTime<Utc>) -> Result<JobRun, ImportError> {
        let Some(_guard) = acquire(self.locks.as_ref(), "retention", self.ttl) else {
            log::warn!("Retention purge skipped, lock held elsewhere");
            return Ok(JobRun::Skipped);
        };

        let cutoff = now - ChronoDuration::days(self.days);
        let purged = self.dedup.purge_older_than(cutoff)?;
        log::info!("Purged {} dedup entries recorded before {}", purged, cutoff);
        Ok(JobRun::Ran(purged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dedup_store::InMemoryDedupStore;
    use crate::core::lifecycle::DirectorySet;
    use crate::core::local::{LocalLockProvider, LogPublisher};
    use crate::types::{DedupEntry, NaturalKey};
    use std::fs;
    use tempfile::TempDir;

    fn accepted_file(lifecycle: &Lifecycle, name: &str) {
        let dir = lifecycle.ensure_dir(Stage::Accepted).unwrap();
        fs::write(dir.join(name), b"content").unwrap();
    }

    #[test]
    fn test_export_queues_and_publishes() {
        let dir = TempDir::new().unwrap();
        let lifecycle = Lifecycle::new(DirectorySet::from_root(dir.path()), "sha256", false);
        accepted_file(&lifecycle, "b1.hlz");
        accepted_file(&lifecycle, "b2.hlz");
        let publisher = Arc::new(LogPublisher::new());
        let job = ExportJob::new(publisher.clone(), Arc::new(LocalLockProvider::new()));

        let run = job.run(ArtifactKind::Transactions, &lifecycle).unwrap();

        assert_eq!(run, JobRun::Ran(2));
        assert_eq!(publisher.published().len(), 2);
        assert_eq!(lifecycle.locate("b1.hlz"), vec![Stage::InQueue]);

        confirm_export(&lifecycle, "b1.hlz", false).unwrap();
        confirm_export(&lifecycle, "b2.hlz", true).unwrap();
        assert_eq!(lifecycle.locate("b1.hlz"), vec![Stage::Confirmed]);
        assert_eq!(lifecycle.locate("b2.hlz"), vec![Stage::AlreadyExists]);
    }

    #[test]
    fn test_confirm_unknown_file_vanished() {
        let dir = TempDir::new().unwrap();
        let lifecycle = Lifecycle::new(DirectorySet::from_root(dir.path()), "sha256", false);
        assert_eq!(
            confirm_export(&lifecycle, "nope.hlz", false).unwrap(),
            Moved::Vanished
        );
    }

    #[test]
    fn test_export_skips_when_locked() {
        let dir = TempDir::new().unwrap();
        let lifecycle = Lifecycle::new(DirectorySet::from_root(dir.path()), "sha256", false);
        accepted_file(&lifecycle, "b1.hlz");
        let locks = Arc::new(LocalLockProvider::new());
        assert!(locks.try_acquire("export-transactions", Duration::from_secs(60)));
        let job = ExportJob::new(Arc::new(LogPublisher::new()), locks);

        assert_eq!(
            job.run(ArtifactKind::Transactions, &lifecycle).unwrap(),
            JobRun::Skipped
        );
        assert_eq!(lifecycle.locate("b1.hlz"), vec![Stage::Accepted]);
    }

    #[test]
    fn test_retention_purges_and_releases_lock() {
        let dedup = Arc::new(InMemoryDedupStore::new());
        let now = Utc::now();
        dedup
            .record_latest(DedupEntry::Key {
                key: NaturalKey::Bag {
                    customer: "C".into(),
                    label: "L".into(),
                },
                recorded_at: now - ChronoDuration::days(91),
            })
            .unwrap();
        let locks = Arc::new(LocalLockProvider::new());
        let job = RetentionJob::new(dedup.clone(), locks.clone(), 90);

        assert_eq!(job.run(now).unwrap(), JobRun::Ran(1));
        assert!(dedup.is_empty());
        assert!(locks.try_acquire("retention", Duration::from_secs(1)));
        assert_eq!(job.run(now).unwrap(), JobRun::Skipped);
    }
}

//! Collaborator traits at the boundary of the importer
//!
//! Persistence, message-bus transport and distributed locking are external to
//! the importer. The pipeline and jobs only see these traits; in-memory
//! implementations live next to them for tests and the CLI.

use crate::types::{ArtifactKind, DedupClaim, DedupEntry, ImportError, NaturalKey, SettledRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::Duration;

/// Dedup index of natural keys and label ranges
///
/// Implementations must be safe to share between concurrent workers.
pub trait DedupStore: Send + Sync {
    /// Whether `key` is recorded as latest
    fn exists_by_natural_key(&self, key: &NaturalKey) -> Result<bool, ImportError>;

    /// Whether a non-exhausted range of `customer` overlaps `[start, end]`
    ///
    /// Both bounds are inclusive. With `owner` set, only ranges of that owner
    /// are considered.
    fn exists_by_range_overlap(
        &self,
        customer: &str,
        owner: Option<&str>,
        start: u64,
        end: u64,
    ) -> Result<bool, ImportError>;

    /// Record a key or range as latest (idempotent upsert)
    fn record_latest(&self, entry: DedupEntry) -> Result<(), ImportError>;

    /// Check every claim of one file and record them in one step
    ///
    /// Returns the indices of `claims` that collide with recorded entries.
    /// When any collides nothing is recorded. Two calls never both succeed
    /// for the same key or for overlapping ranges. Claims are not checked
    /// against each other.
    fn try_claim(
        &self,
        claims: &[DedupClaim],
        recorded_at: DateTime<Utc>,
    ) -> Result<Vec<usize>, ImportError>;

    /// Drop the entries a successful [`DedupStore::try_claim`] recorded at `recorded_at`
    fn release(
        &self,
        claims: &[DedupClaim],
        recorded_at: DateTime<Utc>,
    ) -> Result<(), ImportError>;

    /// Flag the range of `customer` starting at `first_label` as consumed
    ///
    /// Returns whether a range was found.
    fn mark_exhausted(&self, customer: &str, first_label: u64) -> Result<bool, ImportError>;

    /// Delete entries recorded before `cutoff`, returning how many
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, ImportError>;
}

/// Store of settled records
pub trait RecordStore: Send + Sync {
    fn exists(&self, kind: ArtifactKind, key: &str) -> Result<bool, ImportError>;

    fn find_by_key(&self, kind: ArtifactKind, key: &str)
        -> Result<Option<SettledRecord>, ImportError>;

    fn save(&self, record: SettledRecord) -> Result<(), ImportError>;

    /// Save a whole file's records, returning how many were stored
    ///
    /// Either every record is stored or, on error, none is.
    fn save_all(&self, records: Vec<SettledRecord>) -> Result<usize, ImportError>;

    /// Delete records of `kind` whose timestamp lies in `[from, to)`
    fn delete_by_period(
        &self,
        kind: ArtifactKind,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<usize, ImportError>;
}

/// Message sent to trigger the downstream export of an accepted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub kind: ArtifactKind,
    pub file_name: String,
}

/// Message-bus publish call
pub trait ExportPublisher: Send + Sync {
    fn publish(&self, request: &ExportRequest) -> Result<(), ImportError>;
}

/// Best-effort distributed lock for scheduled jobs
pub trait LockProvider: Send + Sync {
    /// Try to take `name` for at most `ttl`; `false` when someone else holds it
    fn try_acquire(&self, name: &str, ttl: Duration) -> bool;

    fn release(&self, name: &str);
}

/// A held lock, released when dropped
pub struct LockGuard<'a> {
    locks: &'a dyn LockProvider,
    name: String,
}

impl LockGuard<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.name);
    }
}

/// Take `name` from `locks`, `None` when it is held elsewhere
pub fn acquire<'a>(
    locks: &'a dyn LockProvider,
    name: &str,
    ttl: Duration,
) -> Option<LockGuard<'a>> {
    locks.try_acquire(name, ttl).then(|| LockGuard {
        locks,
        name: name.to_string(),
    })
}

//! Local collaborators
//!
//! `LocalLockProvider` and `LogPublisher` stand in for the distributed lock
//! and the message bus when the importer runs as a single process, and in
//! tests. `FileLockProvider` shares locks between processes on one host.

use crate::core::traits::{ExportPublisher, ExportRequest, LockProvider};
use crate::types::ImportError;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, UNIX_EPOCH};

/// Lock provider scoped to the current process
///
/// A lock whose ttl elapsed can be taken over by the next caller.
#[derive(Debug, Default)]
pub struct LocalLockProvider {
    held: DashMap<String, Instant>,
}

impl LocalLockProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockProvider for LocalLockProvider {
    fn try_acquire(&self, name: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        match self.held.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() <= now {
                    entry.insert(now + ttl);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now + ttl);
                true
            }
        }
    }

    fn release(&self, name: &str) {
        self.held.remove(name);
    }
}

/// Lock provider backed by `<dir>/<name>.lock` files
///
/// A lock file holds the Unix time its lock expires at. An expired lock is
/// taken over by the next caller. A lock file whose content cannot be read
/// expires `ttl` after it was last modified.
#[derive(Debug, Clone)]
pub struct FileLockProvider {
    dir: PathBuf,
}

impl FileLockProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", name))
    }

    fn create(path: &Path, expires_at: i64) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        write!(file, "{}", expires_at)
    }

    fn expires_at(path: &Path, ttl: Duration) -> Option<i64> {
        if let Some(expires_at) = fs::read_to_string(path)
            .ok()
            .and_then(|text| text.trim().parse().ok())
        {
            return Some(expires_at);
        }
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
        Some((since_epoch + ttl).as_secs() as i64)
    }
}

impl LockProvider for FileLockProvider {
    fn try_acquire(&self, name: &str, ttl: Duration) -> bool {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            log::error!("Cannot create lock directory {}: {}", self.dir.display(), e);
            return false;
        }
        let path = self.lock_path(name);
        let now = Utc::now().timestamp();
        let expires_at = now + ttl.as_secs() as i64;

        match Self::create(&path, expires_at) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                match Self::expires_at(&path, ttl) {
                    Some(held_until) if held_until > now => false,
                    _ => {
                        log::warn!("Taking over expired lock {}", name);
                        if let Err(e) = fs::remove_file(&path) {
                            if e.kind() != io::ErrorKind::NotFound {
                                log::error!("Cannot remove lock {}: {}", path.display(), e);
                                return false;
                            }
                        }
                        Self::create(&path, expires_at).is_ok()
                    }
                }
            }
            Err(e) => {
                log::error!("Cannot create lock {}: {}", path.display(), e);
                false
            }
        }
    }

    fn release(&self, name: &str) {
        let path = self.lock_path(name);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Cannot release lock {}: {}", path.display(), e);
            }
        }
    }
}

/// Publisher that logs and remembers every export request
#[derive(Debug, Default)]
pub struct LogPublisher {
    published: Mutex<Vec<ExportRequest>>,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests published so far
    pub fn published(&self) -> Vec<ExportRequest> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl ExportPublisher for LogPublisher {
    fn publish(&self, request: &ExportRequest) -> Result<(), ImportError> {
        log::info!("Export requested for {} file {}", request.kind, request.file_name);
        self.published
            .lock()
            .map_err(|_| ImportError::persistence("export log poisoned"))?
            .push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::acquire;
    use crate::types::ArtifactKind;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive_until_released() {
        let locks = LocalLockProvider::new();
        let ttl = Duration::from_secs(60);

        assert!(locks.try_acquire("retention", ttl));
        assert!(!locks.try_acquire("retention", ttl));
        assert!(locks.try_acquire("export", ttl));

        locks.release("retention");
        assert!(locks.try_acquire("retention", ttl));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = LocalLockProvider::new();
        let ttl = Duration::from_secs(60);
        {
            let guard = acquire(&locks, "export-bags", ttl).unwrap();
            assert_eq!(guard.name(), "export-bags");
            assert!(acquire(&locks, "export-bags", ttl).is_none());
        }
        assert!(acquire(&locks, "export-bags", ttl).is_some());
    }

    #[test]
    fn test_expired_lock_can_be_taken_over() {
        let locks = LocalLockProvider::new();
        assert!(locks.try_acquire("retention", Duration::ZERO));
        assert!(locks.try_acquire("retention", Duration::from_secs(60)));
    }

    #[test]
    fn test_publisher_remembers_requests() {
        let publisher = LogPublisher::new();
        let request = ExportRequest {
            kind: ArtifactKind::Transactions,
            file_name: "b1.hlz".into(),
        };
        publisher.publish(&request).unwrap();

        assert_eq!(publisher.published(), vec![request]);
    }

    #[test]
    fn test_file_lock_is_shared_between_providers() {
        let dir = TempDir::new().unwrap();
        let first = FileLockProvider::new(dir.path().join("locks"));
        let second = FileLockProvider::new(dir.path().join("locks"));
        let ttl = Duration::from_secs(60);

        assert!(first.try_acquire("retention", ttl));
        assert!(!second.try_acquire("retention", ttl));
        assert!(second.try_acquire("export-bags", ttl));

        first.release("retention");
        assert!(second.try_acquire("retention", ttl));
    }

    #[test]
    fn test_expired_file_lock_can_be_taken_over() {
        let dir = TempDir::new().unwrap();
        let locks = FileLockProvider::new(dir.path());
        assert!(locks.try_acquire("retention", Duration::ZERO));
        assert!(locks.try_acquire("retention", Duration::from_secs(60)));
        assert!(!locks.try_acquire("retention", Duration::from_secs(60)));
    }

    #[test]
    fn test_file_lock_guard_removes_file() {
        let dir = TempDir::new().unwrap();
        let locks = FileLockProvider::new(dir.path());
        {
            let _guard = acquire(&locks, "dedup-index", Duration::from_secs(60)).unwrap();
            assert!(dir.path().join("dedup-index.lock").is_file());
        }
        assert!(!dir.path().join("dedup-index.lock").exists());
    }
}

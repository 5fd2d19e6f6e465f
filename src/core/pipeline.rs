//! Importer pipeline
//!
//! This module provides the `Importer` that drives one file through
//! integrity guard, header decode, version validation, body decode, domain
//! mapping, duplicate detection and persistence, then hands the outcome to the
//! directory lifecycle.
//!
//! # Design
//!
//! Every step either yields the input of the next step or an error that ends
//! the run. Errors are folded into an [`ImportOutcome`] and never escape,
//! except the ones raised while moving the file. All records of a file are
//! mapped and checked before any of them reaches the record store, so a file
//! is persisted completely or not at all.
//!
//! # Thread Safety
//!
//! `Importer` holds shared handles to its stores and can be used from several
//! workers at once, as long as each file is handed to a single worker. The
//! dedup claims of a file are checked and recorded in one
//! [`DedupStore::try_claim`] call before its records are saved, so two files
//! asserting the same key cannot both be accepted. The claims are released
//! again when saving fails.

use crate::config::{Config, IntegrityConfig};
use crate::core::lifecycle::{transition, DirectoryLayout, Event, Lifecycle, Moved};
use crate::core::traits::{DedupStore, RecordStore};
use crate::core::version::VersionTable;
use crate::io::integrity;
use crate::io::mapping::header_date;
use crate::io::{decode_bodies, decode_header, map_body, BodyLayout, TokenCursor};
use crate::types::{
    ArtifactKind, DedupClaim, ImportError, ImportOutcome, ImportReport, LabelRange, NaturalKey,
    SettledRecord, Stage,
};
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

/// Integrity retries on the message-driven path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of integrity checks, at least one
    pub attempts: u32,
    /// Pause between two checks
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Single check, no waiting
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_config(config: &IntegrityConfig) -> Self {
        Self::new(config.message_retry_attempts, config.retry_delay())
    }
}

/// Outcome of evaluating file contents, before any move
struct Evaluation {
    outcome: ImportOutcome,
    persisted: usize,
}

impl Evaluation {
    fn failed(line: usize, error: &ImportError) -> Self {
        Self {
            outcome: ImportOutcome::from_error(line, error),
            persisted: 0,
        }
    }
}

/// Drives files through the import steps
pub struct Importer {
    layout: DirectoryLayout,
    versions: VersionTable,
    integrity: IntegrityConfig,
    backup: bool,
    records: Arc<dyn RecordStore>,
    dedup: Arc<dyn DedupStore>,
}

impl Importer {
    /// Create an importer from the loaded configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Directory layout, version table and integrity settings
    /// * `records` - Store receiving the settled records
    /// * `dedup` - Index of natural keys and label ranges
    pub fn new(config: &Config, records: Arc<dyn RecordStore>, dedup: Arc<dyn DedupStore>) -> Self {
        Self {
            layout: config.layout(),
            versions: config.version_table(),
            integrity: config.integrity.clone(),
            backup: config.backup,
            records,
            dedup,
        }
    }

    /// Replace the version table
    pub fn with_versions(mut self, versions: VersionTable) -> Self {
        self.versions = versions;
        self
    }

    /// Lifecycle of the stage directories of `kind`
    pub fn lifecycle(&self, kind: ArtifactKind) -> Lifecycle {
        Lifecycle::new(self.layout.set(kind), &self.integrity.hash_extension, self.backup)
    }

    pub fn integrity(&self) -> &IntegrityConfig {
        &self.integrity
    }

    /// Import a file found by polling the `from` directory
    ///
    /// A file whose integrity check does not pass stays in `from` until it is
    /// older than the grace period, then it is moved to `failed`.
    ///
    /// # Arguments
    ///
    /// * `company` - Company the file belongs to, selects the expected version
    /// * `kind` - Artifact kind of the file
    /// * `path` - File inside the `from` directory of `kind`
    ///
    /// # Returns
    ///
    /// * `Completed` when the file was moved to its terminal or accepted stage
    /// * `Deferred` when the file waits for its companion hash
    /// * `Skipped` when another worker claimed the file first
    ///
    /// # Errors
    ///
    /// Returns `FileMove` (or `Io` for the stage directory) when the final move
    /// fails. Records may already be persisted in that case.
    pub fn import_file(
        &self,
        company: &str,
        kind: ArtifactKind,
        path: &Path,
    ) -> Result<ImportReport, ImportError> {
        let Some(bytes) = read_claimed(path)? else {
            return Ok(ImportReport::Skipped {
                file: path.to_path_buf(),
            });
        };

        if let Err(e) = integrity::check(path, &bytes, &self.integrity.hash_extension) {
            let outcome = ImportOutcome::from_error(0, &e);
            if e.is_integrity() && file_age(path) < self.integrity.grace() {
                log::warn!("{} not verified yet, deferring: {}", path.display(), e);
                return Ok(ImportReport::Deferred {
                    file: path.to_path_buf(),
                    outcome,
                });
            }
            log::warn!("{} failed integrity check: {}", path.display(), e);
            return self.complete(kind, path, Evaluation { outcome, persisted: 0 });
        }

        let evaluation = self.evaluate(company, kind, &file_name(path), &bytes);
        self.complete(kind, path, evaluation)
    }

    /// Import a file announced by a message
    ///
    /// The integrity check is repeated up to `retry.attempts` times with
    /// `retry.delay` in between. When it never passes the file is moved to
    /// `failed`.
    ///
    /// # Errors
    ///
    /// Same as [`Importer::import_file`].
    pub fn import_message(
        &self,
        company: &str,
        kind: ArtifactKind,
        path: &Path,
        retry: RetryPolicy,
    ) -> Result<ImportReport, ImportError> {
        let mut attempt = 1;
        loop {
            let Some(bytes) = read_claimed(path)? else {
                return Ok(ImportReport::Skipped {
                    file: path.to_path_buf(),
                });
            };

            match integrity::check(path, &bytes, &self.integrity.hash_extension) {
                Ok(()) => {
                    let evaluation = self.evaluate(company, kind, &file_name(path), &bytes);
                    return self.complete(kind, path, evaluation);
                }
                Err(e) if e.is_integrity() && attempt < retry.attempts => {
                    log::warn!(
                        "{} not verified (attempt {}/{}): {}",
                        path.display(),
                        attempt,
                        retry.attempts,
                        e
                    );
                    attempt += 1;
                    thread::sleep(retry.delay);
                }
                Err(e) => {
                    log::warn!("{} failed integrity check: {}", path.display(), e);
                    let outcome = ImportOutcome::from_error(0, &e);
                    return self.complete(kind, path, Evaluation { outcome, persisted: 0 });
                }
            }
        }
    }

    /// Import an in-memory payload
    ///
    /// No integrity check and no directory move; only the outcome and the
    /// number of persisted records are reported.
    pub fn import_payload(
        &self,
        company: &str,
        kind: ArtifactKind,
        name: &str,
        bytes: &[u8],
    ) -> ImportReport {
        let evaluation = self.evaluate(company, kind, name, bytes);
        log::info!("Payload {} {}", name, evaluation.outcome.status());
        ImportReport::Payload {
            name: name.to_string(),
            outcome: evaluation.outcome,
            persisted: evaluation.persisted,
        }
    }

    /// Move `path` out of `from` according to the outcome
    fn complete(
        &self,
        kind: ArtifactKind,
        path: &Path,
        evaluation: Evaluation,
    ) -> Result<ImportReport, ImportError> {
        let event = Event::Imported(evaluation.outcome.status());
        let moved = self
            .lifecycle(kind)
            .advance(path, Stage::From, event, Some(&evaluation.outcome))?;

        match moved {
            Moved::To { path: file, stage } => {
                log::info!(
                    "{} {} ({} records persisted)",
                    file.display(),
                    evaluation.outcome.status(),
                    evaluation.persisted
                );
                Ok(ImportReport::Completed {
                    file,
                    outcome: evaluation.outcome,
                    stage,
                    persisted: evaluation.persisted,
                })
            }
            Moved::Vanished => Ok(ImportReport::Skipped {
                file: path.to_path_buf(),
            }),
        }
    }

    /// Run every step that does not touch the directory tree
    fn evaluate(&self, company: &str, kind: ArtifactKind, name: &str, bytes: &[u8]) -> Evaluation {
        let mut cursor = TokenCursor::new(bytes);

        let header = match decode_header(&mut cursor, kind) {
            Ok(header) => header,
            Err(e) => return Evaluation::failed(cursor.line(), &e),
        };
        log::debug!(
            "{}: header version {} from {}",
            name,
            header.message_version_number,
            header.gln_service_provider
        );

        let version = &header.message_version_number;
        if let Err(e) = self.versions.check(company, kind, version) {
            return Evaluation::failed(header.line, &e);
        }
        let layout = match BodyLayout::lookup(kind, version) {
            Ok(layout) => layout,
            Err(e) => return Evaluation::failed(header.line, &e),
        };

        let bodies = match decode_bodies(&mut cursor, layout) {
            Ok(bodies) => bodies,
            Err(e) => return Evaluation::failed(cursor.line(), &e),
        };
        if bodies.is_empty() {
            let e = ImportError::EmptyFile {
                file: name.to_string(),
            };
            return Evaluation::failed(header.line, &e);
        }
        log::debug!("{}: decoded {} {:?} bodies", name, bodies.len(), layout);

        let file_created_at = match header_date(&header) {
            Ok(date) => date,
            Err(e) => return Evaluation::failed(header.line, &e),
        };

        let mut errors = Vec::new();
        let mut records = Vec::with_capacity(bodies.len());
        for body in &bodies {
            match map_body(company, &header, file_created_at, body) {
                Ok(record) => records.push((body.line, record)),
                Err(field_errors) => {
                    errors.extend(field_errors.into_iter().map(|e| (body.line, e)));
                }
            }
        }
        if !errors.is_empty() {
            return Evaluation {
                outcome: ImportOutcome::from_errors(errors),
                persisted: 0,
            };
        }

        let claims = match in_file_claims(&records) {
            Ok(claims) => claims,
            Err(errors) => {
                return Evaluation {
                    outcome: ImportOutcome::from_errors(errors),
                    persisted: 0,
                }
            }
        };

        let recorded_at = Utc::now();
        match self.dedup.try_claim(&claims, recorded_at) {
            Ok(collisions) if collisions.is_empty() => {}
            Ok(collisions) => {
                let errors: Vec<(usize, ImportError)> = collisions
                    .into_iter()
                    .filter_map(|i| Some((records.get(i)?.0, duplicate_error(claims.get(i)?))))
                    .collect();
                return Evaluation {
                    outcome: ImportOutcome::from_errors(errors),
                    persisted: 0,
                };
            }
            Err(e) => {
                log::error!("{}: dedup index unavailable: {}", name, e);
                return Evaluation::failed(0, &e);
            }
        }

        let records: Vec<SettledRecord> = records.into_iter().map(|(_, r)| r).collect();
        let persisted = match self.records.save_all(records) {
            Ok(count) => count,
            Err(e) => {
                log::error!("{}: store rejected records: {}", name, e);
                if let Err(release) = self.dedup.release(&claims, recorded_at) {
                    log::error!("{}: dedup claims left behind: {}", name, release);
                }
                return Evaluation::failed(0, &e);
            }
        };

        Evaluation {
            outcome: ImportOutcome::accepted(Vec::new()),
            persisted,
        }
    }
}

/// Claims of every record, or the records colliding with an earlier one of the same file
fn in_file_claims(
    records: &[(usize, SettledRecord)],
) -> Result<Vec<DedupClaim>, Vec<(usize, ImportError)>> {
    let mut errors = Vec::new();
    let mut claims = Vec::with_capacity(records.len());
    let mut seen_keys: HashSet<NaturalKey> = HashSet::new();
    let mut seen_ranges: Vec<LabelRange> = Vec::new();

    for (line, record) in records {
        let claim = record.dedup_claim();
        let duplicate = match &claim {
            DedupClaim::Key(key) => !seen_keys.insert(key.clone()),
            DedupClaim::Range(range) => {
                let overlap = seen_ranges.iter().any(|r| {
                    r.customer == range.customer
                        && r.matches_owner(range.owner.as_deref())
                        && r.overlaps(range.first, range.last)
                });
                seen_ranges.push(range.clone());
                overlap
            }
        };
        if duplicate {
            errors.push((*line, duplicate_error(&claim)));
        }
        claims.push(claim);
    }

    if errors.is_empty() {
        Ok(claims)
    } else {
        Err(errors)
    }
}

fn duplicate_error(claim: &DedupClaim) -> ImportError {
    match claim {
        DedupClaim::Key(key) => ImportError::DuplicateNaturalKey {
            key: key.to_string(),
        },
        DedupClaim::Range(range) => ImportError::DuplicateRangeOverlap {
            customer: range.customer.clone(),
            first: range.first,
            last: range.last,
        },
    }
}

/// Read the file, `None` when another worker already moved it
fn read_claimed(path: &Path) -> Result<Option<Vec<u8>>, ImportError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("{} vanished before it was read", path.display());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Time since the file was last modified, zero when unknown
fn file_age(path: &Path) -> Duration {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .unwrap_or(Duration::ZERO)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Stage a file reaches for a given outcome
pub fn target_stage(outcome: &ImportOutcome) -> Stage {
    transition(Stage::From, Event::Imported(outcome.status())).unwrap_or(Stage::Failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dedup_store::InMemoryDedupStore;
    use crate::core::record_store::InMemoryRecordStore;
    use crate::types::{DedupEntry, ImportStatus};
    use chrono::{DateTime, NaiveDateTime};
    use rstest::rstest;

    const BAG_HEADER: &str = "000001 HLZ 001 20240105 4012345000009 4098765000003 X";
    const ORDER_HEADER: &str = "000002 HLZ 001 20240105 4012345000009 4098765000003 X";

    fn importer() -> (Importer, Arc<InMemoryRecordStore>, Arc<InMemoryDedupStore>) {
        let records = Arc::new(InMemoryRecordStore::new());
        let dedup = Arc::new(InMemoryDedupStore::new());
        let importer = Importer::new(&Config::default(), records.clone(), dedup.clone());
        (importer, records, dedup)
    }

    fn bag(label: &str) -> String {
        format!("C1 {} 20240105083000 12 300", label)
    }

    fn order(first: u64, last: u64) -> String {
        format!("C1 0 {} {} 20240105083000", first, last)
    }

    fn payload(header: &str, bodies: &[String]) -> Vec<u8> {
        let mut text = header.to_string();
        for body in bodies {
            text.push('\n');
            text.push_str(body);
        }
        text.into_bytes()
    }

    fn status(report: &ImportReport) -> ImportStatus {
        report.outcome().map(|o| o.status()).unwrap()
    }

    fn offline() -> ImportError {
        ImportError::persistence("database offline")
    }

    struct OfflineRecordStore;

    impl RecordStore for OfflineRecordStore {
        fn exists(&self, _: ArtifactKind, _: &str) -> Result<bool, ImportError> {
            Err(offline())
        }

        fn find_by_key(
            &self,
            _: ArtifactKind,
            _: &str,
        ) -> Result<Option<SettledRecord>, ImportError> {
            Err(offline())
        }

        fn save(&self, _: SettledRecord) -> Result<(), ImportError> {
            Err(offline())
        }

        fn save_all(&self, _: Vec<SettledRecord>) -> Result<usize, ImportError> {
            Err(offline())
        }

        fn delete_by_period(
            &self,
            _: ArtifactKind,
            _: NaiveDateTime,
            _: NaiveDateTime,
        ) -> Result<usize, ImportError> {
            Err(offline())
        }
    }

    struct OfflineDedupStore;

    impl DedupStore for OfflineDedupStore {
        fn exists_by_natural_key(&self, _: &NaturalKey) -> Result<bool, ImportError> {
            Err(offline())
        }

        fn exists_by_range_overlap(
            &self,
            _: &str,
            _: Option<&str>,
            _: u64,
            _: u64,
        ) -> Result<bool, ImportError> {
            Err(offline())
        }

        fn record_latest(&self, _: DedupEntry) -> Result<(), ImportError> {
            Err(offline())
        }

        fn try_claim(
            &self,
            _: &[DedupClaim],
            _: DateTime<Utc>,
        ) -> Result<Vec<usize>, ImportError> {
            Err(offline())
        }

        fn release(&self, _: &[DedupClaim], _: DateTime<Utc>) -> Result<(), ImportError> {
            Err(offline())
        }

        fn mark_exhausted(&self, _: &str, _: u64) -> Result<bool, ImportError> {
            Err(offline())
        }

        fn purge_older_than(&self, _: DateTime<Utc>) -> Result<usize, ImportError> {
            Err(offline())
        }
    }

    #[test]
    fn test_payload_accepted_and_persisted() {
        let (importer, records, dedup) = importer();
        let bytes = payload(BAG_HEADER, &[bag("L1"), bag("L2")]);

        let report = importer.import_payload("ACME", ArtifactKind::Bags, "bags.hlz", &bytes);

        assert_eq!(status(&report), ImportStatus::Accepted);
        assert_eq!(report.persisted(), 2);
        assert_eq!(records.count(ArtifactKind::Bags), 2);
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_second_import_is_duplicate() {
        let (importer, records, _) = importer();
        let bytes = payload(BAG_HEADER, &[bag("L1")]);

        importer.import_payload("ACME", ArtifactKind::Bags, "bags.hlz", &bytes);
        let report = importer.import_payload("ACME", ArtifactKind::Bags, "bags.hlz", &bytes);

        assert_eq!(status(&report), ImportStatus::Duplicate);
        assert_eq!(report.persisted(), 0);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_duplicate_inside_one_file() {
        let (importer, records, _) = importer();
        let bytes = payload(BAG_HEADER, &[bag("L1"), bag("L1")]);

        let report = importer.import_payload("ACME", ArtifactKind::Bags, "bags.hlz", &bytes);

        assert_eq!(status(&report), ImportStatus::Duplicate);
        assert_eq!(report.outcome().unwrap().messages()[0].line, 3);
        assert!(records.is_empty());
    }

    #[rstest]
    #[case::overlapping_order(order(150, 160), ImportStatus::Duplicate)]
    #[case::disjoint_order(order(250, 300), ImportStatus::Accepted)]
    fn test_label_order_overlap(#[case] body: String, #[case] expected: ImportStatus) {
        let (importer, _, _) = importer();
        importer.import_payload(
            "ACME",
            ArtifactKind::LabelOrders,
            "o1.hlz",
            &payload(ORDER_HEADER, &[order(100, 200)]),
        );

        let report = importer.import_payload(
            "ACME",
            ArtifactKind::LabelOrders,
            "o2.hlz",
            &payload(ORDER_HEADER, &[body]),
        );

        assert_eq!(status(&report), expected);
    }

    #[test]
    fn test_truncated_persists_nothing() {
        let (importer, records, dedup) = importer();
        let mut bytes = payload(BAG_HEADER, &[bag("L1")]);
        bytes.extend_from_slice(b"\nC1 L2 20240105083000");

        let report = importer.import_payload("ACME", ArtifactKind::Bags, "bags.hlz", &bytes);

        assert_eq!(status(&report), ImportStatus::Failed);
        assert!(records.is_empty());
        assert!(dedup.is_empty());
    }

    #[test]
    fn test_mapping_errors_reject_whole_file() {
        let (importer, records, _) = importer();
        let bytes = payload(
            BAG_HEADER,
            &[bag("L1"), "C1 L2 notadate 12 300".to_string()],
        );

        let report = importer.import_payload("ACME", ArtifactKind::Bags, "bags.hlz", &bytes);

        assert_eq!(status(&report), ImportStatus::Rejected);
        assert!(records.is_empty());
    }

    #[rstest]
    #[case::header_only(BAG_HEADER.as_bytes().to_vec(), ImportStatus::Rejected)]
    #[case::no_header(b"000001 HLZ".to_vec(), ImportStatus::Failed)]
    #[case::empty(Vec::new(), ImportStatus::Failed)]
    fn test_degenerate_files(#[case] bytes: Vec<u8>, #[case] expected: ImportStatus) {
        let (importer, _, _) = importer();
        let report = importer.import_payload("ACME", ArtifactKind::Bags, "bags.hlz", &bytes);
        assert_eq!(status(&report), expected);
    }

    #[test]
    fn test_kind_without_decoder_is_rejected() {
        let (importer, _, _) = importer();
        let bytes = payload(BAG_HEADER, &[bag("L1")]);

        let report = importer.import_payload("ACME", ArtifactKind::Articles, "a.hlz", &bytes);

        assert_eq!(status(&report), ImportStatus::Rejected);
        assert!(report.outcome().unwrap().messages()[0]
            .message
            .contains("Unsupported version"));
    }

    #[test]
    fn test_retry_policy_has_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
        assert_eq!(RetryPolicy::once().attempts, 1);
    }

    #[rstest]
    #[case(ImportStatus::Accepted, Stage::Accepted)]
    #[case(ImportStatus::Duplicate, Stage::AlreadyExists)]
    #[case(ImportStatus::Failed, Stage::Failed)]
    fn test_target_stage(#[case] status: ImportStatus, #[case] stage: Stage) {
        assert_eq!(target_stage(&ImportOutcome::new(status, Vec::new())), stage);
    }

    #[test]
    fn test_record_store_failure_releases_claims() {
        let dedup = Arc::new(InMemoryDedupStore::new());
        let importer =
            Importer::new(&Config::default(), Arc::new(OfflineRecordStore), dedup.clone());
        let bytes = payload(BAG_HEADER, &[bag("L1"), bag("L2")]);

        let report = importer.import_payload("ACME", ArtifactKind::Bags, "bags.hlz", &bytes);

        assert_eq!(status(&report), ImportStatus::Failed);
        assert_eq!(report.persisted(), 0);
        assert!(report.outcome().unwrap().messages()[0]
            .message
            .contains("database offline"));
        assert!(dedup.is_empty());
    }

    #[test]
    fn test_dedup_store_failure_persists_nothing() {
        let records = Arc::new(InMemoryRecordStore::new());
        let importer =
            Importer::new(&Config::default(), records.clone(), Arc::new(OfflineDedupStore));
        let bytes = payload(BAG_HEADER, &[bag("L1")]);

        let report = importer.import_payload("ACME", ArtifactKind::Bags, "bags.hlz", &bytes);

        assert_eq!(status(&report), ImportStatus::Failed);
        assert!(records.is_empty());
    }

    #[test]
    fn test_concurrent_overlapping_orders_accept_one() {
        let (importer, records, dedup) = importer();
        let importer = Arc::new(importer);

        let statuses: Vec<ImportStatus> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8u64)
                .map(|i| {
                    let importer = Arc::clone(&importer);
                    scope.spawn(move || {
                        let bytes = payload(ORDER_HEADER, &[order(100 + i, 200 + i)]);
                        let name = format!("o{}.hlz", i);
                        status(&importer.import_payload(
                            "ACME",
                            ArtifactKind::LabelOrders,
                            &name,
                            &bytes,
                        ))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let accepted = statuses.iter().filter(|s| **s == ImportStatus::Accepted).count();
        let duplicate = statuses.iter().filter(|s| **s == ImportStatus::Duplicate).count();
        assert_eq!((accepted, duplicate), (1, 7));
        assert_eq!(records.count(ArtifactKind::LabelOrders), 1);
        assert_eq!(dedup.len(), 1);
    }
}

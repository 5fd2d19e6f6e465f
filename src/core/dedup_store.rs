//! Thread-safe in-memory dedup index
//!
//! This module provides `InMemoryDedupStore`, a [`DedupStore`] backed by
//! `DashMap`. Natural keys are stored by key; label ranges are grouped by
//! customer so an overlap query only scans that customer's ranges.
//!
//! # Thread Safety
//!
//! Lookups never block each other. Every write that checks before it records
//! (`try_claim`, `release`, `record_latest`) runs under one store-wide mutex,
//! so two workers cannot both pass the check for the same key or range.

use crate::core::traits::DedupStore;
use crate::types::{DedupClaim, DedupEntry, ImportError, LabelRange, NaturalKey};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct RecordedRange {
    range: LabelRange,
    recorded_at: DateTime<Utc>,
}

/// In-memory dedup index shared between workers
#[derive(Debug, Default)]
pub struct InMemoryDedupStore {
    /// Latest natural keys with the time they were recorded
    keys: DashMap<NaturalKey, DateTime<Utc>>,
    /// Label ranges by customer number
    ranges: DashMap<String, Vec<RecordedRange>>,
    writes: Mutex<()>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `entries`, as read back from a saved index
    pub fn from_entries(entries: impl IntoIterator<Item = DedupEntry>) -> Self {
        let store = Self::default();
        for entry in entries {
            store.insert(entry);
        }
        store
    }

    /// Every recorded key and range
    pub fn entries(&self) -> Vec<DedupEntry> {
        let mut entries: Vec<DedupEntry> = self
            .keys
            .iter()
            .map(|e| DedupEntry::Key {
                key: e.key().clone(),
                recorded_at: *e.value(),
            })
            .collect();
        for customer in self.ranges.iter() {
            entries.extend(customer.value().iter().map(|r| DedupEntry::Range {
                range: r.range.clone(),
                recorded_at: r.recorded_at,
            }));
        }
        entries
    }

    /// Number of recorded keys and ranges
    pub fn len(&self) -> usize {
        self.keys.len() + self.ranges.iter().map(|e| e.value().len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn serialize_writes(&self) -> Result<MutexGuard<'_, ()>, ImportError> {
        self.writes
            .lock()
            .map_err(|_| ImportError::persistence("dedup index lock poisoned"))
    }

    fn insert(&self, entry: DedupEntry) {
        match entry {
            DedupEntry::Key { key, recorded_at } => {
                self.keys.insert(key, recorded_at);
            }
            DedupEntry::Range { range, recorded_at } => {
                let mut ranges = self.ranges.entry(range.customer.clone()).or_default();
                match ranges
                    .iter_mut()
                    .find(|r| r.range.first == range.first && r.range.last == range.last)
                {
                    Some(existing) => {
                        existing.range = range;
                        existing.recorded_at = recorded_at;
                    }
                    None => ranges.push(RecordedRange { range, recorded_at }),
                }
            }
        }
    }

    fn overlaps_open_range(
        &self,
        customer: &str,
        owner: Option<&str>,
        start: u64,
        end: u64,
    ) -> bool {
        self.ranges
            .get(customer)
            .map(|entry| {
                entry.value().iter().any(|r| {
                    !r.range.exhausted
                        && r.range.matches_owner(owner)
                        && r.range.overlaps(start, end)
                })
            })
            .unwrap_or(false)
    }

    fn collides(&self, claim: &DedupClaim) -> bool {
        match claim {
            DedupClaim::Key(key) => self.keys.contains_key(key),
            DedupClaim::Range(range) => self.overlaps_open_range(
                &range.customer,
                range.owner.as_deref(),
                range.first,
                range.last,
            ),
        }
    }
}

impl DedupStore for InMemoryDedupStore {
    fn exists_by_natural_key(&self, key: &NaturalKey) -> Result<bool, ImportError> {
        Ok(self.keys.contains_key(key))
    }

    fn exists_by_range_overlap(
        &self,
        customer: &str,
        owner: Option<&str>,
        start: u64,
        end: u64,
    ) -> Result<bool, ImportError> {
        Ok(self.overlaps_open_range(customer, owner, start, end))
    }

    fn record_latest(&self, entry: DedupEntry) -> Result<(), ImportError> {
        let _writes = self.serialize_writes()?;
        self.insert(entry);
        Ok(())
    }

    fn try_claim(
        &self,
        claims: &[DedupClaim],
        recorded_at: DateTime<Utc>,
    ) -> Result<Vec<usize>, ImportError> {
        let _writes = self.serialize_writes()?;

        let collisions: Vec<usize> = claims
            .iter()
            .enumerate()
            .filter(|(_, claim)| self.collides(claim))
            .map(|(index, _)| index)
            .collect();
        if collisions.is_empty() {
            for claim in claims {
                self.insert(claim.entry(recorded_at));
            }
        }
        Ok(collisions)
    }

    fn release(
        &self,
        claims: &[DedupClaim],
        recorded_at: DateTime<Utc>,
    ) -> Result<(), ImportError> {
        let _writes = self.serialize_writes()?;

        for claim in claims {
            match claim {
                DedupClaim::Key(key) => {
                    self.keys.remove_if(key, |_, at| *at == recorded_at);
                }
                DedupClaim::Range(range) => {
                    if let Some(mut entry) = self.ranges.get_mut(&range.customer) {
                        entry.value_mut().retain(|r| {
                            !(r.range.first == range.first
                                && r.range.last == range.last
                                && r.recorded_at == recorded_at)
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn mark_exhausted(&self, customer: &str, first_label: u64) -> Result<bool, ImportError> {
        Ok(self
            .ranges
            .get_mut(customer)
            .and_then(|mut entry| {
                entry
                    .value_mut()
                    .iter_mut()
                    .find(|r| r.range.first == first_label)
                    .map(|r| r.range.exhausted = true)
            })
            .is_some())
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, ImportError> {
        let mut purged = 0;
        self.keys.retain(|_, recorded_at| {
            let keep = *recorded_at >= cutoff;
            if !keep {
                purged += 1;
            }
            keep
        });

        for mut entry in self.ranges.iter_mut() {
            entry.value_mut().retain(|r| {
                let keep = r.recorded_at >= cutoff;
                if !keep {
                    purged += 1;
                }
                keep
            });
        }
        self.ranges.retain(|_, ranges| !ranges.is_empty());

        Ok(purged)
    }
}

//! Thread-safe in-memory record store
//!
//! `InMemoryRecordStore` stands in for the external persistence of settled
//! records. Records are keyed by artifact kind and their store key.

use crate::core::traits::RecordStore;
use crate::types::{ArtifactKind, ImportError, SettledRecord};
use chrono::NaiveDateTime;
use dashmap::DashMap;

/// In-memory store of settled records
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: DashMap<(ArtifactKind, String), SettledRecord>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records of one kind
    pub fn count(&self, kind: ArtifactKind) -> usize {
        self.records.iter().filter(|e| e.key().0 == kind).count()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn exists(&self, kind: ArtifactKind, key: &str) -> Result<bool, ImportError> {
        Ok(self.records.contains_key(&(kind, key.to_string())))
    }

    fn find_by_key(
        &self,
        kind: ArtifactKind,
        key: &str,
    ) -> Result<Option<SettledRecord>, ImportError> {
        Ok(self
            .records
            .get(&(kind, key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    fn save(&self, record: SettledRecord) -> Result<(), ImportError> {
        self.records
            .insert((record.kind(), record.record_key()), record);
        Ok(())
    }

    fn save_all(&self, records: Vec<SettledRecord>) -> Result<usize, ImportError> {
        let count = records.len();
        for record in records {
            self.records
                .insert((record.kind(), record.record_key()), record);
        }
        Ok(count)
    }

    fn delete_by_period(
        &self,
        kind: ArtifactKind,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<usize, ImportError> {
        let mut deleted = 0;
        self.records.retain(|(k, _), record| {
            let in_period = *k == kind && record.timestamp() >= from && record.timestamp() < to;
            if in_period {
                deleted += 1;
            }
            !in_period
        });
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SettledBag;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn bag(label: &str, day: u32) -> SettledRecord {
        SettledRecord::Bag(SettledBag {
            company: "ACME".into(),
            customer_number: "C1".into(),
            label_number: label.into(),
            registered_at: NaiveDate::from_ymd_opt(2024, 1, day)
                .and_then(|d| d.and_hms_opt(8, 0, 0))
                .unwrap(),
            number_of_containers: 10,
            deposit_amount: Decimal::new(250, 2),
        })
    }

    #[test]
    fn test_save_and_find() {
        let store = InMemoryRecordStore::new();
        store.save(bag("L1", 1)).unwrap();

        assert!(store.exists(ArtifactKind::Bags, "C1/L1").unwrap());
        assert!(!store.exists(ArtifactKind::Transactions, "C1/L1").unwrap());
        assert_eq!(
            store.find_by_key(ArtifactKind::Bags, "C1/L1").unwrap(),
            Some(bag("L1", 1))
        );
    }

    #[test]
    fn test_save_all_counts_records() {
        let store = InMemoryRecordStore::new();
        let saved = store
            .save_all(vec![bag("L1", 1), bag("L2", 2), bag("L3", 3)])
            .unwrap();

        assert_eq!(saved, 3);
        assert_eq!(store.count(ArtifactKind::Bags), 3);
    }

    #[test]
    fn test_delete_by_period_is_half_open() {
        let store = InMemoryRecordStore::new();
        store
            .save_all(vec![bag("L1", 1), bag("L2", 2), bag("L3", 3)])
            .unwrap();

        let from = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 3)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap();

        assert_eq!(store.delete_by_period(ArtifactKind::Bags, from, to).unwrap(), 1);
        assert!(store.exists(ArtifactKind::Bags, "C1/L3").unwrap());
        assert!(!store.exists(ArtifactKind::Bags, "C1/L2").unwrap());
    }

    #[test]
    fn test_delete_while_saving_counts_only_deleted() {
        let store = Arc::new(InMemoryRecordStore::new());
        store
            .save_all((0..50).map(|i| bag(&format!("OLD{}", i), 1)).collect())
            .unwrap();

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..200 {
                    store.save(bag(&format!("NEW{}", i), 5)).unwrap();
                }
            })
        };
        let from = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let deleted = store.delete_by_period(ArtifactKind::Bags, from, to).unwrap();
        writer.join().unwrap();

        assert_eq!(deleted, 50);
        assert_eq!(store.len(), 200);
    }
}

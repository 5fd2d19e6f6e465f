//! Settled domain records
//!
//! Typed values produced from decoded bodies by the mapping step. These are
//! what the external record store persists.

use crate::types::{ArtifactKind, DedupEntry, LabelRange, NaturalKey};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;

/// A batch summary with coerced counts, times and amounts
#[derive(Debug, Clone, PartialEq)]
pub struct SettledBatch {
    /// GLN of the service provider that owns the batch
    pub owner: String,
    pub company: String,
    pub batch_id: String,
    pub reference_number: String,
    pub user: String,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub refundable: u32,
    pub non_refundable: u32,
    pub ean_not_readable: u32,
    /// Port-zero count (v016) or metal counter (v017)
    pub counter: u32,
    pub number_in_batch: u32,
    pub number_in_shift: u32,
    pub key_id: String,
    pub pricat_version: String,
    pub total_deposit_amount: Decimal,
    /// Date of the file header, used for period deletes
    pub file_created_at: NaiveDateTime,
}

/// A registered deposit bag
#[derive(Debug, Clone, PartialEq)]
pub struct SettledBag {
    pub company: String,
    pub customer_number: String,
    pub label_number: String,
    pub registered_at: NaiveDateTime,
    pub number_of_containers: u32,
    pub deposit_amount: Decimal,
}

/// A deposit-label order
#[derive(Debug, Clone, PartialEq)]
pub struct SettledLabelOrder {
    pub company: String,
    pub customer_number: String,
    pub owner_number: Option<String>,
    pub first_label: u64,
    pub last_label: u64,
    pub ordered_at: NaiveDateTime,
}

/// Any record the store can persist
#[derive(Debug, Clone, PartialEq)]
pub enum SettledRecord {
    Batch(SettledBatch),
    Bag(SettledBag),
    LabelOrder(SettledLabelOrder),
}

/// What a settled record asserts for duplicate detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupClaim {
    Key(NaturalKey),
    Range(LabelRange),
}

impl DedupClaim {
    /// Index entry recording this claim at `recorded_at`
    pub fn entry(&self, recorded_at: DateTime<Utc>) -> DedupEntry {
        match self {
            DedupClaim::Key(key) => DedupEntry::Key {
                key: key.clone(),
                recorded_at,
            },
            DedupClaim::Range(range) => DedupEntry::Range {
                range: range.clone(),
                recorded_at,
            },
        }
    }
}

impl SettledRecord {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            SettledRecord::Batch(_) => ArtifactKind::Transactions,
            SettledRecord::Bag(_) => ArtifactKind::Bags,
            SettledRecord::LabelOrder(_) => ArtifactKind::LabelOrders,
        }
    }

    /// Store-facing identifier, unique per kind
    pub fn record_key(&self) -> String {
        match self {
            SettledRecord::Batch(b) => format!("{}/{}", b.owner, b.batch_id),
            SettledRecord::Bag(b) => format!("{}/{}", b.customer_number, b.label_number),
            SettledRecord::LabelOrder(o) => {
                format!("{}/{}-{}", o.customer_number, o.first_label, o.last_label)
            }
        }
    }

    /// Time the record is attributed to, for period deletes
    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            SettledRecord::Batch(b) => b.ended_at,
            SettledRecord::Bag(b) => b.registered_at,
            SettledRecord::LabelOrder(o) => o.ordered_at,
        }
    }

    /// The key or range this record claims
    pub fn dedup_claim(&self) -> DedupClaim {
        match self {
            SettledRecord::Batch(b) => DedupClaim::Key(NaturalKey::Transaction {
                owner: b.owner.clone(),
                number: b.batch_id.clone(),
            }),
            SettledRecord::Bag(b) => DedupClaim::Key(NaturalKey::Bag {
                customer: b.customer_number.clone(),
                label: b.label_number.clone(),
            }),
            SettledRecord::LabelOrder(o) => DedupClaim::Range(LabelRange {
                customer: o.customer_number.clone(),
                owner: o.owner_number.clone(),
                first: o.first_label,
                last: o.last_label,
                exhausted: false,
            }),
        }
    }
}

//! Dedup key records
//!
//! Lightweight entries kept independently of the settled records. They block
//! re-acceptance of a file asserting the same key until the retention purge
//! removes them.

use chrono::{DateTime, Utc};
use std::fmt;

/// Business identifier used for duplicate detection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    /// A deposit bag, identified by its label within a customer
    Bag { customer: String, label: String },
    /// A batch transaction, identified by its number within an owner
    Transaction { owner: String, number: String },
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::Bag { customer, label } => {
                write!(f, "bag {} of customer {}", label, customer)
            }
            NaturalKey::Transaction { owner, number } => {
                write!(f, "transaction {} of owner {}", number, owner)
            }
        }
    }
}

/// A label range allocated to a customer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRange {
    pub customer: String,
    pub owner: Option<String>,
    pub first: u64,
    pub last: u64,
    /// Every label of the range has been consumed
    pub exhausted: bool,
}

impl LabelRange {
    /// Inclusive overlap on both bounds
    pub fn overlaps(&self, first: u64, last: u64) -> bool {
        self.first <= last && first <= self.last
    }

    /// Whether `owner` scopes this range; `None` matches every owner
    pub fn matches_owner(&self, owner: Option<&str>) -> bool {
        match owner {
            None => true,
            Some(owner) => self.owner.as_deref() == Some(owner),
        }
    }
}

/// An entry handed to [`DedupStore::record_latest`](crate::core::traits::DedupStore::record_latest)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupEntry {
    Key {
        key: NaturalKey,
        recorded_at: DateTime<Utc>,
    },
    Range {
        range: LabelRange,
        recorded_at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn range(first: u64, last: u64) -> LabelRange {
        LabelRange {
            customer: "C".into(),
            owner: None,
            first,
            last,
            exhausted: false,
        }
    }

    #[rstest]
    #[case::inside(150, 150, true)]
    #[case::lower_bound(50, 100, true)]
    #[case::upper_bound(200, 300, true)]
    #[case::enclosing(50, 250, true)]
    #[case::below(10, 99, false)]
    #[case::above(201, 260, false)]
    fn test_overlap_is_inclusive(#[case] first: u64, #[case] last: u64, #[case] expected: bool) {
        assert_eq!(range(100, 200).overlaps(first, last), expected);
    }

    #[test]
    fn test_owner_scope() {
        let mut scoped = range(1, 2);
        scoped.owner = Some("O1".into());

        assert!(scoped.matches_owner(None));
        assert!(scoped.matches_owner(Some("O1")));
        assert!(!scoped.matches_owner(Some("O2")));
        assert!(!range(1, 2).matches_owner(Some("O1")));
    }
}

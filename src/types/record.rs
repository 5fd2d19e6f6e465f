//! Decoded record types for HLZ files
//!
//! Header and body records hold the raw tokens of a file, mapped by position
//! onto named fields. Every field stays a `String` at this stage; coercion into
//! numbers and dates happens later in [`crate::io::mapping`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of artifact a file carries
///
/// The kind is supplied by the caller (it is not a token of the file) and
/// selects both the directory layout and the body decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Batch summaries of RVM transactions
    Transactions,
    /// Deposit bags identified by label number
    Bags,
    /// Refund-article catalogs
    Articles,
    /// Deposit-label orders (numeric label ranges)
    LabelOrders,
    /// Transactions sent back by a downstream consumer
    RejectedTransactions,
}

impl ArtifactKind {
    /// All kinds, in directory-layout order
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Transactions,
        ArtifactKind::Bags,
        ArtifactKind::Articles,
        ArtifactKind::LabelOrders,
        ArtifactKind::RejectedTransactions,
    ];

    /// Directory name used under the configured root
    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Transactions => "transactions",
            ArtifactKind::Bags => "bags",
            ArtifactKind::Articles => "articles",
            ArtifactKind::LabelOrders => "label-orders",
            ArtifactKind::RejectedTransactions => "rejected-transactions",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .into_iter()
            .find(|kind| kind.dir_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown artifact kind: '{}'", s))
    }
}

/// Position of a token inside a file
///
/// `line` is 1-based; `offset` is the 0-based index of the token in the whole
/// token stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenPosition {
    pub line: usize,
    pub offset: usize,
}

impl fmt::Display for TokenPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, token {}", self.line, self.offset)
    }
}

/// File header, present once at the start of every HLZ file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub fort_running_number: String,
    pub identifier_of_message_type: String,
    pub message_version_number: String,
    pub date_of_creation: String,
    pub gln_first_distributor: String,
    pub gln_service_provider: String,
    pub constant: String,
    /// Declared by the caller, carried through to every body
    pub kind: ArtifactKind,
    /// Line the header started on
    pub line: usize,
}

/// Field eleven of a batch body changed meaning between versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchCounter {
    /// Version 016: count of items on port zero
    PortZero(String),
    /// Version 017: metal counter
    MetalCounter(String),
}

impl BatchCounter {
    pub fn value(&self) -> &str {
        match self {
            BatchCounter::PortZero(v) | BatchCounter::MetalCounter(v) => v,
        }
    }
}

/// Batch summary body (25 tokens)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchBody {
    pub batch_id: String,
    pub reference_number: String,
    pub user: String,
    pub batch_time_start: String,
    pub number_of_refundable: String,
    pub number_of_refundable_from_no_read_table: String,
    pub number_of_non_refundable: String,
    pub number_of_non_refundable_from_no_read_table: String,
    pub ean_not_readable: String,
    pub unknown: String,
    pub counter: BatchCounter,
    pub number_in_batch: String,
    pub number_in_shift: String,
    pub batch_time_end: String,
    pub first_blank_reserved_field: String,
    pub batch_time: String,
    pub key_id: String,
    pub anker_andersen_iln_number: String,
    pub pricat_version: String,
    pub trash_codes: String,
    pub second_blank_reserved_field: String,
    pub third_blank_reserved_field: String,
    pub fourth_blank_reserved_field: String,
    pub total_deposit_amount: String,
    pub reserved: String,
}

/// Deposit bag body (5 tokens)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagBody {
    pub customer_number: String,
    pub label_number: String,
    pub registered_at: String,
    pub number_of_containers: String,
    pub deposit_amount: String,
}

/// Label order body (5 tokens)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelOrderBody {
    pub customer_number: String,
    /// `0` means the order is not scoped to an owner
    pub owner_number: String,
    pub first_label: String,
    pub last_label: String,
    pub ordered_at: String,
}

/// One decoded body, tagged by the layout that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyRecord {
    Batch(BatchBody),
    Bag(BagBody),
    LabelOrder(LabelOrderBody),
}

/// A body together with the context it was decoded in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBody {
    pub kind: ArtifactKind,
    /// Line the body's first token was on
    pub line: usize,
    pub record: BodyRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("transactions", ArtifactKind::Transactions)]
    #[case("Label-Orders", ArtifactKind::LabelOrders)]
    #[case(" bags ", ArtifactKind::Bags)]
    #[case("rejected-transactions", ArtifactKind::RejectedTransactions)]
    fn test_kind_from_str(#[case] input: &str, #[case] expected: ArtifactKind) {
        assert_eq!(input.parse::<ArtifactKind>().unwrap(), expected);
    }

    #[test]
    fn test_kind_from_str_rejects_unknown() {
        assert!("pallets".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn test_counter_value_ignores_variant() {
        assert_eq!(BatchCounter::PortZero("4".into()).value(), "4");
        assert_eq!(BatchCounter::MetalCounter("9".into()).value(), "9");
    }
}

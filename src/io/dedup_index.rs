//! Dedup index saved between runs
//!
//! The CLI keeps its dedup index in `<root>/dedup-index.csv`, one row per
//! natural key or label range:
//!
//! ```text
//! entry,scope,id,owner,first,last,exhausted,recorded_at
//! bag,C100,L0001,,,,false,2024-01-05T08:30:00Z
//! transaction,4012345000009,B100,,,,false,2024-01-05T08:30:00Z
//! range,C100,,,100,200,false,2024-01-05T08:30:00Z
//! ```
//!
//! `scope` is the customer (bags, ranges) or the owner (transactions).

use crate::types::{DedupEntry, ImportError, LabelRange, NaturalKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// File name of the index under the directory root
pub const INDEX_FILE: &str = "dedup-index.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum EntryKind {
    Bag,
    Transaction,
    Range,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexRow {
    entry: EntryKind,
    scope: String,
    id: String,
    owner: Option<String>,
    first: Option<u64>,
    last: Option<u64>,
    exhausted: bool,
    recorded_at: DateTime<Utc>,
}

impl From<&DedupEntry> for IndexRow {
    fn from(entry: &DedupEntry) -> Self {
        match entry {
            DedupEntry::Key { key, recorded_at } => {
                let (entry, scope, id) = match key {
                    NaturalKey::Bag { customer, label } => (EntryKind::Bag, customer, label),
                    NaturalKey::Transaction { owner, number } => {
                        (EntryKind::Transaction, owner, number)
                    }
                };
                IndexRow {
                    entry,
                    scope: scope.clone(),
                    id: id.clone(),
                    owner: None,
                    first: None,
                    last: None,
                    exhausted: false,
                    recorded_at: *recorded_at,
                }
            }
            DedupEntry::Range { range, recorded_at } => IndexRow {
                entry: EntryKind::Range,
                scope: range.customer.clone(),
                id: String::new(),
                owner: range.owner.clone(),
                first: Some(range.first),
                last: Some(range.last),
                exhausted: range.exhausted,
                recorded_at: *recorded_at,
            },
        }
    }
}

impl TryFrom<IndexRow> for DedupEntry {
    type Error = ImportError;

    fn try_from(row: IndexRow) -> Result<Self, Self::Error> {
        let recorded_at = row.recorded_at;
        match row.entry {
            EntryKind::Bag => Ok(DedupEntry::Key {
                key: NaturalKey::Bag {
                    customer: row.scope,
                    label: row.id,
                },
                recorded_at,
            }),
            EntryKind::Transaction => Ok(DedupEntry::Key {
                key: NaturalKey::Transaction {
                    owner: row.scope,
                    number: row.id,
                },
                recorded_at,
            }),
            EntryKind::Range => match (row.first, row.last) {
                (Some(first), Some(last)) => Ok(DedupEntry::Range {
                    range: LabelRange {
                        customer: row.scope,
                        owner: row.owner,
                        first,
                        last,
                        exhausted: row.exhausted,
                    },
                    recorded_at,
                }),
                _ => Err(ImportError::persistence(format!(
                    "range of customer {} has no bounds",
                    row.scope
                ))),
            },
        }
    }
}

/// Serialize index entries as CSV
pub fn write_index(entries: &[DedupEntry], output: &mut dyn Write) -> Result<(), ImportError> {
    let mut writer = csv::Writer::from_writer(output);
    for entry in entries {
        writer.serialize(IndexRow::from(entry))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read index entries back from CSV
pub fn read_index(input: impl Read) -> Result<Vec<DedupEntry>, ImportError> {
    let mut reader = csv::Reader::from_reader(input);
    reader
        .deserialize::<IndexRow>()
        .map(|row| DedupEntry::try_from(row?))
        .collect()
}

/// Load the index at `path`, empty when the file does not exist yet
pub fn load(path: &Path) -> Result<Vec<DedupEntry>, ImportError> {
    match fs::File::open(path) {
        Ok(file) => read_index(file),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Replace the index at `path` with `entries`
///
/// The entries go to a temporary file first, which is then renamed over the
/// previous index.
pub fn save(path: &Path, entries: &[DedupEntry]) -> Result<(), ImportError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut staged = path.as_os_str().to_os_string();
    staged.push(".tmp");

    let mut file = fs::File::create(&staged)?;
    write_index(entries, &mut file)?;
    file.sync_all()?;
    fs::rename(&staged, path)?;

    log::debug!("Saved {} dedup entries to {}", entries.len(), path.display());
    Ok(())
}

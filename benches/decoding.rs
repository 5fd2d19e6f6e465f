//! Benchmark suite for decoding and importing HLZ files
//!
//! Uses the divan benchmarking framework. Inputs are generated in memory so
//! the benchmarks need no fixture files.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```

use hlz_importer::config::Config;
use hlz_importer::core::{Importer, InMemoryDedupStore, InMemoryRecordStore};
use hlz_importer::io::{decode_bodies, decode_header, BodyLayout, TokenCursor};
use hlz_importer::types::ArtifactKind;
use std::sync::Arc;

fn main() {
    divan::main();
}

const HEADER: &str = "000123 HLZ 017 20240105 4012345000009 4098765000003 X";

/// A v017 transactions file with `bodies` batches
fn transactions_file(bodies: usize) -> Vec<u8> {
    let mut text = String::from(HEADER);
    for i in 0..bodies {
        text.push_str(&format!(
            "\nB{} R1 U1 20240105080000 120 3 10 1 2 0 5 1 7 20240105081500 0 900 K1 4000000000000 3 0 0 0 0 3075 0",
            i
        ));
    }
    text.into_bytes()
}

/// Tokenize and decode header and bodies
#[divan::bench(args = [100, 1_000, 10_000])]
fn decode(bencher: divan::Bencher, bodies: usize) {
    let bytes = transactions_file(bodies);
    bencher.bench(|| {
        let mut cursor = TokenCursor::new(divan::black_box(&bytes));
        let header = decode_header(&mut cursor, ArtifactKind::Transactions).unwrap();
        let layout =
            BodyLayout::lookup(ArtifactKind::Transactions, &header.message_version_number).unwrap();
        decode_bodies(&mut cursor, layout).unwrap()
    });
}

/// Full payload import into fresh in-memory stores
#[divan::bench(args = [100, 1_000])]
fn import_payload(bencher: divan::Bencher, bodies: usize) {
    let bytes = transactions_file(bodies);
    let config = Config::default();
    bencher.bench(|| {
        let importer = Importer::new(
            &config,
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryDedupStore::new()),
        );
        importer.import_payload("ACME", ArtifactKind::Transactions, "bench.hlz", &bytes)
    });
}

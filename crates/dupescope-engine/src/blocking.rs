//! Candidate pair generation.
//!
//! Without blocking every record shares one block. With
//! [`Blocking::FieldPrefix`] records are bucketed by a cheap key and only
//! pairs inside a bucket are compared, trading recall for speed.

use std::collections::BTreeMap;

use dupescope_core::{Blocking, MatchConfig, Record, normalize_opt};

/// Records split into blocks of indices into the candidate slice.
#[derive(Debug, Clone)]
pub struct Blocks {
    blocks: Vec<Vec<usize>>,
    block_of: Vec<usize>,
}

impl Blocks {
    pub fn build(records: &[&Record], cfg: &MatchConfig) -> Self {
        let blocks: Vec<Vec<usize>> = match &cfg.blocking {
            Blocking::None => vec![(0..records.len()).collect()],
            Blocking::FieldPrefix { field, prefix_len } => {
                let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
                for (idx, record) in records.iter().enumerate() {
                    let key = blocking_key(record, field, *prefix_len, cfg.case_sensitive);
                    buckets.entry(key).or_default().push(idx);
                }
                buckets.into_values().collect()
            }
        };

        let mut block_of = vec![0; records.len()];
        for (block_idx, members) in blocks.iter().enumerate() {
            for idx in members {
                block_of[*idx] = block_idx;
            }
        }

        Self { blocks, block_of }
    }

    pub fn blocks(&self) -> &[Vec<usize>] {
        &self.blocks
    }

    /// Whether the pair `(a, b)` is compared at all.
    pub fn is_measured(&self, a: usize, b: usize) -> bool {
        self.block_of[a] == self.block_of[b]
    }

    /// Total number of pairs that will be scored.
    pub fn pair_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.len() * b.len().saturating_sub(1) / 2)
            .sum()
    }
}

/// First `prefix_len` characters of the normalized field value; records
/// lacking the field share the empty key.
fn blocking_key(record: &Record, field: &str, prefix_len: usize, case_sensitive: bool) -> String {
    normalize_opt(record.field(field), case_sensitive)
        .chars()
        .take(prefix_len)
        .collect()
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::RecordId;

/// Similarity between two records within one detection pass.
///
/// `a` is always the lower of the two ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub a: RecordId,
    pub b: RecordId,
    pub score: f64,
    /// Score of every field that was actually compared.
    #[serde(default)]
    pub per_field: BTreeMap<String, f64>,
}

impl PairScore {
    pub fn new(a: RecordId, b: RecordId, score: f64, per_field: BTreeMap<String, f64>) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            a,
            b,
            score,
            per_field,
        }
    }

    /// False when no field could be compared on both sides.
    pub fn has_evidence(&self) -> bool {
        !self.per_field.is_empty()
    }

    pub fn involves(&self, id: &RecordId) -> bool {
        &self.a == id || &self.b == id
    }
}

use std::collections::BTreeMap;

use dupescope_core::{MatchConfig, PairScore, Record, RecordId, normalize_opt};

use crate::similarity::{Scorer, scorer_for};

/// A record with every configured field already normalized.
///
/// Empty strings stand for absent values.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub id: RecordId,
    values: Vec<String>,
}

impl NormalizedRecord {
    /// Normalized value of the `idx`-th configured field.
    pub fn value(&self, idx: usize) -> &str {
        &self.values[idx]
    }
}

/// Aggregates per-field similarity into a record-level score.
pub struct RecordMatcher {
    fields: Vec<(String, f64)>,
    case_sensitive: bool,
    scorer: Box<dyn Scorer>,
}

impl RecordMatcher {
    /// The config is expected to be validated already.
    pub fn new(cfg: &MatchConfig) -> Self {
        Self {
            fields: cfg
                .fields
                .iter()
                .map(|(name, weight)| (name.clone(), *weight))
                .collect(),
            case_sensitive: cfg.case_sensitive,
            scorer: scorer_for(cfg),
        }
    }

    pub fn normalize(&self, record: &Record) -> NormalizedRecord {
        NormalizedRecord {
            id: record.id.clone(),
            values: self
                .fields
                .iter()
                .map(|(name, _)| normalize_opt(record.field(name), self.case_sensitive))
                .collect(),
        }
    }

    /// Score two raw records.
    pub fn match_records(&self, a: &Record, b: &Record) -> PairScore {
        self.match_normalized(&self.normalize(a), &self.normalize(b))
    }

    /// Score two pre-normalized records.
    ///
    /// Fields empty on either side are left out of both the weighted sum and
    /// the weight total. With nothing comparable the score is 0.0.
    pub fn match_normalized(&self, a: &NormalizedRecord, b: &NormalizedRecord) -> PairScore {
        let mut weighted = 0.0;
        let mut used_weight = 0.0;
        let mut per_field = BTreeMap::new();

        for (idx, (name, weight)) in self.fields.iter().enumerate() {
            let left = a.value(idx);
            let right = b.value(idx);
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let score = self.scorer.score(left, right);
            weighted += weight * score;
            used_weight += weight;
            per_field.insert(name.clone(), score);
        }

        let score = if used_weight > 0.0 {
            (weighted / used_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        PairScore::new(a.id.clone(), b.id.clone(), score, per_field)
    }
}

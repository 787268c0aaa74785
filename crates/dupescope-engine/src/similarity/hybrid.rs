use dupescope_core::HybridWeights;

use super::{FuzzyScorer, PhoneticScorer, Scorer};

/// Weighted average of fuzzy and phonetic similarity.
#[derive(Debug, Clone, Copy)]
pub struct HybridScorer {
    fuzzy_weight: f64,
    phonetic_weight: f64,
}

impl Default for HybridScorer {
    fn default() -> Self {
        Self::new(HybridWeights::default())
    }
}

impl HybridScorer {
    /// Weights are normalized by their sum; a zero sum falls back to fuzzy only.
    pub fn new(weights: HybridWeights) -> Self {
        let total = weights.fuzzy + weights.phonetic;
        if total > 0.0 {
            Self {
                fuzzy_weight: weights.fuzzy / total,
                phonetic_weight: weights.phonetic / total,
            }
        } else {
            Self {
                fuzzy_weight: 1.0,
                phonetic_weight: 0.0,
            }
        }
    }
}

impl Scorer for HybridScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let fuzzy = FuzzyScorer.score(a, b);
        let phonetic = PhoneticScorer.score(a, b);
        (self.fuzzy_weight * fuzzy + self.phonetic_weight * phonetic).clamp(0.0, 1.0)
    }
}

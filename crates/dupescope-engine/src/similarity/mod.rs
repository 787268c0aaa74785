//! Field-level similarity scorers.
//!
//! Every scorer is symmetric, returns 1.0 for identical non-empty input and
//! stays within [0, 1].

mod exact;
mod fuzzy;
mod hybrid;
mod phonetic;

pub use exact::ExactScorer;
pub use fuzzy::FuzzyScorer;
pub use hybrid::HybridScorer;
pub use phonetic::{PhoneticScorer, soundex};

use dupescope_core::{MatchConfig, MatchMethod};

pub trait Scorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Build the scorer selected by `cfg.method`.
pub fn scorer_for(cfg: &MatchConfig) -> Box<dyn Scorer> {
    match cfg.method {
        MatchMethod::Exact => Box::new(ExactScorer),
        MatchMethod::Fuzzy => Box::new(FuzzyScorer),
        MatchMethod::Phonetic => Box::new(PhoneticScorer),
        MatchMethod::Hybrid => Box::new(HybridScorer::new(cfg.hybrid)),
    }
}

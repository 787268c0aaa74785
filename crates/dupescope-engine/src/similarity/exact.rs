use super::Scorer;

/// 1.0 for equal strings, otherwise 0.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactScorer;

impl Scorer for ExactScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        if a == b { 1.0 } else { 0.0 }
    }
}

use super::Scorer;

/// Normalized edit distance: `1 - levenshtein(a, b) / max(len(a), len(b))`.
///
/// Lengths are counted in characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyScorer;

impl Scorer for FuzzyScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        let longest = a.chars().count().max(b.chars().count());
        if longest == 0 {
            return 1.0;
        }
        let distance = strsim::levenshtein(a, b) as f64;
        (1.0 - distance / longest as f64).clamp(0.0, 1.0)
    }
}

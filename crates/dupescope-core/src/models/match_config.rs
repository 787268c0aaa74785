use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DupescopeError, Result};

/// Similarity algorithm applied uniformly to every compared field of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    #[default]
    Fuzzy,
    Phonetic,
    Hybrid,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Phonetic => "phonetic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchMethod {
    type Err = DupescopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            "phonetic" => Ok(Self::Phonetic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(DupescopeError::InvalidConfig(format!(
                "unknown match method '{other}'"
            ))),
        }
    }
}

/// Relative weights of the fuzzy and phonetic components of hybrid scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridWeights {
    pub fuzzy: f64,
    pub phonetic: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            fuzzy: 0.7,
            phonetic: 0.3,
        }
    }
}

/// Optional pre-filter that limits which pairs get compared.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Blocking {
    /// Compare every pair.
    #[default]
    None,
    /// Only compare records whose normalized `field` shares its first
    /// `prefix_len` characters.
    FieldPrefix { field: String, prefix_len: usize },
}

impl Blocking {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Matching policy for one detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub threshold: f64,
    pub method: MatchMethod,
    pub case_sensitive: bool,
    /// Field name → weight. Weights are normalized by their sum when scoring.
    pub fields: BTreeMap<String, f64>,
    pub hybrid: HybridWeights,
    pub blocking: Blocking,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            method: MatchMethod::Fuzzy,
            case_sensitive: false,
            fields: BTreeMap::new(),
            hybrid: HybridWeights::default(),
            blocking: Blocking::None,
        }
    }
}

impl MatchConfig {
    pub fn new(method: MatchMethod, threshold: f64) -> Self {
        Self {
            method,
            threshold,
            ..Self::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, weight: f64) -> Self {
        self.fields.insert(name.into(), weight);
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_hybrid_weights(mut self, fuzzy: f64, phonetic: f64) -> Self {
        self.hybrid = HybridWeights { fuzzy, phonetic };
        self
    }

    pub fn with_blocking(mut self, blocking: Blocking) -> Self {
        self.blocking = blocking;
        self
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(invalid("at least one field must be compared"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(invalid(format!(
                "threshold {} is outside [0, 1]",
                self.threshold
            )));
        }
        for (name, weight) in &self.fields {
            if name.trim().is_empty() {
                return Err(invalid("field names must not be blank"));
            }
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(invalid(format!(
                    "weight for field '{name}' must be > 0, got {weight}"
                )));
            }
        }

        let HybridWeights { fuzzy, phonetic } = self.hybrid;
        if !fuzzy.is_finite() || !phonetic.is_finite() || fuzzy < 0.0 || phonetic < 0.0 {
            return Err(invalid("hybrid weights must be finite and non-negative"));
        }
        if fuzzy + phonetic <= 0.0 {
            return Err(invalid("hybrid weights must not both be zero"));
        }

        if let Blocking::FieldPrefix { field, prefix_len } = &self.blocking {
            if field.trim().is_empty() {
                return Err(invalid("blocking field must not be blank"));
            }
            if *prefix_len == 0 {
                return Err(invalid("blocking prefix length must be at least 1"));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> DupescopeError {
    DupescopeError::InvalidConfig(message.into())
}

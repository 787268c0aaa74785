use clap::Args;

use dupescope_core::{Blocking, MatchConfig, MatchMethod};

/// Command-line overrides layered on top of the `[matching]` config section.
#[derive(Debug, Default, Args)]
pub struct MatchOverrides {
    /// Minimum aggregate score for two records to match (0.0–1.0).
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Similarity method: exact, fuzzy, phonetic or hybrid.
    #[arg(long)]
    pub method: Option<MatchMethod>,

    /// Compare values without lowercasing them.
    #[arg(long)]
    pub case_sensitive: bool,

    /// Field to compare with its weight, e.g. `--field name=2`. Replaces the
    /// configured field set when given at least once.
    #[arg(long = "field", value_parser = parse_field_weight, action = clap::ArgAction::Append)]
    pub fields: Vec<(String, f64)>,

    /// Only compare records sharing a prefix of this field.
    #[arg(long)]
    pub block_field: Option<String>,

    /// Prefix length used with `--block-field`.
    #[arg(long, default_value = "3", requires = "block_field")]
    pub block_prefix: usize,
}

impl MatchOverrides {
    pub fn apply(&self, cfg: &mut MatchConfig) {
        if let Some(threshold) = self.threshold {
            cfg.threshold = threshold;
        }
        if let Some(method) = self.method {
            cfg.method = method;
        }
        if self.case_sensitive {
            cfg.case_sensitive = true;
        }
        if !self.fields.is_empty() {
            cfg.fields = self.fields.iter().cloned().collect();
        }
        if let Some(field) = &self.block_field {
            cfg.blocking = Blocking::FieldPrefix {
                field: field.clone(),
                prefix_len: self.block_prefix,
            };
        }
    }
}

/// Parse `name=weight`; a bare `name` gets weight 1.
pub fn parse_field_weight(raw: &str) -> Result<(String, f64), String> {
    let (name, weight) = match raw.split_once('=') {
        Some((name, weight)) => {
            let weight = weight
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid weight in `{raw}`: {e}"))?;
            (name, weight)
        }
        None => (raw, 1.0),
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    Ok((name.to_string(), weight))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_weight() {
        assert_eq!(parse_field_weight("name=2").unwrap(), ("name".into(), 2.0));
        assert_eq!(parse_field_weight(" email = 0.5").unwrap(), ("email".into(), 0.5));
        assert_eq!(parse_field_weight("city").unwrap(), ("city".into(), 1.0));
        assert!(parse_field_weight("=1").is_err());
        assert!(parse_field_weight("name=heavy").is_err());
    }

    #[test]
    fn test_apply_replaces_fields_and_sets_blocking() {
        let mut cfg = MatchConfig::new(MatchMethod::Fuzzy, 0.7)
            .with_field("name", 1.0)
            .with_field("phone", 1.0);
        let overrides = MatchOverrides {
            threshold: Some(0.9),
            method: Some(MatchMethod::Hybrid),
            fields: vec![("email".into(), 2.0)],
            block_field: Some("email".into()),
            block_prefix: 4,
            ..Default::default()
        };

        overrides.apply(&mut cfg);

        assert_eq!(cfg.threshold, 0.9);
        assert_eq!(cfg.method, MatchMethod::Hybrid);
        assert_eq!(cfg.fields.len(), 1);
        assert_eq!(cfg.fields["email"], 2.0);
        assert_eq!(
            cfg.blocking,
            Blocking::FieldPrefix {
                field: "email".into(),
                prefix_len: 4
            }
        );
        assert!(!cfg.case_sensitive);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let original = MatchConfig::new(MatchMethod::Phonetic, 0.5).with_field("name", 1.0);
        let mut cfg = original.clone();
        MatchOverrides::default().apply(&mut cfg);
        assert_eq!(cfg, original);
    }
}

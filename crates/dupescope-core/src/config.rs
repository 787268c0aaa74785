use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{MatchConfig, MatchMethod};

/// Root application configuration, loaded from `~/.config/dupescope/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub matching: MatchConfig,
    pub engine: EngineConfig,
}

/// Execution knobs for detection passes. They affect wall-clock time only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for pair scoring; 0 means one per available core.
    pub workers: usize,
    /// Pairs scored between two cancellation checks.
    pub batch_size: usize,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_contact_fields()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            batch_size: 4096,
        }
    }
}

impl AppConfig {
    /// Defaults matching the fields of a typical contact list.
    pub fn with_contact_fields() -> Self {
        let matching = MatchConfig::new(MatchMethod::Fuzzy, 0.7)
            .with_field("name", 1.0)
            .with_field("email", 1.0)
            .with_field("phone", 1.0)
            .with_field("city", 1.0);
        Self {
            matching,
            engine: EngineConfig::default(),
        }
    }

    // ─── Load / Save ───────────────────────────────────────

    /// Standard config file path: `~/.config/dupescope/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("DUPESCOPE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dupescope")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Validated matching policy, the boundary before the engine sees it.
    pub fn match_config(&self) -> Result<MatchConfig> {
        self.matching.validate()?;
        Ok(self.matching.clone())
    }
}

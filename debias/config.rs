use crate::error::DebiasError;
use crate::strategy::DebiasStrategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_COVARIATE_COLUMN: &str = "gc";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid debiasing parameters: {0}")]
    Invalid(#[from] DebiasError),
}

fn default_covariate_column() -> String {
    DEFAULT_COVARIATE_COLUMN.to_string()
}

/// Everything needed to debias one depth table, as stored in a TOML file:
///
/// ```toml
/// covariate_column = "gc"
/// id_columns = 3
///
/// [strategy]
/// kind = "moving-median"
/// window = 101
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebiasConfig {
    /// Name of the table column holding the per-row covariate.
    #[serde(default = "default_covariate_column")]
    pub covariate_column: String,
    /// Leading columns copied through untouched (chromosome, start, end, ...).
    #[serde(default)]
    pub id_columns: usize,
    pub strategy: DebiasStrategy,
}

impl DebiasConfig {
    pub fn new(strategy: DebiasStrategy) -> Self {
        Self {
            covariate_column: default_covariate_column(),
            id_columns: 0,
            strategy,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.strategy.validate()?;
        Ok(config)
    }

    /// Loads and validates a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_each_strategy_kind() {
        let moving = DebiasConfig::from_toml_str(
            "[strategy]\nkind = \"moving-median\"\nwindow = 101\n",
        )
        .unwrap();
        assert_eq!(moving.strategy, DebiasStrategy::MovingMedian { window: 101 });
        assert_eq!(moving.covariate_column, "gc");
        assert_eq!(moving.id_columns, 0);

        let chunked = DebiasConfig::from_toml_str(
            "covariate_column = \"gc_frac\"\nid_columns = 3\n[strategy]\nkind = \"chunked-ratio\"\nscore_window = 0.01\n",
        )
        .unwrap();
        assert_eq!(
            chunked.strategy,
            DebiasStrategy::ChunkedRatio { score_window: 0.01 }
        );
        assert_eq!(chunked.covariate_column, "gc_frac");
        assert_eq!(chunked.id_columns, 3);

        let spectral = DebiasConfig::from_toml_str(
            "[strategy]\nkind = \"variance-truncation\"\nmin_variance_pct = 5.0\n",
        )
        .unwrap();
        assert_eq!(
            spectral.strategy,
            DebiasStrategy::VarianceTruncation {
                min_variance_pct: 5.0
            }
        );
    }

    #[test]
    fn missing_parameter_is_rejected() {
        let err = DebiasConfig::from_toml_str("[strategy]\nkind = \"chunked-ratio\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = DebiasConfig::from_toml_str("[strategy]\nkind = \"lowess\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_score_window_is_invalid() {
        let err = DebiasConfig::from_toml_str(
            "[strategy]\nkind = \"chunked-ratio\"\nscore_window = 0.0\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(DebiasError::InvalidScoreWindow(_))
        ));
    }

    #[test]
    fn save_then_load_preserves_config() {
        let mut config = DebiasConfig::new(DebiasStrategy::ChunkedRatio { score_window: 0.05 });
        config.covariate_column = "gc_content".to_string();
        config.id_columns = 2;

        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        config.save(temp_file.path()).expect("Failed to save config");
        let loaded = DebiasConfig::load(temp_file.path()).expect("Failed to load config");

        assert_eq!(loaded, config);
    }
}

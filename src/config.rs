//! Signing and transport settings.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings shared by the signing passes and the numeral transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Cost budget handed to the evaluator for each coin spend.
    #[serde(default = "default_cost_limit")]
    pub cost_limit: u64,

    /// Data bytes per transport chunk, metadata excluded.
    #[serde(default = "default_chunk_payload")]
    pub chunk_payload: usize,

    /// Compress transport payloads when that makes them shorter.
    #[serde(default)]
    pub compress: bool,
}

fn default_cost_limit() -> u64 {
    11_000_000_000
}

fn default_chunk_payload() -> usize {
    250
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cost_limit: default_cost_limit(),
            chunk_payload: default_chunk_payload(),
            compress: false,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_payload == 0 {
            return Err(ConfigError::Invalid("chunk_payload must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn fields_override_defaults() {
        let config = Config::from_toml("cost_limit = 500\ncompress = true\n").unwrap();
        assert_eq!(config.cost_limit, 500);
        assert_eq!(config.chunk_payload, 250);
        assert!(config.compress);
    }

    #[test]
    fn invalid_configs() {
        assert!(matches!(
            Config::from_toml("chunk_payload = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("cost_limit = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_file("/nonexistent/hsms.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use regsynth_generate::GenerateOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Contents of `regsynth.toml`. Every table and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegsynthConfig {
    pub generation: GenerateOptions,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Read the config file when one is given; defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<RegsynthConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(RegsynthConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<RegsynthConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn partial_generation_table_keeps_defaults() {
        let config = parse_config(
            r#"
[generation]
record_count = 250
seed = 7
reference_date = "2024-06-30"
death_probability = 0.0

[logging]
level = "debug"
"#,
        )
        .expect("parse config");

        assert_eq!(config.generation.record_count, 250);
        assert_eq!(config.generation.seed, 7);
        assert_eq!(
            config.generation.reference_date,
            NaiveDate::from_ymd_opt(2024, 6, 30).expect("date")
        );
        assert_eq!(config.generation.death_probability, 0.0);
        assert_eq!(
            config.generation.max_residencies,
            GenerateOptions::default().max_residencies
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(parse_config("").expect("parse"), RegsynthConfig::default());
        assert_eq!(load_config(None).expect("load"), RegsynthConfig::default());
    }

    #[test]
    fn mistyped_value_is_rejected() {
        let err = parse_config("[generation]\nrecord_count = \"many\"\n").expect_err("bad type");
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn missing_file_names_the_path() {
        let path = Path::new("/nonexistent/regsynth.toml");
        let err = load_config(Some(path)).expect_err("missing file");
        assert!(err.to_string().contains("/nonexistent/regsynth.toml"));
    }
}

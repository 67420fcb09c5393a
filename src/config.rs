use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Translation settings with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Deepest expression tree the translator accepts
    #[validate(range(
        min = 1,
        max = 10000,
        message = "Max expression depth must be between 1 and 10000"
    ))]
    pub max_expression_depth: usize,

    /// Log every translated tree at info level
    pub log_translations: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_expression_depth: 256,
            log_translations: false,
        }
    }
}

impl TranslationConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_expression_depth: parse_env_var("EXPRMAP_MAX_DEPTH", "256")?,
            log_translations: parse_env_var("EXPRMAP_LOG_TRANSLATIONS", "false")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of this configuration
    pub fn with_overrides(
        mut self,
        max_expression_depth: Option<usize>,
        log_translations: bool,
    ) -> Result<Self, ConfigError> {
        if let Some(depth) = max_expression_depth {
            self.max_expression_depth = depth;
        }
        self.log_translations |= log_translations;

        self.validate()?;
        Ok(self)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

//! Application configuration.
//!
//! A configuration file (`.toml` or `.json`) supplies defaults for the CLI:
//!
//! ```toml
//! reader = "csv"
//! writer = "json"
//! transforms = ["normalize_currency"]
//! fail_on_error = true
//! log_level = "info"
//!
//! [reader_options]
//! delimiter = ";"
//!
//! [validation]
//! mode = "continue"
//!
//! [[validation.validators]]
//! type = "positive_amounts"
//! params = { account_patterns = ["^4"] }
//! ```
//!
//! Command-line arguments take precedence over file values.

use crate::core::error::ValidatorConfigurationError;
use crate::io::{FormatRegistry, TransformRegistry};
use crate::pipeline::stage::StageOptions;
use crate::validation::declarative::PipelineConfig;
use crate::validation::pipeline::ValidationPipeline;
use crate::validation::registry::ValidatorRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors in application configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("cannot parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unknown {kind} '{name}' (available: {})", available.join(", "))]
    UnknownComponent {
        kind: &'static str,
        name: String,
        available: Vec<String>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("configuration has {} problem(s):\n  - {}", problems.len(), problems.join("\n  - "))]
    Problems { problems: Vec<String> },

    #[error(transparent)]
    Validators(#[from] ValidatorConfigurationError),
}

/// Defaults for conversion runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Reader format name
    pub reader: Option<String>,
    /// Writer format name
    pub writer: Option<String>,
    /// Options handed to the reader
    pub reader_options: StageOptions,
    /// Options handed to the writer
    pub writer_options: StageOptions,
    /// Transform names, applied in order
    pub transforms: Vec<String>,
    /// Validation run after the transforms
    pub validation: Option<PipelineConfig>,
    /// Fail the run when validation finds errors
    pub fail_on_error: bool,
    /// Log level (`error`, `warn`, `info`, `debug`, `trace`, `off`)
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Parse JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    /// Load from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let text = std::fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            _ => Err("unsupported configuration format (expected .toml or .json)".to_string()),
        }
        .map_err(parse_error)?;

        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Verify that every referenced component exists.
    ///
    /// All problems are collected and reported together.
    pub fn check(
        &self,
        formats: &FormatRegistry,
        transforms: &TransformRegistry,
        validators: &ValidatorRegistry,
    ) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if let Some(ref reader) = self.reader {
            if !formats.has_reader(reader) {
                problems.push(format!("unknown reader '{}'", reader));
            }
        }
        if let Some(ref writer) = self.writer {
            if !formats.has_writer(writer) {
                problems.push(format!("unknown writer '{}'", writer));
            }
        }
        for name in &self.transforms {
            if !transforms.contains(name) {
                problems.push(format!("unknown transform '{}'", name));
            }
        }
        if let Some(ref validation) = self.validation {
            if let Err(e) = validation.build(validators) {
                problems.push(e.to_string());
            }
        }
        if let Some(ref level) = self.log_level {
            if log::LevelFilter::from_str(level).is_err() {
                problems.push(format!("invalid log_level '{}'", level));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Problems { problems })
        }
    }

    /// Build the configured validation pipeline, if any.
    pub fn validation_pipeline(
        &self,
        validators: &ValidatorRegistry,
    ) -> Result<Option<ValidationPipeline>, ConfigError> {
        self.validation
            .as_ref()
            .map(|config| config.build(validators))
            .transpose()
            .map_err(ConfigError::from)
    }
}

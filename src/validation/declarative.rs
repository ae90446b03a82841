//! Declarative pipeline configuration.
//!
//! A pipeline can be described in TOML or JSON:
//!
//! ```toml
//! mode = "continue"
//! parallel = false
//!
//! [[validators]]
//! type = "positive_amounts"
//! params = { account_patterns = ["^4"] }
//!
//! [[validators]]
//! type = "detect_duplicates"
//! severity = "warning"
//! params = { fields = ["date", "account", "reference"], mode = "fuzzy" }
//! ```
//!
//! Dates inside `params` are written as quoted `YYYY-MM-DD` strings.

use crate::core::error::ValidatorConfigurationError;
use crate::validation::pipeline::{ValidationMode, ValidationPipeline};
use crate::validation::registry::ValidatorRegistry;
use crate::validation::validator::{Severity, Validator, WithSeverity};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

/// One validator in a declarative configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorSpec {
    /// Registry name or alias
    #[serde(rename = "type")]
    pub kind: String,
    /// Validator parameters
    #[serde(default)]
    pub params: JsonValue,
    /// Severity applied to the validator's errors
    #[serde(default)]
    pub severity: Severity,
}

impl ValidatorSpec {
    /// Create a spec with parameters and default severity.
    pub fn new(kind: impl Into<String>, params: JsonValue) -> Self {
        Self {
            kind: kind.into(),
            params,
            severity: Severity::Error,
        }
    }

    /// Set the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// A declarative validation pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Validators in run order
    #[serde(default)]
    pub validators: Vec<ValidatorSpec>,
    /// Failure policy
    #[serde(default)]
    pub mode: ValidationMode,
    /// Run validators on the thread pool in continue mode
    #[serde(default)]
    pub parallel: bool,
}

impl PipelineConfig {
    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ValidatorConfigurationError> {
        toml::from_str(text).map_err(|e| invalid(format!("TOML: {}", e)))
    }

    /// Parse JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ValidatorConfigurationError> {
        serde_json::from_str(text).map_err(|e| invalid(format!("JSON: {}", e)))
    }

    /// Load from a `.toml` or `.json` file.
    pub fn from_path(path: &Path) -> Result<Self, ValidatorConfigurationError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            invalid(format!(
                "cannot read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            other => Err(invalid(format!(
                "unsupported configuration format '{}' (expected .toml or .json)",
                other.unwrap_or("")
            ))),
        }
    }

    /// Check every spec against the registry without building anything.
    pub fn validate_schema(
        &self,
        registry: &ValidatorRegistry,
    ) -> Result<(), ValidatorConfigurationError> {
        for (index, spec) in self.validators.iter().enumerate() {
            if !registry.contains(&spec.kind) {
                return Err(ValidatorConfigurationError::InvalidSpec {
                    index,
                    validator: spec.kind.clone(),
                    source: Box::new(ValidatorConfigurationError::UnknownValidator {
                        name: spec.kind.clone(),
                        available: registry.available(),
                    }),
                });
            }
            if !(spec.params.is_object() || spec.params.is_null()) {
                return Err(ValidatorConfigurationError::InvalidSpec {
                    index,
                    validator: spec.kind.clone(),
                    source: Box::new(ValidatorConfigurationError::invalid_parameters(
                        spec.kind.clone(),
                        "params must be a table",
                    )),
                });
            }
        }
        Ok(())
    }

    /// Build the pipeline.
    pub fn build(
        &self,
        registry: &ValidatorRegistry,
    ) -> Result<ValidationPipeline, ValidatorConfigurationError> {
        self.validate_schema(registry)?;

        let validators = self
            .validators
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let validator = registry.create(&spec.kind, &spec.params).map_err(|e| {
                    ValidatorConfigurationError::InvalidSpec {
                        index,
                        validator: spec.kind.clone(),
                        source: Box::new(e),
                    }
                })?;
                Ok(match spec.severity {
                    Severity::Error => validator,
                    Severity::Warning => {
                        Box::new(WithSeverity::new(validator, Severity::Warning))
                            as Box<dyn Validator>
                    }
                })
            })
            .collect::<Result<Vec<_>, ValidatorConfigurationError>>()?;

        log::debug!(
            "built validation pipeline with {} validators ({} mode)",
            validators.len(),
            self.mode
        );
        Ok(ValidationPipeline::new(validators, self.mode).with_parallel(self.parallel))
    }
}

/// Load a configuration file and build its pipeline.
pub fn load_pipeline(
    path: &Path,
    registry: &ValidatorRegistry,
) -> Result<ValidationPipeline, ValidatorConfigurationError> {
    PipelineConfig::from_path(path)?.build(registry)
}

fn invalid(reason: String) -> ValidatorConfigurationError {
    ValidatorConfigurationError::InvalidConfiguration { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, sample_table, table};
    use crate::validation::business::PositiveAmountsValidator;
    use crate::validation::quality::{DuplicateDetectionValidator, DuplicateMode};
    use serde_json::json;
    use std::io::Write;

    const TOML_CONFIG: &str = r#"
mode = "continue"

[[validators]]
type = "positive_amounts"
params = { account_patterns = ["^4"] }

[[validators]]
type = "detect_duplicates"
params = { fields = ["date", "account", "reference"], mode = "fuzzy" }
"#;

    #[test]
    fn test_toml_matches_direct_construction() {
        let registry = ValidatorRegistry::with_builtins();
        let configured = PipelineConfig::from_toml_str(TOML_CONFIG)
            .unwrap()
            .build(&registry)
            .unwrap();

        let direct = ValidationPipeline::new(Vec::new(), ValidationMode::Continue)
            .with_validator(PositiveAmountsValidator::new(&["^4"]).unwrap())
            .with_validator(
                DuplicateDetectionValidator::new(
                    vec!["date".into(), "account".into(), "reference".into()],
                    DuplicateMode::Fuzzy,
                )
                .unwrap(),
            );

        let ir = sample_table();
        assert_eq!(
            configured.run(&ir).unwrap().results(),
            direct.run(&ir).unwrap().results()
        );
    }

    #[test]
    fn test_json_config() {
        let config = PipelineConfig::from_json_str(
            r#"{"mode": "fail_fast", "parallel": false,
                "validators": [{"type": "date_range", "params": {"min_date": "2024-01-01"}}]}"#,
        )
        .unwrap();
        assert_eq!(config.mode, ValidationMode::FailFast);
        let pipeline = config.build(&ValidatorRegistry::with_builtins()).unwrap();
        assert_eq!(pipeline.validator_names(), ["date_range"]);
    }

    #[test]
    fn test_unknown_type_names_available() {
        let config = PipelineConfig {
            validators: vec![ValidatorSpec::new("spellcheck", JsonValue::Null)],
            ..Default::default()
        };
        let err = config
            .build(&ValidatorRegistry::with_builtins())
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("#0"));
        assert!(text.contains("spellcheck"));
        assert!(text.contains("positive_amounts"));
    }

    #[test]
    fn test_bad_params_reported_with_index() {
        let config = PipelineConfig {
            validators: vec![
                ValidatorSpec::new("detect_missing", json!({"fields": ["description"]})),
                ValidatorSpec::new("date_range", json!({"min_date": "2024-02-01", "max_date": "2024-01-01"})),
            ],
            ..Default::default()
        };
        let err = config
            .build(&ValidatorRegistry::with_builtins())
            .unwrap_err();
        assert!(matches!(
            err,
            ValidatorConfigurationError::InvalidSpec { index: 1, .. }
        ));

        let not_a_table = PipelineConfig {
            validators: vec![ValidatorSpec::new("date_range", json!([1, 2]))],
            ..Default::default()
        };
        assert!(not_a_table
            .validate_schema(&ValidatorRegistry::with_builtins())
            .is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(PipelineConfig::from_toml_str("strict = true").is_err());
        assert!(PipelineConfig::from_json_str(
            r#"{"validators": [{"type": "date_range", "level": "warning"}]}"#
        )
        .is_err());
        assert!(PipelineConfig::from_toml_str(r#"mode = "eventually""#).is_err());
    }

    #[test]
    fn test_warning_severity_demotes_errors() {
        let config = PipelineConfig {
            validators: vec![ValidatorSpec::new(
                "positive_amounts",
                json!({"account_patterns": ["^4"]}),
            )
            .with_severity(Severity::Warning)],
            ..Default::default()
        };
        let pipeline = config.build(&ValidatorRegistry::with_builtins()).unwrap();
        let ir = table(vec![record("2024-01-01", "4001", "-10", "USD")]);
        let report = pipeline.run(&ir).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.warnings_count(), 1);
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(TOML_CONFIG.as_bytes()).unwrap();
        let pipeline = load_pipeline(file.path(), &ValidatorRegistry::with_builtins()).unwrap();
        assert_eq!(pipeline.len(), 2);

        let missing = PipelineConfig::from_path(Path::new("/nonexistent/validation.toml"));
        assert!(missing.is_err());
    }
}

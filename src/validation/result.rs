//! Outcome of a single validator run.

use crate::validation::report::ReportFormatError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Result of applying one validator to a table.
///
/// Findings are split into errors (the data fails the check) and warnings
/// (worth a look, not a failure). A result is valid exactly when it carries
/// no errors; there is no way to construct one where the two disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ResultDocument", try_from = "ResultDocument")]
pub struct ValidationResult {
    validator_name: String,
    errors: Vec<String>,
    warnings: Vec<String>,
    metadata: IndexMap<String, JsonValue>,
}

impl ValidationResult {
    /// A passing result with no findings.
    pub fn pass(validator_name: impl Into<String>) -> Self {
        Self {
            validator_name: validator_name.into(),
            errors: Vec::new(),
            warnings: Vec::new(),
            metadata: IndexMap::new(),
        }
    }

    /// Create a result from its parts.
    pub fn new(
        validator_name: impl Into<String>,
        errors: Vec<String>,
        warnings: Vec<String>,
        metadata: IndexMap<String, JsonValue>,
    ) -> Self {
        Self {
            validator_name: validator_name.into(),
            errors,
            warnings,
            metadata,
        }
    }

    /// Add an error.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    /// Add several errors.
    pub fn with_errors(mut self, errors: impl IntoIterator<Item = String>) -> Self {
        self.errors.extend(errors);
        self
    }

    /// Add a warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Add several warnings.
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// Set a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// True when there are no errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if validation failed with errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if validation has warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Name of the validator that produced this result.
    pub fn validator_name(&self) -> &str {
        &self.validator_name
    }

    /// Errors in the order they were found.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Warnings in the order they were found.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Diagnostic metadata.
    pub fn metadata(&self) -> &IndexMap<String, JsonValue> {
        &self.metadata
    }

    /// One metadata entry.
    pub fn metadata_value(&self, key: &str) -> Option<&JsonValue> {
        self.metadata.get(key)
    }

    /// Render as console text.
    ///
    /// ```text
    /// [positive_amounts] Validation failed
    /// Errors:
    ///   - Account 4001 has non-positive amount -10 (row: 0)
    /// ```
    pub fn format(&self) -> String {
        let status = if self.is_valid() { "passed" } else { "failed" };
        let mut lines = vec![format!("[{}] Validation {}", self.validator_name, status)];

        if self.has_errors() {
            lines.push("Errors:".to_string());
            lines.extend(self.errors.iter().map(|e| format!("  - {}", e)));
        }
        if self.has_warnings() {
            lines.push("Warnings:".to_string());
            lines.extend(self.warnings.iter().map(|w| format!("  - {}", w)));
        }

        lines.join("\n")
    }

    /// Merge several results into one named `combined`.
    ///
    /// Errors and warnings keep their order; metadata records how many
    /// results were merged.
    pub fn combine<'a>(results: impl IntoIterator<Item = &'a ValidationResult>) -> Self {
        let mut combined = Self::pass("combined");
        let mut count = 0usize;
        for result in results {
            combined.errors.extend(result.errors.iter().cloned());
            combined.warnings.extend(result.warnings.iter().cloned());
            count += 1;
        }
        combined.with_metadata("combined_count", count)
    }

    /// Turn every error into a warning.
    ///
    /// Demoted errors come first, followed by the original warnings.
    pub fn demote_errors(self) -> Self {
        if self.errors.is_empty() {
            return self;
        }
        let demoted = self.errors.len();
        let mut warnings = self.errors;
        warnings.extend(self.warnings);
        Self {
            validator_name: self.validator_name,
            errors: Vec::new(),
            warnings,
            metadata: self.metadata,
        }
        .with_metadata("demoted_errors", demoted)
    }
}

// ============================================================================
// Serialization
// ============================================================================

#[derive(Serialize, Deserialize)]
struct ResultDocument {
    validator_name: String,
    is_valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
    #[serde(default)]
    metadata: IndexMap<String, JsonValue>,
}

impl From<ValidationResult> for ResultDocument {
    fn from(result: ValidationResult) -> Self {
        Self {
            is_valid: result.is_valid(),
            validator_name: result.validator_name,
            errors: result.errors,
            warnings: result.warnings,
            metadata: result.metadata,
        }
    }
}

impl TryFrom<ResultDocument> for ValidationResult {
    type Error = ReportFormatError;

    fn try_from(doc: ResultDocument) -> Result<Self, Self::Error> {
        if doc.is_valid != doc.errors.is_empty() {
            return Err(ReportFormatError::InconsistentResult {
                validator: doc.validator_name,
                is_valid: doc.is_valid,
                errors: doc.errors.len(),
            });
        }
        Ok(Self {
            validator_name: doc.validator_name,
            errors: doc.errors,
            warnings: doc.warnings,
            metadata: doc.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_follows_errors() {
        let result = ValidationResult::pass("v").with_warning("w");
        assert!(result.is_valid());
        assert!(result.has_warnings());

        let result = result.with_error("e");
        assert!(!result.is_valid());
        assert!(result.has_errors());
    }

    #[test]
    fn test_format() {
        let result = ValidationResult::pass("test_validator")
            .with_error("Error 1")
            .with_error("Error 2")
            .with_warning("Warning 1");
        assert_eq!(
            result.format(),
            "[test_validator] Validation failed\nErrors:\n  - Error 1\n  - Error 2\nWarnings:\n  - Warning 1"
        );
        assert_eq!(ValidationResult::pass("ok").format(), "[ok] Validation passed");
    }

    #[test]
    fn test_combine() {
        let a = ValidationResult::pass("a").with_error("e1");
        let b = ValidationResult::pass("b").with_warning("w1");
        let combined = ValidationResult::combine([&a, &b]);
        assert_eq!(combined.validator_name(), "combined");
        assert!(!combined.is_valid());
        assert_eq!(combined.errors(), ["e1"]);
        assert_eq!(combined.warnings(), ["w1"]);
        assert_eq!(combined.metadata_value("combined_count"), Some(&JsonValue::from(2)));
    }

    #[test]
    fn test_demote_errors() {
        let result = ValidationResult::pass("v")
            .with_error("e1")
            .with_warning("w1")
            .demote_errors();
        assert!(result.is_valid());
        assert_eq!(result.warnings(), ["e1", "w1"]);
    }

    #[test]
    fn test_serde_rejects_inconsistent_validity() {
        let json = r#"{"validator_name":"v","is_valid":true,"errors":["x"],"warnings":[]}"#;
        assert!(serde_json::from_str::<ValidationResult>(json).is_err());

        let result = ValidationResult::pass("v")
            .with_error("x")
            .with_metadata("count", 1);
        let text = serde_json::to_string(&result).unwrap();
        assert!(text.contains("\"is_valid\":false"));
        let back: ValidationResult = serde_json::from_str(&text).unwrap();
        assert_eq!(back, result);
    }
}

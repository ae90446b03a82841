//! Aggregated validation report.

use crate::validation::result::ValidationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A persisted report or result does not describe itself consistently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportFormatError {
    #[error("result '{validator}' claims is_valid={is_valid} but carries {errors} errors")]
    InconsistentResult {
        validator: String,
        is_valid: bool,
        errors: usize,
    },

    #[error("report summary field '{field}' is {stated}, but the results give {actual}")]
    InconsistentCounters {
        field: &'static str,
        stated: usize,
        actual: usize,
    },

    #[error("malformed report: {0}")]
    Malformed(String),
}

/// Which results to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityFilter {
    /// Every result
    #[default]
    All,
    /// Results with errors
    Errors,
    /// Results with warnings
    Warnings,
}

impl SeverityFilter {
    fn matches(&self, result: &ValidationResult) -> bool {
        match self {
            SeverityFilter::All => true,
            SeverityFilter::Errors => result.has_errors(),
            SeverityFilter::Warnings => result.has_warnings(),
        }
    }
}

impl FromStr for SeverityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(SeverityFilter::All),
            "errors" | "error" => Ok(SeverityFilter::Errors),
            "warnings" | "warning" => Ok(SeverityFilter::Warnings),
            other => Err(format!(
                "unknown severity filter '{}' (expected all, errors or warnings)",
                other
            )),
        }
    }
}

impl fmt::Display for SeverityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeverityFilter::All => "all",
            SeverityFilter::Errors => "errors",
            SeverityFilter::Warnings => "warnings",
        };
        write!(f, "{}", name)
    }
}

/// Ordered results of one pipeline run with derived counters.
///
/// Counters are computed from the results at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ReportDocument", try_from = "ReportDocument")]
pub struct ValidationReport {
    results: Vec<ValidationResult>,
    timestamp: DateTime<Utc>,
    total: usize,
    passed: usize,
    failed: usize,
    warnings_count: usize,
}

impl ValidationReport {
    /// Build a report stamped with the current time.
    pub fn new(results: Vec<ValidationResult>) -> Self {
        Self::at(results, Utc::now())
    }

    /// Build a report with an explicit timestamp.
    pub fn at(results: Vec<ValidationResult>, timestamp: DateTime<Utc>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.is_valid()).count();
        let warnings_count = results.iter().map(|r| r.warnings().len()).sum();
        Self {
            results,
            timestamp,
            total,
            passed,
            failed: total - passed,
            warnings_count,
        }
    }

    /// A valid report with no results.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Results in validator order.
    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    /// When the report was produced.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Number of results.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of valid results.
    pub fn passed(&self) -> usize {
        self.passed
    }

    /// Number of invalid results.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Warnings across all results.
    pub fn warnings_count(&self) -> usize {
        self.warnings_count
    }

    /// True when no validator failed.
    pub fn is_valid(&self) -> bool {
        self.failed == 0
    }

    /// Find a result by validator name.
    pub fn result(&self, validator_name: &str) -> Option<&ValidationResult> {
        self.results
            .iter()
            .find(|r| r.validator_name() == validator_name)
    }

    /// One-line summary of the counters.
    pub fn summary(&self) -> String {
        format!(
            "Validation Summary: {}/{} passed, {} failed, {} warnings",
            self.passed, self.total, self.failed, self.warnings_count
        )
    }

    /// Render as console text, keeping only results that match the filter.
    pub fn format(&self, filter: SeverityFilter) -> String {
        let mut lines = vec![
            format!(
                "Validation Report ({})",
                self.timestamp.format("%Y-%m-%d %H:%M:%S")
            ),
            "=".repeat(60),
            self.summary(),
            String::new(),
        ];

        for result in self.results.iter().filter(|r| filter.matches(r)) {
            lines.push(result.format());
            lines.push(String::new());
        }

        lines.join("\n")
    }

    /// Export as a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Export as pretty-printed JSON text.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Rebuild a report from [`ValidationReport::to_json`] output.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ReportFormatError> {
        let doc: ReportDocument = serde_json::from_value(value)
            .map_err(|e| ReportFormatError::Malformed(e.to_string()))?;
        Self::try_from(doc)
    }

    /// Rebuild a report from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ReportFormatError> {
        let doc: ReportDocument =
            serde_json::from_str(text).map_err(|e| ReportFormatError::Malformed(e.to_string()))?;
        Self::try_from(doc)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

// ============================================================================
// Serialization
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct SummaryDocument {
    total_validators: usize,
    passed: usize,
    failed: usize,
    warnings_count: usize,
    is_valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReportDocument {
    timestamp: DateTime<Utc>,
    summary: SummaryDocument,
    results: Vec<ValidationResult>,
}

impl From<ValidationReport> for ReportDocument {
    fn from(report: ValidationReport) -> Self {
        Self {
            timestamp: report.timestamp,
            summary: SummaryDocument {
                total_validators: report.total,
                passed: report.passed,
                failed: report.failed,
                warnings_count: report.warnings_count,
                is_valid: report.is_valid(),
            },
            results: report.results,
        }
    }
}

impl TryFrom<ReportDocument> for ValidationReport {
    type Error = ReportFormatError;

    fn try_from(doc: ReportDocument) -> Result<Self, Self::Error> {
        let report = ValidationReport::at(doc.results, doc.timestamp);
        let checks = [
            ("total_validators", doc.summary.total_validators, report.total),
            ("passed", doc.summary.passed, report.passed),
            ("failed", doc.summary.failed, report.failed),
            ("warnings_count", doc.summary.warnings_count, report.warnings_count),
        ];
        for (field, stated, actual) in checks {
            if stated != actual {
                return Err(ReportFormatError::InconsistentCounters {
                    field,
                    stated,
                    actual,
                });
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mixed_results() -> Vec<ValidationResult> {
        vec![
            ValidationResult::pass("validator1").with_warning("Warning message"),
            ValidationResult::pass("validator2").with_error("Error message"),
            ValidationResult::pass("validator3"),
        ]
    }

    #[test]
    fn test_counters() {
        let report = ValidationReport::new(mixed_results());
        assert_eq!(report.total(), 3);
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.warnings_count(), 1);
        assert!(!report.is_valid());
        assert_eq!(
            report.summary(),
            "Validation Summary: 2/3 passed, 1 failed, 1 warnings"
        );
    }

    #[test]
    fn test_empty_report_is_valid() {
        let report = ValidationReport::empty();
        assert!(report.is_valid());
        assert_eq!(report.total(), 0);
        assert_eq!(report.warnings_count(), 0);
    }

    #[test]
    fn test_format_with_filter() {
        let report = ValidationReport::new(mixed_results());

        let all = report.format(SeverityFilter::All);
        assert!(all.contains("[validator1]"));
        assert!(all.contains("[validator3]"));

        let errors = report.format(SeverityFilter::Errors);
        assert!(errors.contains("[validator2]"));
        assert!(!errors.contains("[validator1]"));
        assert!(!errors.contains("[validator3]"));

        let warnings = report.format(SeverityFilter::Warnings);
        assert!(warnings.contains("[validator1]"));
        assert!(!warnings.contains("[validator2]"));
    }

    #[test]
    fn test_json_round_trip() {
        let report = ValidationReport::new(mixed_results());
        let json = report.to_json().unwrap();
        assert_eq!(json["summary"]["total_validators"], 3);
        assert_eq!(json["summary"]["is_valid"], false);

        let back = ValidationReport::from_json(json).unwrap();
        assert_eq!(back, report);

        let text = report.to_json_string().unwrap();
        assert_eq!(ValidationReport::from_json_str(&text).unwrap(), report);
    }

    #[test]
    fn test_from_json_rejects_wrong_counters() {
        let mut json = ValidationReport::new(mixed_results()).to_json().unwrap();
        json["summary"]["passed"] = serde_json::json!(3);
        let err = ValidationReport::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            ReportFormatError::InconsistentCounters { field: "passed", .. }
        ));
    }

    #[test]
    fn test_severity_filter_parse() {
        assert_eq!("errors".parse::<SeverityFilter>(), Ok(SeverityFilter::Errors));
        assert_eq!("ALL".parse::<SeverityFilter>(), Ok(SeverityFilter::All));
        assert!("fatal".parse::<SeverityFilter>().is_err());
    }

    proptest! {
        #[test]
        fn prop_counters_match_results(
            shape in prop::collection::vec((0usize..3, 0usize..3), 0..12)
        ) {
            let results: Vec<ValidationResult> = shape
                .iter()
                .enumerate()
                .map(|(i, (errors, warnings))| {
                    ValidationResult::pass(format!("v{}", i))
                        .with_errors((0..*errors).map(|e| format!("e{}", e)))
                        .with_warnings((0..*warnings).map(|w| format!("w{}", w)))
                })
                .collect();
            let report = ValidationReport::new(results);

            let expected_passed = shape.iter().filter(|(e, _)| *e == 0).count();
            let expected_warnings: usize = shape.iter().map(|(_, w)| *w).sum();
            prop_assert_eq!(report.total(), shape.len());
            prop_assert_eq!(report.passed(), expected_passed);
            prop_assert_eq!(report.failed(), shape.len() - expected_passed);
            prop_assert_eq!(report.warnings_count(), expected_warnings);
            prop_assert_eq!(report.is_valid(), expected_passed == shape.len());
        }
    }
}

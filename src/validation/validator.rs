//! The validator capability and helpers for writing validators.

use crate::core::error::ValidatorExecutionError;
use crate::core::table::IrTable;
use crate::validation::result::ValidationResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Trait for validators.
///
/// A validator inspects a table and reports findings. It must not keep
/// references to the table after returning, and must give structurally
/// equal results for equal inputs. Bad data is reported through the
/// result; `Err` is reserved for malfunctions such as a missing column.
pub trait Validator: Send + Sync {
    /// Name of this validator, used in results and reports.
    fn name(&self) -> &str;

    /// Validate the table.
    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError>;
}

impl<V: Validator + ?Sized> Validator for Box<V> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
        (**self).validate(ir)
    }
}

impl<V: Validator + ?Sized> Validator for Arc<V> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
        (**self).validate(ir)
    }
}

// ============================================================================
// Severity
// ============================================================================

/// How seriously a validator's errors are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Errors stay errors
    #[default]
    Error,
    /// Errors are reported as warnings
    Warning,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Wraps a validator and applies a severity to its findings.
pub struct WithSeverity<V> {
    inner: V,
    severity: Severity,
}

impl<V: Validator> WithSeverity<V> {
    /// Wrap a validator.
    pub fn new(inner: V, severity: Severity) -> Self {
        Self { inner, severity }
    }

    /// The applied severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }
}

impl<V: Validator> Validator for WithSeverity<V> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
        let result = self.inner.validate(ir)?;
        Ok(match self.severity {
            Severity::Error => result,
            Severity::Warning => result.demote_errors(),
        })
    }
}

// ============================================================================
// Closures as validators
// ============================================================================

/// A validator backed by a closure.
///
/// ```rust,ignore
/// let no_empty = FnValidator::new("non_empty", |ir: &IrTable| {
///     let result = ValidationResult::pass("non_empty");
///     Ok(if ir.is_empty() { result.with_error("table is empty") } else { result })
/// });
/// ```
pub struct FnValidator<F> {
    name: String,
    func: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&IrTable) -> Result<ValidationResult, ValidatorExecutionError> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&IrTable) -> Result<ValidationResult, ValidatorExecutionError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
        (self.func)(ir)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Position of a column the validator cannot work without.
pub fn require_column(
    ir: &IrTable,
    validator: &str,
    field: &str,
) -> Result<usize, ValidatorExecutionError> {
    ir.column_index(field).ok_or_else(|| {
        ValidatorExecutionError::new(
            validator,
            format!("required field not found in table: {}", field),
        )
    })
}

/// Positions of several required columns, reporting every missing one.
pub fn require_columns<S: AsRef<str>>(
    ir: &IrTable,
    validator: &str,
    fields: &[S],
) -> Result<Vec<usize>, ValidatorExecutionError> {
    let missing: Vec<&str> = fields
        .iter()
        .map(AsRef::as_ref)
        .filter(|f| !ir.has_column(f))
        .collect();
    if !missing.is_empty() {
        return Err(ValidatorExecutionError::new(
            validator,
            format!("required fields not found in table: {}", missing.join(", ")),
        ));
    }
    Ok(fields
        .iter()
        .filter_map(|f| ir.column_index(f.as_ref()))
        .collect())
}

/// Format an index list, eliding everything after the first ten.
pub fn format_indices(indices: &[usize]) -> String {
    const SHOWN: usize = 10;
    let shown: Vec<String> = indices.iter().take(SHOWN).map(usize::to_string).collect();
    if indices.len() > SHOWN {
        format!("[{}, ...]", shown.join(", "))
    } else {
        format!("[{}]", shown.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_table;

    fn always_fails() -> FnValidator<
        impl Fn(&IrTable) -> Result<ValidationResult, ValidatorExecutionError> + Send + Sync,
    > {
        FnValidator::new("always_fails", |_ir: &IrTable| {
            Ok(ValidationResult::pass("always_fails").with_error("bad"))
        })
    }

    #[test]
    fn test_fn_validator() {
        let validator = always_fails();
        assert_eq!(validator.name(), "always_fails");
        let result = validator.validate(&sample_table()).unwrap();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_with_severity_demotes() {
        let validator = WithSeverity::new(always_fails(), Severity::Warning);
        let result = validator.validate(&sample_table()).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warnings(), ["bad"]);

        let strict = WithSeverity::new(always_fails(), Severity::Error);
        assert!(!strict.validate(&sample_table()).unwrap().is_valid());
    }

    #[test]
    fn test_require_columns() {
        let ir = sample_table();
        assert_eq!(require_column(&ir, "v", "amount").unwrap(), 2);
        let err = require_columns(&ir, "v", &["amount", "memo", "tag"]).unwrap_err();
        assert_eq!(err.validator, "v");
        assert!(err.message.contains("memo, tag"));
    }

    #[test]
    fn test_format_indices() {
        assert_eq!(format_indices(&[1, 2]), "[1, 2]");
        let many: Vec<usize> = (0..12).collect();
        assert_eq!(format_indices(&many), "[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, ...]");
    }

    #[test]
    fn test_boxed_validator_delegates() {
        let boxed: Box<dyn Validator> = Box::new(always_fails());
        assert_eq!(Validator::name(&boxed), "always_fails");
    }
}

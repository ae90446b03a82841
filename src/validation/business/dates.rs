//! Allowed date window.

use crate::core::error::{ValidatorConfigurationError, ValidatorExecutionError};
use crate::core::schema::fields;
use crate::core::table::IrTable;
use crate::core::types::DATE_FORMAT;
use crate::validation::result::ValidationResult;
use crate::validation::validator::{require_column, Validator};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Parameters for [`DateRangeValidator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateRangeParams {
    /// Earliest allowed date, inclusive
    #[serde(default)]
    pub min_date: Option<NaiveDate>,
    /// Latest allowed date, inclusive
    #[serde(default)]
    pub max_date: Option<NaiveDate>,
}

/// Checks that every date falls inside an inclusive window.
#[derive(Debug, Clone)]
pub struct DateRangeValidator {
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
}

impl DateRangeValidator {
    /// Registry name.
    pub const NAME: &'static str = "date_range";

    /// Create a validator. Either bound may be open.
    pub fn new(
        min_date: Option<NaiveDate>,
        max_date: Option<NaiveDate>,
    ) -> Result<Self, ValidatorConfigurationError> {
        if let (Some(min), Some(max)) = (min_date, max_date) {
            if min > max {
                return Err(ValidatorConfigurationError::invalid_parameters(
                    Self::NAME,
                    format!("min_date ({}) must be <= max_date ({})", min, max),
                ));
            }
        }
        Ok(Self { min_date, max_date })
    }

    /// Create a validator from deserialized parameters.
    pub fn from_params(params: DateRangeParams) -> Result<Self, ValidatorConfigurationError> {
        Self::new(params.min_date, params.max_date)
    }

    fn render(date: Option<NaiveDate>) -> serde_json::Value {
        date.map(|d| json!(d.format(DATE_FORMAT).to_string()))
            .unwrap_or(serde_json::Value::Null)
    }
}

impl Validator for DateRangeValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
        if self.min_date.is_none() && self.max_date.is_none() {
            return Ok(ValidationResult::pass(Self::NAME));
        }
        let date_idx = require_column(ir, Self::NAME, fields::DATE)?;

        let mut errors = Vec::new();
        let mut violations = Vec::new();

        for (row_index, row) in ir.rows().iter().enumerate() {
            let Some(date) = row[date_idx].as_date() else {
                continue;
            };

            let violated = match (self.min_date, self.max_date) {
                (Some(min), _) if date < min => Some((
                    "min",
                    format!(
                        "Row {}: Date {} is before minimum date {}",
                        row_index, date, min
                    ),
                )),
                (_, Some(max)) if date > max => Some((
                    "max",
                    format!(
                        "Row {}: Date {} is after maximum date {}",
                        row_index, date, max
                    ),
                )),
                _ => None,
            };

            if let Some((bound, message)) = violated {
                errors.push(message);
                violations.push(json!({
                    "row_index": row_index,
                    "date": date.format(DATE_FORMAT).to_string(),
                    "bound": bound,
                }));
            }
        }

        if errors.is_empty() {
            return Ok(ValidationResult::pass(Self::NAME));
        }

        let count = violations.len();
        Ok(ValidationResult::pass(Self::NAME)
            .with_errors(errors)
            .with_metadata("violations", violations)
            .with_metadata("violation_count", count)
            .with_metadata("min_date", Self::render(self.min_date))
            .with_metadata("max_date", Self::render(self.max_date)))
    }
}

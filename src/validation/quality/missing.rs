//! Missing value detection.

use crate::core::error::{ValidatorConfigurationError, ValidatorExecutionError};
use crate::core::table::IrTable;
use crate::validation::result::ValidationResult;
use crate::validation::validator::{require_columns, Validator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

/// Parameters for [`MissingValueValidator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissingValueParams {
    /// Fields to inspect
    pub fields: Vec<String>,
}

/// Warns about fields with null or blank values.
#[derive(Debug, Clone)]
pub struct MissingValueValidator {
    fields: Vec<String>,
}

impl MissingValueValidator {
    /// Registry name.
    pub const NAME: &'static str = "missing_value_detection";

    /// Create a validator over the given fields.
    pub fn new(fields: Vec<String>) -> Result<Self, ValidatorConfigurationError> {
        if fields.is_empty() {
            return Err(ValidatorConfigurationError::invalid_parameters(
                Self::NAME,
                "fields must contain at least one field",
            ));
        }
        Ok(Self { fields })
    }

    /// Create a validator from deserialized parameters.
    pub fn from_params(params: MissingValueParams) -> Result<Self, ValidatorConfigurationError> {
        Self::new(params.fields)
    }
}

impl Validator for MissingValueValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
        let idx = require_columns(ir, Self::NAME, &self.fields)?;
        let total_rows = ir.len();

        if total_rows == 0 {
            return Ok(ValidationResult::pass(Self::NAME).with_metadata("total_rows", 0));
        }

        let mut warnings = Vec::new();
        let mut checked = Map::new();

        for (field, &column) in self.fields.iter().zip(idx.iter()) {
            let missing = ir
                .rows()
                .iter()
                .filter(|row| row[column].is_missing())
                .count();
            let percentage = missing as f64 / total_rows as f64 * 100.0;

            if missing > 0 {
                warnings.push(format!(
                    "Field '{}' has {} missing values ({:.1}% of {} rows)",
                    field, missing, percentage, total_rows
                ));
            }
            checked.insert(
                field.clone(),
                json!({ "missing_count": missing, "percentage": percentage }),
            );
        }

        Ok(ValidationResult::pass(Self::NAME)
            .with_warnings(warnings)
            .with_metadata("total_rows", total_rows)
            .with_metadata("fields_checked", checked))
    }
}

//! One currency per group of records.

use crate::core::error::{ValidatorConfigurationError, ValidatorExecutionError};
use crate::core::schema::fields;
use crate::core::table::IrTable;
use crate::core::types::Value;
use crate::validation::result::ValidationResult;
use crate::validation::validator::{require_column, require_columns, Validator};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::collections::BTreeSet;

fn default_group_by() -> Option<Vec<String>> {
    Some(vec![fields::ACCOUNT.to_string()])
}

/// Parameters for [`CurrencyConsistencyValidator`].
///
/// An absent `group_by` groups by account; an explicit `null` checks the
/// whole table as one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurrencyConsistencyParams {
    /// Grouping fields
    #[serde(default = "default_group_by")]
    pub group_by: Option<Vec<String>>,
}

impl Default for CurrencyConsistencyParams {
    fn default() -> Self {
        Self {
            group_by: default_group_by(),
        }
    }
}

/// Checks that every group of records uses a single currency.
#[derive(Debug, Clone)]
pub struct CurrencyConsistencyValidator {
    group_by: Option<Vec<String>>,
}

impl CurrencyConsistencyValidator {
    /// Registry name.
    pub const NAME: &'static str = "currency_consistency";

    /// Create a validator grouping by the given fields, or by the whole
    /// table when `None`.
    pub fn new(group_by: Option<Vec<String>>) -> Result<Self, ValidatorConfigurationError> {
        if matches!(&group_by, Some(g) if g.is_empty()) {
            return Err(ValidatorConfigurationError::invalid_parameters(
                Self::NAME,
                "group_by must contain at least one field or be null",
            ));
        }
        Ok(Self { group_by })
    }

    /// Create a validator from deserialized parameters.
    pub fn from_params(
        params: CurrencyConsistencyParams,
    ) -> Result<Self, ValidatorConfigurationError> {
        Self::new(params.group_by)
    }

    /// Grouping fields, `None` for whole-table mode.
    pub fn group_by(&self) -> Option<&[String]> {
        self.group_by.as_deref()
    }

    fn validate_whole_table(&self, ir: &IrTable, currency_idx: usize) -> ValidationResult {
        let currencies: BTreeSet<String> = ir
            .rows()
            .iter()
            .map(|row| currency_label(&row[currency_idx]))
            .collect();

        if currencies.len() <= 1 {
            return ValidationResult::pass(Self::NAME);
        }

        let list: Vec<String> = currencies.into_iter().collect();
        ValidationResult::pass(Self::NAME)
            .with_error(format!(
                "Table has multiple currencies: {} ({} distinct currencies)",
                list.join(", "),
                list.len()
            ))
            .with_metadata("currency_count", list.len())
            .with_metadata("currencies", list)
    }
}

impl Default for CurrencyConsistencyValidator {
    fn default() -> Self {
        Self {
            group_by: default_group_by(),
        }
    }
}

fn currency_label(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

impl Validator for CurrencyConsistencyValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
        let currency_idx = require_column(ir, Self::NAME, fields::CURRENCY)?;

        let Some(group_by) = &self.group_by else {
            return Ok(self.validate_whole_table(ir, currency_idx));
        };
        let group_idx = require_columns(ir, Self::NAME, group_by)?;

        // Groups keep first-appearance order.
        let mut groups: IndexMap<Vec<&Value>, BTreeSet<String>> = IndexMap::new();
        for row in ir.rows() {
            let key: Vec<&Value> = group_idx.iter().map(|&i| &row[i]).collect();
            groups
                .entry(key)
                .or_default()
                .insert(currency_label(&row[currency_idx]));
        }

        let mut errors = Vec::new();
        let mut violations = Vec::new();
        for (key, currencies) in groups.iter().filter(|(_, c)| c.len() > 1) {
            let group_id = group_by
                .iter()
                .zip(key.iter())
                .map(|(field, value)| format!("{}={}", field, value))
                .collect::<Vec<_>>()
                .join(", ");
            let list: Vec<&str> = currencies.iter().map(String::as_str).collect();

            errors.push(format!(
                "Group ({}) has multiple currencies: {} ({} distinct currencies)",
                group_id,
                list.join(", "),
                list.len()
            ));

            let group: Map<String, serde_json::Value> = group_by
                .iter()
                .zip(key.iter())
                .map(|(field, value)| (field.clone(), json!(value.to_string())))
                .collect();
            violations.push(json!({
                "group": group,
                "currencies": list,
                "currency_count": list.len(),
            }));
        }

        if errors.is_empty() {
            return Ok(ValidationResult::pass(Self::NAME));
        }

        let count = violations.len();
        Ok(ValidationResult::pass(Self::NAME)
            .with_errors(errors)
            .with_metadata("violations", violations)
            .with_metadata("groups_with_violations", count))
    }
}

//! Positive amounts for selected account classes.

use crate::core::error::{ValidatorConfigurationError, ValidatorExecutionError};
use crate::core::schema::fields;
use crate::core::table::IrTable;
use crate::validation::result::ValidationResult;
use crate::validation::validator::{require_columns, Validator};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Parameters for [`PositiveAmountsValidator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositiveAmountsParams {
    /// Regex patterns matched against the account (search semantics)
    pub account_patterns: Vec<String>,
}

/// Flags rows whose account matches a pattern but whose amount is not
/// strictly positive.
///
/// Typical use is revenue accounts (`^4`) which must only ever carry
/// positive amounts.
#[derive(Debug, Clone)]
pub struct PositiveAmountsValidator {
    patterns: Vec<Regex>,
}

impl PositiveAmountsValidator {
    /// Registry name.
    pub const NAME: &'static str = "positive_amounts";

    /// Create a validator from account patterns.
    ///
    /// At least one pattern is required and every pattern must compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ValidatorConfigurationError> {
        if patterns.is_empty() {
            return Err(ValidatorConfigurationError::invalid_parameters(
                Self::NAME,
                "account_patterns must contain at least one pattern",
            ));
        }

        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    ValidatorConfigurationError::invalid_parameters(
                        Self::NAME,
                        format!("invalid account pattern '{}': {}", p.as_ref(), e),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Create a validator from deserialized parameters.
    pub fn from_params(params: PositiveAmountsParams) -> Result<Self, ValidatorConfigurationError> {
        Self::new(&params.account_patterns)
    }

    /// Pattern sources, in configuration order.
    pub fn patterns(&self) -> Vec<&str> {
        self.patterns.iter().map(Regex::as_str).collect()
    }

    fn matches(&self, account: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(account))
    }
}

impl Validator for PositiveAmountsValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
        let idx = require_columns(ir, Self::NAME, &[fields::ACCOUNT, fields::AMOUNT])?;
        let (account_idx, amount_idx) = (idx[0], idx[1]);

        let mut errors = Vec::new();
        let mut violations = Vec::new();

        for (row_index, row) in ir.rows().iter().enumerate() {
            let (Some(account), Some(amount)) =
                (row[account_idx].as_text(), row[amount_idx].as_decimal())
            else {
                continue;
            };

            if amount <= Decimal::ZERO && self.matches(account) {
                errors.push(format!(
                    "Account {} has non-positive amount {} (row: {})",
                    account, amount, row_index
                ));
                violations.push(json!({
                    "row_index": row_index,
                    "account": account,
                    "amount": amount.to_string(),
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
            .with_metadata("violation_count", count))
    }
}

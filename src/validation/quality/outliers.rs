//! Outlier detection on amounts.
//!
//! Three bound methods are available (`zscore`, `iqr`, `percentile`). On top
//! of its own bound, every method flags *extreme* values: a value at least
//! [`EXTREME_DEVIATIONS`] sample standard deviations away from the mean of the
//! other values, or one that differs from an otherwise constant column. An
//! extreme value is therefore reported whichever method is configured.

use crate::core::error::{ValidatorConfigurationError, ValidatorExecutionError};
use crate::core::schema::fields;
use crate::core::table::IrTable;
use crate::validation::result::ValidationResult;
use crate::validation::validator::{require_column, Validator};
use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

/// Distance, in leave-one-out standard deviations, at which a value is extreme.
pub const EXTREME_DEVIATIONS: f64 = 10.0;

/// Bound method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    /// Distance from the mean in sample standard deviations
    #[default]
    Zscore,
    /// Tukey fences around the interquartile range
    Iqr,
    /// Symmetric central percentile band
    Percentile,
}

impl OutlierMethod {
    /// Threshold used when none is configured.
    pub fn default_threshold(&self) -> f64 {
        match self {
            OutlierMethod::Zscore => 3.0,
            OutlierMethod::Iqr => 1.5,
            OutlierMethod::Percentile => 95.0,
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierMethod::Zscore => write!(f, "zscore"),
            OutlierMethod::Iqr => write!(f, "iqr"),
            OutlierMethod::Percentile => write!(f, "percentile"),
        }
    }
}

/// Parameters for [`OutlierDetectionValidator`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutlierParams {
    /// Bound method
    #[serde(default)]
    pub method: OutlierMethod,
    /// Method threshold; the method default when absent
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Warns about unusual amounts.
#[derive(Debug, Clone)]
pub struct OutlierDetectionValidator {
    method: OutlierMethod,
    threshold: f64,
}

impl OutlierDetectionValidator {
    /// Registry name.
    pub const NAME: &'static str = "outlier_detection";

    /// Create a validator.
    pub fn new(
        method: OutlierMethod,
        threshold: Option<f64>,
    ) -> Result<Self, ValidatorConfigurationError> {
        let threshold = threshold.unwrap_or_else(|| method.default_threshold());
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ValidatorConfigurationError::invalid_parameters(
                Self::NAME,
                format!("threshold must be a positive number, got {}", threshold),
            ));
        }
        if method == OutlierMethod::Percentile && threshold > 100.0 {
            return Err(ValidatorConfigurationError::invalid_parameters(
                Self::NAME,
                format!("percentile threshold must be <= 100, got {}", threshold),
            ));
        }
        Ok(Self { method, threshold })
    }

    /// Create a validator from deserialized parameters.
    pub fn from_params(params: OutlierParams) -> Result<Self, ValidatorConfigurationError> {
        Self::new(params.method, params.threshold)
    }

    /// Bound method.
    pub fn method(&self) -> OutlierMethod {
        self.method
    }

    /// Effective threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Per-value method flags plus the statistics that produced them.
    fn bound_flags(&self, values: &[f64]) -> (Vec<bool>, IndexMap<String, JsonValue>) {
        let mut stats = IndexMap::new();
        let flags = match self.method {
            OutlierMethod::Zscore => {
                let (mean, std) = mean_std(values);
                stats.insert("mean".to_string(), mean.into());
                stats.insert("std".to_string(), std.into());
                values
                    .iter()
                    .map(|x| std > 0.0 && ((x - mean) / std).abs() > self.threshold)
                    .collect()
            }
            OutlierMethod::Iqr => {
                let sorted = sorted(values);
                let q1 = quantile(&sorted, 0.25);
                let q3 = quantile(&sorted, 0.75);
                let iqr = q3 - q1;
                let lower = q1 - self.threshold * iqr;
                let upper = q3 + self.threshold * iqr;
                stats.insert("q1".to_string(), q1.into());
                stats.insert("q3".to_string(), q3.into());
                stats.insert("iqr".to_string(), iqr.into());
                stats.insert("lower_bound".to_string(), lower.into());
                stats.insert("upper_bound".to_string(), upper.into());
                values
                    .iter()
                    .map(|&x| iqr > 0.0 && (x < lower || x > upper))
                    .collect()
            }
            OutlierMethod::Percentile => {
                let sorted = sorted(values);
                let tail = (100.0 - self.threshold) / 2.0;
                let lower = quantile(&sorted, tail / 100.0);
                let upper = quantile(&sorted, 1.0 - tail / 100.0);
                stats.insert("lower_percentile".to_string(), tail.into());
                stats.insert("upper_percentile".to_string(), (100.0 - tail).into());
                stats.insert("lower_bound".to_string(), lower.into());
                stats.insert("upper_bound".to_string(), upper.into());
                values.iter().map(|&x| x < lower || x > upper).collect()
            }
        };
        (flags, stats)
    }
}

// ============================================================================
// Statistics
// ============================================================================

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Linear-interpolated quantile of sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Running count, mean and sum of squared deviations (Welford).
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    count: f64,
    mean: f64,
    m2: f64,
}

impl Moments {
    fn push(self, x: f64) -> Self {
        let count = self.count + 1.0;
        let delta = x - self.mean;
        let mean = self.mean + delta / count;
        Self {
            count,
            mean,
            m2: self.m2 + delta * (x - mean),
        }
    }

    /// Combine two disjoint samples (Chan et al.).
    fn merge(self, other: Self) -> Self {
        if self.count == 0.0 {
            return other;
        }
        if other.count == 0.0 {
            return self;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        Self {
            count,
            mean: self.mean + delta * other.count / count,
            m2: self.m2 + other.m2 + delta * delta * self.count * other.count / count,
        }
    }

    fn variance(&self) -> f64 {
        if self.count < 2.0 {
            0.0
        } else {
            self.m2 / (self.count - 1.0)
        }
    }
}

/// Flags values that sit far outside the distribution of the other values.
///
/// The moments of "everything but `i`" merge a prefix and a suffix that never
/// contain value `i`, so a huge value cannot cancel out the spread of the
/// rest. Needs at least three values.
fn extreme_flags(amounts: &[Decimal], values: &[f64]) -> Vec<bool> {
    let n = values.len();
    if n < 3 {
        return vec![false; n];
    }

    let mut counts: HashMap<Decimal, usize> = HashMap::new();
    for amount in amounts {
        *counts.entry(*amount).or_default() += 1;
    }

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(Moments::default());
    for &x in values {
        let last = prefix[prefix.len() - 1];
        prefix.push(Moments::push(last, x));
    }
    let mut suffix = vec![Moments::default(); n + 1];
    for i in (0..n).rev() {
        suffix[i] = suffix[i + 1].push(values[i]);
    }

    values
        .iter()
        .zip(amounts)
        .enumerate()
        .map(|(i, (&x, amount))| {
            let others_constant = match counts.len() {
                1 => true,
                2 => counts.get(amount) == Some(&1),
                _ => false,
            };
            if others_constant {
                return counts.len() == 2;
            }

            let others = prefix[i].merge(suffix[i + 1]);
            let var_other = others.variance();
            var_other > 0.0 && (x - others.mean).abs() >= EXTREME_DEVIATIONS * var_other.sqrt()
        })
        .collect()
}

impl Validator for OutlierDetectionValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
        let amount_idx = require_column(ir, Self::NAME, fields::AMOUNT)?;

        let samples: Vec<(usize, Decimal, f64)> = ir
            .rows()
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let amount = row[amount_idx].as_decimal()?;
                Some((i, amount, amount.to_f64()?))
            })
            .collect();

        let base = ValidationResult::pass(Self::NAME)
            .with_metadata("method", self.method.to_string())
            .with_metadata("threshold", self.threshold)
            .with_metadata("total_rows", ir.len());

        if samples.len() < 2 {
            return Ok(base
                .with_metadata("outlier_count", 0)
                .with_metadata("outlier_indices", Vec::<usize>::new())
                .with_metadata("extreme_indices", Vec::<usize>::new()));
        }

        let amounts: Vec<Decimal> = samples.iter().map(|s| s.1).collect();
        let values: Vec<f64> = samples.iter().map(|s| s.2).collect();
        let (bound, stats) = self.bound_flags(&values);
        let extreme = extreme_flags(&amounts, &values);
        let (mean, std) = mean_std(&values);

        let mut warnings = Vec::new();
        let mut outlier_indices = Vec::new();
        let mut extreme_indices = Vec::new();

        for (k, (row_index, amount, value)) in samples.iter().enumerate() {
            if extreme[k] {
                extreme_indices.push(*row_index);
            }
            if !(bound[k] || extreme[k]) {
                continue;
            }
            outlier_indices.push(*row_index);
            warnings.push(if self.method == OutlierMethod::Zscore && std > 0.0 {
                format!(
                    "Row {}: amount={} (z-score={:.2})",
                    row_index,
                    amount,
                    ((value - mean) / std).abs()
                )
            } else {
                format!("Row {}: amount={}", row_index, amount)
            });
        }

        log::debug!(
            "{} ({}): {} outliers, {} extreme",
            Self::NAME,
            self.method,
            outlier_indices.len(),
            extreme_indices.len()
        );

        let mut result = base.with_warnings(warnings);
        for (key, value) in stats {
            result = result.with_metadata(key, value);
        }
        Ok(result
            .with_metadata("outlier_count", outlier_indices.len())
            .with_metadata("outlier_indices", outlier_indices)
            .with_metadata("extreme_indices", extreme_indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, table};
    use serde_json::json;

    fn amounts_table(amounts: &[&str]) -> IrTable {
        table(
            amounts
                .iter()
                .map(|a| record("2024-01-01", "1001", a, "USD"))
                .collect(),
        )
    }

    fn indices(result: &ValidationResult, key: &str) -> Vec<usize> {
        serde_json::from_value(result.metadata_value(key).unwrap().clone()).unwrap()
    }

    #[test]
    fn test_quantile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&data, 0.0), 1.0);
        assert_eq!(quantile(&data, 1.0), 4.0);
        assert!((quantile(&data, 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_fifteen_sigma_flagged_by_every_method() {
        // Sample std of the first ten is 1.1547; the last sits 15 of those away.
        let ir = amounts_table(&[
            "100", "101", "99", "100", "102", "98", "100", "101", "99", "100", "117.33",
        ]);
        for method in [OutlierMethod::Zscore, OutlierMethod::Iqr, OutlierMethod::Percentile] {
            let validator = OutlierDetectionValidator::new(method, None).unwrap();
            let result = validator.validate(&ir).unwrap();
            assert!(result.is_valid());
            assert!(indices(&result, "outlier_indices").contains(&10), "{}", method);
            assert_eq!(indices(&result, "extreme_indices"), vec![10], "{}", method);
        }
    }

    #[test]
    fn test_huge_value_next_to_small_spread() {
        let strict = [
            (OutlierMethod::Zscore, 100.0),
            (OutlierMethod::Iqr, 1e20),
            (OutlierMethod::Percentile, 100.0),
        ];
        for huge in ["1000000000", "10000000000", "1000000000000", "10000000000000", "1000000000000000"] {
            let ir = amounts_table(&["0", "1", "0", "1", "0", huge]);

            let default = OutlierDetectionValidator::new(OutlierMethod::Zscore, None).unwrap();
            assert_eq!(indices(&default.validate(&ir).unwrap(), "outlier_indices"), vec![5], "{}", huge);

            for (method, threshold) in strict {
                let validator = OutlierDetectionValidator::new(method, Some(threshold)).unwrap();
                let result = validator.validate(&ir).unwrap();
                assert_eq!(indices(&result, "extreme_indices"), vec![5], "{} {}", method, huge);
                assert_eq!(indices(&result, "outlier_indices"), vec![5], "{} {}", method, huge);
            }
        }
    }

    #[test]
    fn test_leave_one_out_moments() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let all = values.iter().fold(Moments::default(), |m, &x| m.push(x));
        assert!((all.mean - 5.0).abs() < 1e-12);
        assert!((all.variance() - 32.0 / 7.0).abs() < 1e-12);

        let (left, right) = values.split_at(3);
        let merged = left
            .iter()
            .fold(Moments::default(), |m, &x| m.push(x))
            .merge(right.iter().fold(Moments::default(), |m, &x| m.push(x)));
        assert!((merged.mean - all.mean).abs() < 1e-12);
        assert!((merged.variance() - all.variance()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_with_one_deviation() {
        let ir = amounts_table(&["5", "5", "5", "5", "6"]);
        for method in [OutlierMethod::Zscore, OutlierMethod::Iqr, OutlierMethod::Percentile] {
            let validator = OutlierDetectionValidator::new(method, None).unwrap();
            let result = validator.validate(&ir).unwrap();
            assert_eq!(indices(&result, "extreme_indices"), vec![4]);
            assert!(result.warnings().iter().any(|w| w.starts_with("Row 4: amount=6")));
        }
    }

    #[test]
    fn test_iqr_fence_without_extreme() {
        let ir = amounts_table(&["1", "2", "3", "4", "5", "6", "7", "8", "9", "30"]);

        let iqr = OutlierDetectionValidator::new(OutlierMethod::Iqr, None).unwrap();
        let result = iqr.validate(&ir).unwrap();
        assert_eq!(indices(&result, "outlier_indices"), vec![9]);
        assert!(indices(&result, "extreme_indices").is_empty());
        assert_eq!(result.metadata_value("q1"), Some(&json!(3.25)));

        let zscore = OutlierDetectionValidator::new(OutlierMethod::Zscore, None).unwrap();
        assert!(indices(&zscore.validate(&ir).unwrap(), "outlier_indices").is_empty());
    }

    #[test]
    fn test_too_few_values() {
        let ir = amounts_table(&["1000000"]);
        let validator = OutlierDetectionValidator::new(OutlierMethod::Zscore, None).unwrap();
        let result = validator.validate(&ir).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings().is_empty());
        assert_eq!(result.metadata_value("outlier_count"), Some(&json!(0)));
    }

    #[test]
    fn test_identical_values_have_no_outliers() {
        let ir = amounts_table(&["7", "7", "7", "7"]);
        let validator = OutlierDetectionValidator::new(OutlierMethod::Percentile, None).unwrap();
        assert!(validator.validate(&ir).unwrap().warnings().is_empty());
    }

    #[test]
    fn test_configuration() {
        assert!(OutlierDetectionValidator::new(OutlierMethod::Zscore, Some(0.0)).is_err());
        assert!(OutlierDetectionValidator::new(OutlierMethod::Zscore, Some(f64::NAN)).is_err());
        assert!(OutlierDetectionValidator::new(OutlierMethod::Percentile, Some(150.0)).is_err());
        let v = OutlierDetectionValidator::new(OutlierMethod::Iqr, None).unwrap();
        assert_eq!(v.threshold(), 1.5);

        let params: OutlierParams = serde_json::from_value(json!({"method": "percentile"})).unwrap();
        assert_eq!(params.method, OutlierMethod::Percentile);
        assert!(serde_json::from_value::<OutlierParams>(json!({"method": "mad"})).is_err());
    }
}

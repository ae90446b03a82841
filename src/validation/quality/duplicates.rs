//! Duplicate transaction detection.

use crate::core::error::{ValidatorConfigurationError, ValidatorExecutionError};
use crate::core::table::IrTable;
use crate::core::types::Value;
use crate::validation::result::ValidationResult;
use crate::validation::validator::{format_indices, require_columns, Validator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Default similarity for fuzzy matching.
pub const DEFAULT_SIMILARITY: f64 = 0.85;

fn default_similarity() -> f64 {
    DEFAULT_SIMILARITY
}

/// How rows are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMode {
    /// Field values must be equal
    #[default]
    Exact,
    /// Field values must be similar
    Fuzzy,
}

impl fmt::Display for DuplicateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateMode::Exact => write!(f, "exact"),
            DuplicateMode::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// Parameters for [`DuplicateDetectionValidator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuplicateParams {
    /// Fields that identify a transaction
    pub fields: Vec<String>,
    /// Comparison mode
    #[serde(default)]
    pub mode: DuplicateMode,
    /// Minimum similarity in fuzzy mode
    #[serde(default = "default_similarity")]
    pub similarity: f64,
}

/// Warns about rows that repeat an earlier row on the chosen fields.
///
/// The first occurrence is never flagged. In fuzzy mode a row repeats an
/// earlier one when every field is at least `similarity` alike, using
/// normalized Levenshtein similarity over trimmed, lower-cased text.
#[derive(Debug, Clone)]
pub struct DuplicateDetectionValidator {
    fields: Vec<String>,
    mode: DuplicateMode,
    similarity: f64,
}

impl DuplicateDetectionValidator {
    /// Registry name.
    pub const NAME: &'static str = "duplicate_detection";

    /// Create a validator over the given fields.
    pub fn new(
        fields: Vec<String>,
        mode: DuplicateMode,
    ) -> Result<Self, ValidatorConfigurationError> {
        if fields.is_empty() {
            return Err(ValidatorConfigurationError::invalid_parameters(
                Self::NAME,
                "fields must contain at least one field",
            ));
        }
        Ok(Self {
            fields,
            mode,
            similarity: DEFAULT_SIMILARITY,
        })
    }

    /// Set the fuzzy similarity threshold, in (0, 1].
    pub fn with_similarity(mut self, similarity: f64) -> Result<Self, ValidatorConfigurationError> {
        if !(similarity > 0.0 && similarity <= 1.0) {
            return Err(ValidatorConfigurationError::invalid_parameters(
                Self::NAME,
                format!("similarity must be in (0, 1], got {}", similarity),
            ));
        }
        self.similarity = similarity;
        Ok(self)
    }

    /// Create a validator from deserialized parameters.
    pub fn from_params(params: DuplicateParams) -> Result<Self, ValidatorConfigurationError> {
        Self::new(params.fields, params.mode)?.with_similarity(params.similarity)
    }

    /// Comparison mode.
    pub fn mode(&self) -> DuplicateMode {
        self.mode
    }

    fn exact_duplicates(&self, ir: &IrTable, idx: &[usize]) -> Vec<usize> {
        let mut seen: HashSet<Vec<&Value>> = HashSet::with_capacity(ir.len());
        ir.rows()
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let key: Vec<&Value> = idx.iter().map(|&c| &row[c]).collect();
                (!seen.insert(key)).then_some(i)
            })
            .collect()
    }

    fn fuzzy_duplicates(&self, ir: &IrTable, idx: &[usize]) -> Vec<usize> {
        let cells: Vec<Vec<(&Value, Option<Vec<char>>)>> = ir
            .rows()
            .iter()
            .map(|row| idx.iter().map(|&c| (&row[c], normalize(&row[c]))).collect())
            .collect();

        (0..cells.len())
            .filter(|&i| {
                (0..i).any(|j| {
                    cells[i]
                        .iter()
                        .zip(cells[j].iter())
                        .all(|(a, b)| field_similarity(a, b) >= self.similarity)
                })
            })
            .collect()
    }
}

/// Cells that compare equal are identical whatever their rendering.
fn field_similarity(a: &(&Value, Option<Vec<char>>), b: &(&Value, Option<Vec<char>>)) -> f64 {
    if a.0 == b.0 {
        return 1.0;
    }
    similarity(a.1.as_deref(), b.1.as_deref())
}

fn normalize(value: &Value) -> Option<Vec<char>> {
    let rendered = match value {
        Value::Decimal(d) => Some(d.normalize().to_string()),
        other => other.render(),
    };
    rendered.map(|s| s.trim().to_lowercase().chars().collect())
}

/// Normalized Levenshtein similarity. Two nulls are identical; a null
/// never resembles a value.
fn similarity(a: Option<&[char]>, b: Option<&[char]>) -> f64 {
    match (a, b) {
        (None, None) => 1.0,
        (None, _) | (_, None) => 0.0,
        (Some(a), Some(b)) => {
            let longest = a.len().max(b.len());
            if longest == 0 {
                return 1.0;
            }
            1.0 - levenshtein(a, b) as f64 / longest as f64
        }
    }
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let (m, n) = (a.len(), b.len());
    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

impl Validator for DuplicateDetectionValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
        let idx = require_columns(ir, Self::NAME, &self.fields)?;

        let duplicates = match self.mode {
            DuplicateMode::Exact => self.exact_duplicates(ir, &idx),
            DuplicateMode::Fuzzy => self.fuzzy_duplicates(ir, &idx),
        };

        let mut result = ValidationResult::pass(Self::NAME);
        if !duplicates.is_empty() {
            result = result.with_warning(format!(
                "Found {} duplicate transactions based on fields: {} (rows: {})",
                duplicates.len(),
                self.fields.join(", "),
                format_indices(&duplicates)
            ));
        }

        Ok(result
            .with_metadata("duplicate_count", duplicates.len())
            .with_metadata("duplicate_indices", duplicates)
            .with_metadata("fields_checked", self.fields.clone())
            .with_metadata("mode", self.mode.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, table};
    use proptest::prelude::*;
    use serde_json::json;

    fn fields() -> Vec<String> {
        vec!["date".into(), "account".into(), "reference".into()]
    }

    fn indices(result: &ValidationResult) -> Vec<usize> {
        serde_json::from_value(result.metadata_value("duplicate_indices").unwrap().clone())
            .unwrap()
    }

    #[test]
    fn test_levenshtein() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
        assert_eq!(levenshtein(&chars("same"), &chars("same")), 0);
    }

    #[test]
    fn test_similarity_nulls() {
        assert_eq!(similarity(None, None), 1.0);
        assert_eq!(similarity(None, Some(&['a'])), 0.0);
    }

    #[test]
    fn test_exact_skips_first_occurrence() {
        let ir = table(vec![
            record("2024-01-01", "1001", "10", "USD").with_reference("R1"),
            record("2024-01-02", "1001", "10", "USD").with_reference("R2"),
            record("2024-01-01", "1001", "99", "USD").with_reference("R1"),
            record("2024-01-01", "1001", "10", "USD").with_reference("R1"),
        ]);
        let validator = DuplicateDetectionValidator::new(fields(), DuplicateMode::Exact).unwrap();
        let result = validator.validate(&ir).unwrap();

        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 1);
        assert_eq!(indices(&result), vec![2, 3]);
        assert_eq!(result.metadata_value("duplicate_count"), Some(&json!(2)));
        assert_eq!(result.metadata_value("mode"), Some(&json!("exact")));
    }

    #[test]
    fn test_fuzzy_matches_near_references() {
        let ir = table(vec![
            record("2024-01-01", "1001", "10", "USD").with_reference("INV-2024-0001"),
            record("2024-01-01", "1001", "10", "USD").with_reference("inv-2024-0001 "),
            record("2024-01-01", "1001", "10", "USD").with_reference("INV-2024-0091"),
            record("2024-01-01", "1001", "10", "USD").with_reference("PAYMENT"),
        ]);
        let exact = DuplicateDetectionValidator::new(fields(), DuplicateMode::Exact).unwrap();
        assert!(indices(&exact.validate(&ir).unwrap()).is_empty());

        let fuzzy = DuplicateDetectionValidator::new(fields(), DuplicateMode::Fuzzy).unwrap();
        assert_eq!(indices(&fuzzy.validate(&ir).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_fuzzy_ignores_decimal_scale() {
        let ir = table(vec![
            record("2024-01-01", "1001", "1.0", "USD"),
            record("2024-01-01", "1001", "1.00", "USD"),
            record("2024-01-01", "1001", "1.5", "USD"),
        ]);
        let fields: Vec<String> = vec!["date".into(), "account".into(), "amount".into()];

        let exact = DuplicateDetectionValidator::new(fields.clone(), DuplicateMode::Exact).unwrap();
        assert_eq!(indices(&exact.validate(&ir).unwrap()), vec![1]);

        let fuzzy = DuplicateDetectionValidator::new(fields, DuplicateMode::Fuzzy).unwrap();
        assert_eq!(indices(&fuzzy.validate(&ir).unwrap()), vec![1]);
    }

    #[test]
    fn test_null_references() {
        let ir = table(vec![
            record("2024-01-01", "1001", "10", "USD"),
            record("2024-01-01", "1001", "10", "USD"),
            record("2024-01-01", "1001", "10", "USD").with_reference("R"),
        ]);
        let fuzzy = DuplicateDetectionValidator::new(fields(), DuplicateMode::Fuzzy).unwrap();
        assert_eq!(indices(&fuzzy.validate(&ir).unwrap()), vec![1]);
    }

    #[test]
    fn test_summary_shows_first_ten() {
        let records = (0..12).map(|_| record("2024-01-01", "1001", "10", "USD"));
        let ir = table(records.collect());
        let validator = DuplicateDetectionValidator::new(fields(), DuplicateMode::Exact).unwrap();
        let result = validator.validate(&ir).unwrap();
        assert!(result.warnings()[0].contains("Found 11 duplicate transactions"));
        assert!(result.warnings()[0].ends_with("10, ...])"));
        assert_eq!(indices(&result).len(), 11);
    }

    #[test]
    fn test_configuration() {
        assert!(DuplicateDetectionValidator::new(Vec::new(), DuplicateMode::Exact).is_err());
        let v = DuplicateDetectionValidator::new(fields(), DuplicateMode::Fuzzy).unwrap();
        assert!(v.clone().with_similarity(0.0).is_err());
        assert!(v.clone().with_similarity(1.5).is_err());
        assert!(v.with_similarity(1.0).is_ok());
    }

    fn arb_records() -> impl Strategy<Value = Vec<crate::core::types::Record>> {
        prop::collection::vec(
            (
                1u32..4,
                prop::sample::select(vec!["1001", "1002", "4001"]),
                prop::sample::select(vec!["10", "10.0", "10.00", "1.0", "1.00", "100"]),
                prop::option::of("[A-C]{1,3}"),
            ),
            0..16,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .map(|(day, account, amount, reference)| {
                    let r = record(&format!("2024-01-0{}", day), account, amount, "USD");
                    match reference {
                        Some(reference) => r.with_reference(reference),
                        None => r,
                    }
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_fuzzy_is_superset_of_exact(records in arb_records()) {
            let ir = table(records);
            let mut fields = fields();
            fields.push("amount".into());
            let exact = DuplicateDetectionValidator::new(fields.clone(), DuplicateMode::Exact).unwrap();
            let fuzzy = DuplicateDetectionValidator::new(fields, DuplicateMode::Fuzzy).unwrap();

            let exact_set: HashSet<usize> = indices(&exact.validate(&ir).unwrap()).into_iter().collect();
            let fuzzy_set: HashSet<usize> = indices(&fuzzy.validate(&ir).unwrap()).into_iter().collect();
            prop_assert!(exact_set.is_subset(&fuzzy_set));
        }
    }
}

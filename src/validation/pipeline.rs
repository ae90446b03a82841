//! Validation pipeline implementation.

use crate::core::error::ValidatorExecutionError;
use crate::core::table::IrTable;
use crate::validation::report::ValidationReport;
use crate::validation::result::ValidationResult;
use crate::validation::validator::Validator;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Failure policy of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Stop after the first invalid result
    FailFast,
    /// Run every validator
    #[default]
    Continue,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::FailFast => write!(f, "fail_fast"),
            ValidationMode::Continue => write!(f, "continue"),
        }
    }
}

/// Ordered set of validators run under one failure policy.
///
/// Results always appear in the order the validators were supplied. In
/// [`ValidationMode::Continue`] the validators may run on the rayon pool;
/// fail-fast runs are always sequential.
pub struct ValidationPipeline {
    validators: Vec<Box<dyn Validator>>,
    mode: ValidationMode,
    parallel: bool,
}

impl ValidationPipeline {
    /// Create a new pipeline with the given validators.
    pub fn new(validators: Vec<Box<dyn Validator>>, mode: ValidationMode) -> Self {
        Self {
            validators,
            mode,
            parallel: false,
        }
    }

    /// A pipeline without validators. Always produces a valid report.
    pub fn empty() -> Self {
        Self::new(Vec::new(), ValidationMode::Continue)
    }

    /// Enable/disable parallel execution in continue mode.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Append a validator.
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Append a boxed validator.
    pub fn add_validator(&mut self, validator: Box<dyn Validator>) {
        self.validators.push(validator);
    }

    /// Failure policy.
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Whether continue-mode runs use the thread pool.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Check whether the pipeline has no validators.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Validator names in order.
    pub fn validator_names(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Run the validators against a table.
    ///
    /// Returns the first execution error in supplied order, if any.
    pub fn run(&self, ir: &IrTable) -> Result<ValidationReport, ValidatorExecutionError> {
        let start = Instant::now();

        let results = match (self.mode, self.parallel) {
            (ValidationMode::FailFast, _) => self.run_fail_fast(ir)?,
            (ValidationMode::Continue, false) => self
                .validators
                .iter()
                .map(|v| run_one(v.as_ref(), ir))
                .collect::<Result<Vec<_>, _>>()?,
            (ValidationMode::Continue, true) => {
                // Collect everything first so the reported error is the first
                // one in supplied order, not the first one to finish.
                let outcomes: Vec<Result<ValidationResult, ValidatorExecutionError>> = self
                    .validators
                    .par_iter()
                    .map(|v| run_one(v.as_ref(), ir))
                    .collect();
                outcomes.into_iter().collect::<Result<Vec<_>, _>>()?
            }
        };

        let report = ValidationReport::new(results);
        log::debug!(
            "{} ({} mode, {:?})",
            report.summary(),
            self.mode,
            start.elapsed()
        );
        Ok(report)
    }

    fn run_fail_fast(&self, ir: &IrTable) -> Result<Vec<ValidationResult>, ValidatorExecutionError> {
        let mut results = Vec::with_capacity(self.validators.len());
        for validator in &self.validators {
            let result = run_one(validator.as_ref(), ir)?;
            let failed = !result.is_valid();
            results.push(result);
            if failed {
                log::debug!("fail-fast stop after '{}'", validator.name());
                break;
            }
        }
        Ok(results)
    }
}

fn run_one(validator: &dyn Validator, ir: &IrTable) -> Result<ValidationResult, ValidatorExecutionError> {
    let start = Instant::now();
    let result = validator.validate(ir);
    match &result {
        Ok(r) => log::debug!(
            "validator '{}' finished in {:?}: {} errors, {} warnings",
            validator.name(),
            start.elapsed(),
            r.errors().len(),
            r.warnings().len()
        ),
        Err(e) => log::debug!("validator '{}' malfunctioned: {}", validator.name(), e),
    }
    result
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("validators", &self.validator_names())
            .field("mode", &self.mode)
            .field("parallel", &self.parallel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, sample_table, table};
    use crate::validation::business::{CurrencyConsistencyValidator, PositiveAmountsValidator};
    use crate::validation::quality::{
        DuplicateDetectionValidator, DuplicateMode, MissingValueValidator,
        OutlierDetectionValidator, OutlierMethod,
    };
    use crate::validation::validator::FnValidator;
    use proptest::prelude::*;

    fn failing(name: &'static str) -> Box<dyn Validator> {
        Box::new(FnValidator::new(name, move |_ir: &IrTable| {
            Ok(ValidationResult::pass(name).with_error("nope"))
        }))
    }

    fn broken(name: &'static str) -> Box<dyn Validator> {
        Box::new(FnValidator::new(name, move |_ir: &IrTable| {
            Err(ValidatorExecutionError::new(name, "boom"))
        }))
    }

    fn standard_validators() -> Vec<Box<dyn Validator>> {
        vec![
            Box::new(PositiveAmountsValidator::new(&["^4"]).unwrap()),
            Box::new(CurrencyConsistencyValidator::default()),
            Box::new(
                DuplicateDetectionValidator::new(
                    vec!["date".into(), "account".into(), "amount".into()],
                    DuplicateMode::Exact,
                )
                .unwrap(),
            ),
            Box::new(MissingValueValidator::new(vec!["description".into()]).unwrap()),
            Box::new(OutlierDetectionValidator::new(OutlierMethod::Iqr, None).unwrap()),
        ]
    }

    #[test]
    fn test_empty_pipeline_is_valid() {
        let report = ValidationPipeline::empty().run(&sample_table()).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.total(), 0);
        assert_eq!(report.passed(), 0);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.warnings_count(), 0);
    }

    #[test]
    fn test_fail_fast_truncates() {
        let validators = || vec![failing("a"), failing("b"), failing("c")];

        let fail_fast = ValidationPipeline::new(validators(), ValidationMode::FailFast);
        let report = fail_fast.run(&sample_table()).unwrap();
        assert_eq!(report.total(), 1);
        assert_eq!(report.results()[0].validator_name(), "a");

        let cont = ValidationPipeline::new(validators(), ValidationMode::Continue);
        assert_eq!(cont.run(&sample_table()).unwrap().total(), 3);
    }

    #[test]
    fn test_results_follow_supplied_order() {
        let pipeline = ValidationPipeline::new(standard_validators(), ValidationMode::Continue)
            .with_parallel(true);
        let report = pipeline.run(&sample_table()).unwrap();
        let names: Vec<&str> = report.results().iter().map(|r| r.validator_name()).collect();
        assert_eq!(names, pipeline.validator_names());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let ir = sample_table();
        let sequential = ValidationPipeline::new(standard_validators(), ValidationMode::Continue)
            .run(&ir)
            .unwrap();
        let parallel = ValidationPipeline::new(standard_validators(), ValidationMode::Continue)
            .with_parallel(true)
            .run(&ir)
            .unwrap();
        assert_eq!(sequential.results(), parallel.results());
    }

    #[test]
    fn test_first_error_in_supplied_order() {
        let pipeline = ValidationPipeline::new(
            vec![failing("ok"), broken("first"), broken("second")],
            ValidationMode::Continue,
        )
        .with_parallel(true);
        let err = pipeline.run(&sample_table()).unwrap_err();
        assert_eq!(err.validator, "first");
    }

    #[test]
    fn test_validators_leave_input_untouched() {
        let ir = sample_table();
        let before = ir.fingerprint();
        ValidationPipeline::new(standard_validators(), ValidationMode::Continue)
            .run(&ir)
            .unwrap();
        assert_eq!(ir.fingerprint(), before);
        assert!(ir.metadata().is_empty());
    }

    #[test]
    fn test_order_does_not_change_findings() {
        let ir = table(vec![
            record("2024-01-01", "4001", "-5", "USD"),
            record("2024-01-02", "4001", "5", "EUR"),
        ]);
        let forward = ValidationPipeline::new(standard_validators(), ValidationMode::Continue)
            .run(&ir)
            .unwrap();
        let mut reversed_validators = standard_validators();
        reversed_validators.reverse();
        let reversed = ValidationPipeline::new(reversed_validators, ValidationMode::Continue)
            .run(&ir)
            .unwrap();

        let mut a: Vec<_> = forward.results().to_vec();
        let mut b: Vec<_> = reversed.results().to_vec();
        a.sort_by(|x, y| x.validator_name().cmp(y.validator_name()));
        b.sort_by(|x, y| x.validator_name().cmp(y.validator_name()));
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_runs_are_deterministic(amounts in prop::collection::vec(-1000i64..1000, 0..20)) {
            let ir = table(
                amounts
                    .iter()
                    .enumerate()
                    .map(|(i, a)| {
                        let account = if i % 2 == 0 { "4001" } else { "1001" };
                        record("2024-01-01", account, &a.to_string(), "USD")
                    })
                    .collect(),
            );
            let pipeline = ValidationPipeline::new(standard_validators(), ValidationMode::Continue);
            let first = pipeline.run(&ir).unwrap();
            let second = pipeline.run(&ir).unwrap();
            prop_assert_eq!(first.results(), second.results());
        }
    }
}

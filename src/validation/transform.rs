//! Validation as a transform stage.

use crate::core::error::{FintranError, ValidationError};
use crate::core::table::{IrTable, ValidationHistoryEntry};
use crate::pipeline::stage::Transform;
use crate::validation::pipeline::ValidationPipeline;
use crate::validation::report::ValidationReport;

/// Metadata key used when none is configured.
pub const DEFAULT_METADATA_KEY: &str = "validation_report";

/// Stage label recorded in history when none is configured.
pub const DEFAULT_STAGE: &str = "validating_transform";

/// Runs a validation pipeline as a transform.
///
/// Rows pass through unchanged. The report is appended to the table's
/// validation history under the metadata key, or returned as a
/// [`ValidationError`] when `fail_on_error` is set and the report is invalid.
#[derive(Debug)]
pub struct ValidatingTransform {
    pipeline: ValidationPipeline,
    fail_on_error: bool,
    metadata_key: String,
    stage: String,
}

impl ValidatingTransform {
    /// Wrap a pipeline. Reports are recorded but never fatal.
    pub fn new(pipeline: ValidationPipeline) -> Self {
        Self {
            pipeline,
            fail_on_error: false,
            metadata_key: DEFAULT_METADATA_KEY.to_string(),
            stage: DEFAULT_STAGE.to_string(),
        }
    }

    /// Make invalid reports fatal.
    pub fn with_fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    /// Record history under a different key.
    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_key = key.into();
        self
    }

    /// Record history under a different stage label.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    /// The wrapped pipeline.
    pub fn pipeline(&self) -> &ValidationPipeline {
        &self.pipeline
    }

    /// Metadata key reports are recorded under.
    pub fn metadata_key(&self) -> &str {
        &self.metadata_key
    }
}

impl Transform for ValidatingTransform {
    fn name(&self) -> &str {
        "validate"
    }

    fn transform(&self, ir: &IrTable) -> Result<IrTable, FintranError> {
        let report = self.pipeline.run(ir)?;

        if self.fail_on_error && !report.is_valid() {
            log::warn!("{}: {}", self.stage, report.summary());
            return Err(ValidationError::new(
                format!("Validation failed: {}", report.summary()),
                report,
            )
            .into());
        }

        Ok(attach_validation_report(
            ir,
            &self.metadata_key,
            &self.stage,
            report,
        ))
    }
}

/// New table instance with a report appended to the history under `key`.
pub fn attach_validation_report(
    ir: &IrTable,
    key: &str,
    stage: &str,
    report: ValidationReport,
) -> IrTable {
    let entry = ValidationHistoryEntry::new(stage, report);
    ir.with_metadata(ir.metadata().appended(key, entry))
}

/// Validation history under `key`, oldest first.
pub fn validation_history<'a>(ir: &'a IrTable, key: &str) -> &'a [ValidationHistoryEntry] {
    ir.metadata().history(key)
}

/// The most recent report under `key`.
pub fn latest_report<'a>(ir: &'a IrTable, key: &str) -> Option<&'a ValidationReport> {
    validation_history(ir, key).last().map(|entry| &entry.report)
}

//! Validation of IR tables.
//!
//! Validators inspect a table and report findings as a [`ValidationResult`].
//! A [`ValidationPipeline`] runs an ordered set of them under a failure
//! policy and aggregates the outcome into a [`ValidationReport`].
//! Pipelines are built in code, through the [`ValidatorRegistry`], or from a
//! declarative [`PipelineConfig`], and can run inside the transform service as
//! a [`ValidatingTransform`].

pub mod business;
pub mod declarative;
pub mod pipeline;
pub mod quality;
pub mod registry;
pub mod report;
pub mod result;
pub mod transform;
pub mod validator;

pub use declarative::{load_pipeline, PipelineConfig, ValidatorSpec};
pub use pipeline::{ValidationMode, ValidationPipeline};
pub use registry::{parse_params, ValidatorCategory, ValidatorRegistry};
pub use report::{ReportFormatError, SeverityFilter, ValidationReport};
pub use result::ValidationResult;
pub use transform::{
    attach_validation_report, latest_report, validation_history, ValidatingTransform,
};
pub use validator::{FnValidator, Severity, Validator, WithSeverity};

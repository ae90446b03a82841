//! Error types for fintran.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Separate structural and configuration faults from data-quality findings
//! - Name the component that failed and what it was doing
//! - Keep the original error reachable through `source()` after wrapping

use crate::config::ConfigError;
use crate::core::types::FieldType;
use crate::pipeline::progress::PipelineStage;
use crate::validation::report::ValidationReport;
use thiserror::Error;

/// Boxed error used as an optional cause.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for fintran.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum FintranError {
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),

    #[error(transparent)]
    ValidatorConfiguration(#[from] ValidatorConfigurationError),

    #[error(transparent)]
    ValidatorExecution(#[from] ValidatorExecutionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Structural violations of the canonical IR schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaValidationError {
    #[error("missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("unexpected fields: {}", fields.join(", "))]
    UnexpectedFields { fields: Vec<String> },

    #[error("duplicate field '{field}'")]
    DuplicateField { field: String },

    #[error("field '{field}' has type {actual}, expected {expected}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: FieldType,
    },

    #[error("required field '{field}' is null at row {row}")]
    NullInRequiredField { field: String, row: usize },

    #[error("row {row}: field '{field}' holds a {actual} value, expected {expected}")]
    CellTypeMismatch {
        field: String,
        row: usize,
        expected: FieldType,
        actual: String,
    },

    #[error("row {row} has {actual} cells, expected {expected}")]
    RowArity {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// A validator or pipeline could not be built from its configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorConfigurationError {
    #[error("unknown validator '{name}' (available: {})", available.join(", "))]
    UnknownValidator { name: String, available: Vec<String> },

    #[error("invalid parameters for '{validator}': {reason}")]
    InvalidParameters { validator: String, reason: String },

    #[error("invalid validation configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("validator #{index} ('{validator}'): {source}")]
    InvalidSpec {
        index: usize,
        validator: String,
        #[source]
        source: Box<ValidatorConfigurationError>,
    },
}

impl ValidatorConfigurationError {
    /// Shorthand for [`ValidatorConfigurationError::InvalidParameters`].
    pub fn invalid_parameters(validator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            validator: validator.into(),
            reason: reason.into(),
        }
    }
}

/// A validator malfunctioned (as opposed to finding bad data).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validator '{validator}' failed: {message}")]
pub struct ValidatorExecutionError {
    /// Validator name
    pub validator: String,
    /// What went wrong
    pub message: String,
}

impl ValidatorExecutionError {
    /// Create an execution error.
    pub fn new(validator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            message: message.into(),
        }
    }
}

/// Validation found errors and the caller asked for that to be fatal.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ValidationError {
    /// Human-readable summary
    pub message: String,
    /// The full report
    pub report: Box<ValidationReport>,
}

impl ValidationError {
    /// Create a validation error from a report.
    pub fn new(message: impl Into<String>, report: ValidationReport) -> Self {
        Self {
            message: message.into(),
            report: Box::new(report),
        }
    }
}

macro_rules! component_error {
    ($(#[$meta:meta])* $name:ident, $field:ident) => {
        $(#[$meta])*
        #[derive(Error, Debug)]
        #[error("{message}")]
        pub struct $name {
            /// Name of the failing component
            pub $field: String,
            /// What went wrong
            pub message: String,
            /// Underlying cause
            #[source]
            pub source: Option<BoxedSource>,
        }

        impl $name {
            /// Create an error without an underlying cause.
            pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
                Self {
                    $field: component.into(),
                    message: message.into(),
                    source: None,
                }
            }

            /// Attach an underlying cause.
            pub fn with_source(
                mut self,
                source: impl std::error::Error + Send + Sync + 'static,
            ) -> Self {
                self.source = Some(Box::new(source));
                self
            }
        }
    };
}

component_error!(
    /// A reader could not produce IR.
    ReaderError,
    reader
);
component_error!(
    /// A writer could not persist IR.
    WriterError,
    writer
);
component_error!(
    /// A transform could not produce IR.
    TransformError,
    transform
);

/// A failure inside the transform service, tagged with the stage it hit.
#[derive(Error, Debug)]
#[error("pipeline failed at {stage}: {kind}: {source}")]
pub struct PipelineError {
    /// Stage that failed
    pub stage: PipelineStage,
    /// Kind of the original error
    pub kind: &'static str,
    /// The original error
    #[source]
    pub source: Box<FintranError>,
}

impl PipelineError {
    /// Wrap an error with the stage it happened in.
    pub fn new(stage: PipelineStage, error: impl Into<FintranError>) -> Self {
        let error = error.into();
        Self {
            stage,
            kind: error.kind(),
            source: Box::new(error),
        }
    }

    /// The wrapped error.
    pub fn inner(&self) -> &FintranError {
        &self.source
    }
}

// ============================================================================
// Error Utilities
// ============================================================================

impl FintranError {
    /// Name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            FintranError::Schema(_) => "SchemaValidationError",
            FintranError::ValidatorConfiguration(_) => "ValidatorConfigurationError",
            FintranError::ValidatorExecution(_) => "ValidatorExecutionError",
            FintranError::Validation(_) => "ValidationError",
            FintranError::Reader(_) => "ReaderError",
            FintranError::Writer(_) => "WriterError",
            FintranError::Transform(_) => "TransformError",
            FintranError::Pipeline(_) => "PipelineError",
            FintranError::Config(_) => "ConfigError",
            FintranError::Io(_) => "IoError",
            FintranError::Serialization(_) => "SerializationError",
            FintranError::Other(_) => "Error",
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            FintranError::Schema(_)
            | FintranError::Validation(_)
            | FintranError::ValidatorExecution(_) => 2,
            FintranError::Reader(_) => 3,
            FintranError::Writer(_) => 4,
            FintranError::Transform(_) => 5,
            FintranError::Config(_) | FintranError::ValidatorConfiguration(_) => 6,
            FintranError::Pipeline(e) => e.source.exit_code(),
            FintranError::Io(_) | FintranError::Serialization(_) | FintranError::Other(_) => 1,
        }
    }

    /// The error with any pipeline wrapping removed.
    pub fn root(&self) -> &FintranError {
        match self {
            FintranError::Pipeline(e) => e.source.root(),
            other => other,
        }
    }

    /// The report carried by a validation failure, if any.
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self.root() {
            FintranError::Validation(e) => Some(&e.report),
            _ => None,
        }
    }
}

/// Result type alias for fintran operations.
pub type FintranResult<T> = Result<T, FintranError>;

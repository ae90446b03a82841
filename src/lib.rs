//! # Fintran - Financial record conversion
//!
//! Fintran converts financial records between formats through a canonical
//! intermediate representation (IR). Readers parse sources into IR,
//! transforms derive new IR, validators check business and data-quality rules,
//! and writers persist the result.
//!
//! ## Features
//!
//! - **Immutable IR**: tables share rows through `Arc`; every change yields a new instance
//! - **Composable validation**: independent validators aggregated into one report
//! - **Fail-fast or continue**: per-pipeline failure policy, optional parallel execution
//! - **Declarative configuration**: pipelines described in TOML or JSON
//! - **Validation history**: reports travel with the table and survive the JSON format
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fintran::prelude::*;
//! use std::path::Path;
//!
//! let registry = ValidatorRegistry::with_builtins();
//! let validation = PipelineConfig::from_toml_str(r#"
//!     [[validators]]
//!     type = "positive_amounts"
//!     params = { account_patterns = ["^4"] }
//! "#)?.build(&registry)?;
//!
//! let summary = TransformService::new(Box::new(CsvReader), Box::new(JsonWriter))
//!     .with_transform(NormalizeCurrency)
//!     .with_transform(ValidatingTransform::new(validation).with_fail_on_error(true))
//!     .run(Path::new("ledger.csv"), Path::new("ledger.json"))?;
//!
//! println!("wrote {} rows", summary.rows_written);
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: IR table, value types, schema and errors
//! - [`validation`]: validators, pipeline, report, registry, declarative config
//! - [`pipeline`]: the transform service and its stage traits
//! - [`io`]: JSON, CSV and in-memory formats, transforms
//! - [`config`]: application configuration
//!
//! ## Writing Validators
//!
//! Implement [`Validator`](validation::Validator) or wrap a closure:
//!
//! ```rust,ignore
//! use fintran::prelude::*;
//!
//! let non_empty = FnValidator::new("non_empty", |ir: &IrTable| {
//!     let result = ValidationResult::pass("non_empty");
//!     Ok(if ir.is_empty() { result.with_error("table is empty") } else { result })
//! });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod io;
pub mod pipeline;
pub mod validation;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use fintran::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::schema::{standard_columns, validate_ir};
    pub use crate::core::table::{IrMetadata, IrTable, TableId, ValidationHistoryEntry};
    pub use crate::core::types::{ColumnDef, FieldType, Record, Row, Value};

    // Errors
    pub use crate::core::error::{
        FintranError, FintranResult, PipelineError, ReaderError, SchemaValidationError,
        TransformError, ValidationError, ValidatorConfigurationError, ValidatorExecutionError,
        WriterError,
    };

    // Validation
    pub use crate::validation::business::{
        CurrencyConsistencyValidator, DateRangeValidator, PositiveAmountsValidator,
    };
    pub use crate::validation::quality::{
        DuplicateDetectionValidator, DuplicateMode, MissingValueValidator,
        OutlierDetectionValidator, OutlierMethod,
    };
    pub use crate::validation::{
        FnValidator, PipelineConfig, Severity, SeverityFilter, ValidatingTransform,
        ValidationMode, ValidationPipeline, ValidationReport, ValidationResult, Validator,
        ValidatorRegistry, WithSeverity,
    };

    // Orchestration
    pub use crate::pipeline::{
        PipelineStage, ProgressUpdate, Reader, RunSummary, StageOptions, Transform,
        TransformService, Writer,
    };

    // Formats
    pub use crate::io::{
        CsvReader, CsvWriter, FormatRegistry, JsonReader, JsonWriter, MemoryReader, MemorySink,
        MemoryStore, NormalizeCurrency, TransformRegistry,
    };

    // Configuration
    pub use crate::config::{AppConfig, ConfigError};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");


#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::test_support::sample_table;
    use std::path::Path;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "fintran");
    }

    #[test]
    fn test_end_to_end_json() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.csv");
        JsonWriter
            .write(&sample_table(), &input, &StageOptions::new())
            .unwrap();

        let registry = ValidatorRegistry::with_builtins();
        let validation = PipelineConfig::from_toml_str(
            r#"
            [[validators]]
            type = "detect_duplicates"
            params = { fields = ["date", "account", "reference"] }
            "#,
        )
        .unwrap()
        .build(&registry)
        .unwrap();

        let summary = TransformService::new(Box::new(JsonReader), Box::new(CsvWriter))
            .with_transform(NormalizeCurrency)
            .with_transform(ValidatingTransform::new(validation).with_fail_on_error(true))
            .run(&input, &output)
            .unwrap();

        assert_eq!(summary.rows_written, 6);
        let back = CsvReader.read(&output, &StageOptions::new()).unwrap();
        assert!(back.content_eq(&sample_table()));
        assert!(Path::new(&output).exists());
    }
}

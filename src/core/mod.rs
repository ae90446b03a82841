//! Core types of the fintran intermediate representation.
//!
//! This module contains the foundational pieces every stage shares:
//! - Value types (Date, Text, Decimal cells and typed records)
//! - The immutable IR table and its metadata
//! - The canonical schema and its structural check
//! - Error types

pub mod types;
pub mod table;
pub mod schema;
pub mod error;

// Re-export commonly used types
pub use types::{ColumnDef, FieldType, Record, Row, Value};
pub use table::{IrMetadata, IrTable, TableId, ValidationHistoryEntry};
pub use schema::{standard_columns, validate_ir};
pub use error::{
    FintranError, FintranResult, PipelineError, ReaderError, SchemaValidationError,
    TransformError, ValidationError, ValidatorConfigurationError, ValidatorExecutionError,
    WriterError,
};

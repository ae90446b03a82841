//! Capabilities plugged into the transform service.

use crate::core::error::{FintranError, ReaderError, WriterError};
use crate::core::schema::validate_ir;
use crate::core::table::IrTable;
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;

/// Free-form `key = value` options handed to readers and writers.
pub type StageOptions = IndexMap<String, String>;

/// Produces IR from a source.
pub trait Reader: Send + Sync {
    /// Name of this reader.
    fn name(&self) -> &str;

    /// Read the source at `input`.
    fn read(&self, input: &Path, options: &StageOptions) -> Result<IrTable, ReaderError>;
}

/// Persists IR to a destination.
///
/// Implementations check the table against the base schema before
/// serializing anything (see [`check_writer_input`]).
pub trait Writer: Send + Sync {
    /// Name of this writer.
    fn name(&self) -> &str;

    /// Write `ir` to `output`.
    fn write(&self, ir: &IrTable, output: &Path, options: &StageOptions)
        -> Result<(), WriterError>;
}

/// Maps IR to new IR.
///
/// A transform must return a new table instance, never its input.
pub trait Transform: Send + Sync {
    /// Name of this transform.
    fn name(&self) -> &str;

    /// Produce the transformed table.
    fn transform(&self, ir: &IrTable) -> Result<IrTable, FintranError>;
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transform(&self, ir: &IrTable) -> Result<IrTable, FintranError> {
        (**self).transform(ir)
    }
}

impl<T: Transform + ?Sized> Transform for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transform(&self, ir: &IrTable) -> Result<IrTable, FintranError> {
        (**self).transform(ir)
    }
}

/// Structural check every writer runs before serializing.
pub fn check_writer_input(writer: &str, ir: &IrTable) -> Result<(), WriterError> {
    validate_ir(ir).map_err(|e| {
        WriterError::new(writer, format!("refusing to write invalid IR: {}", e)).with_source(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ColumnDef, FieldType, Value};
    use crate::test_support::sample_table;

    #[test]
    fn test_writer_input_check() {
        assert!(check_writer_input("json", &sample_table()).is_ok());

        let columns = vec![
            ColumnDef::new("date", FieldType::Date),
            ColumnDef::new("amount", FieldType::Decimal),
        ];
        let ir = IrTable::new(columns, vec![vec![Value::Null, Value::Null]]).unwrap();
        let err = check_writer_input("json", &ir).unwrap_err();
        assert!(err.to_string().contains("missing required fields"));
    }
}

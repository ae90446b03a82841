//! The `fintran-ir` JSON document.
//!
//! This is the persisted format that keeps validation history:
//!
//! ```json
//! {
//!   "format": "fintran-ir",
//!   "version": "1.0.0",
//!   "columns": [{"name": "date", "type": "date"}, ...],
//!   "rows": [["2024-01-15", "1001", "250.00", "USD", null, "INV-001"]],
//!   "metadata": {"validation_report": [{"stage": ..., "timestamp": ..., "report": ...}]}
//! }
//! ```
//!
//! Dates are `YYYY-MM-DD` strings, decimals are strings (so scale is kept),
//! and nulls are `null`.

use crate::core::error::{ReaderError, WriterError};
use crate::core::table::{IrMetadata, IrTable};
use crate::core::types::{ColumnDef, FieldType, Value};
use crate::pipeline::stage::{check_writer_input, Reader, StageOptions, Writer};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

/// Name of the JSON reader and writer.
pub const NAME: &str = "json";

/// Value of the document's `format` field.
pub const FORMAT_NAME: &str = "fintran-ir";

/// Serializable representation of an IR table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrDocument {
    /// Always [`FORMAT_NAME`]
    pub format: String,
    /// Document format version
    pub version: Version,
    /// Column definitions
    pub columns: Vec<ColumnDef>,
    /// Row cells, ordered like `columns`
    pub rows: Vec<Vec<JsonValue>>,
    /// Validation history
    #[serde(default)]
    pub metadata: IrMetadata,
}

impl IrDocument {
    /// Current format version.
    pub const VERSION: Version = Version::new(1, 0, 0);

    /// Build a document from a table.
    pub fn from_table(ir: &IrTable) -> Self {
        Self {
            format: FORMAT_NAME.to_string(),
            version: Self::VERSION,
            columns: ir.columns().to_vec(),
            rows: ir
                .rows()
                .iter()
                .map(|row| row.iter().map(encode_cell).collect())
                .collect(),
            metadata: ir.metadata().clone(),
        }
    }

    /// Check whether a version can be read by this build.
    pub fn is_compatible(version: &Version) -> bool {
        version.major == Self::VERSION.major
    }

    /// Convert back into a table.
    pub fn into_table(self) -> Result<IrTable, String> {
        if self.format != FORMAT_NAME {
            return Err(format!(
                "unsupported document format '{}' (expected '{}')",
                self.format, FORMAT_NAME
            ));
        }
        if !Self::is_compatible(&self.version) {
            return Err(format!(
                "incompatible document version {} (this build reads {}.x)",
                self.version,
                Self::VERSION.major
            ));
        }

        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, cells)| {
                if cells.len() != self.columns.len() {
                    return Err(format!(
                        "row {} has {} cells, expected {}",
                        i,
                        cells.len(),
                        self.columns.len()
                    ));
                }
                cells
                    .iter()
                    .zip(self.columns.iter())
                    .map(|(cell, column)| {
                        decode_cell(cell, column.field_type)
                            .map_err(|e| format!("row {}, column '{}': {}", i, column.name, e))
                    })
                    .collect()
            })
            .collect::<Result<Vec<_>, String>>()?;

        let ir = IrTable::new(self.columns, rows).map_err(|e| e.to_string())?;
        Ok(ir.with_metadata(self.metadata))
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize to compact JSON (no whitespace).
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn encode_cell(value: &Value) -> JsonValue {
    value.render().map(JsonValue::String).unwrap_or(JsonValue::Null)
}

fn decode_cell(cell: &JsonValue, field_type: FieldType) -> Result<Value, String> {
    match (cell, field_type) {
        (JsonValue::Null, _) => Ok(Value::Null),
        (JsonValue::String(s), FieldType::Text) => Ok(Value::Text(s.clone())),
        (JsonValue::String(s), _) if s.is_empty() => Ok(Value::Null),
        (JsonValue::String(s), _) => Value::parse(s, field_type),
        (JsonValue::Number(n), FieldType::Decimal) => Value::parse(&n.to_string(), field_type),
        (other, _) => Err(format!("cannot read {} as {}", other, field_type)),
    }
}

// ============================================================================
// Reader and Writer
// ============================================================================

/// Reads `fintran-ir` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReader;

impl Reader for JsonReader {
    fn name(&self) -> &str {
        NAME
    }

    fn read(&self, input: &Path, _options: &StageOptions) -> Result<IrTable, ReaderError> {
        let text = std::fs::read_to_string(input).map_err(|e| {
            ReaderError::new(NAME, format!("cannot read {}: {}", input.display(), e)).with_source(e)
        })?;
        let document = IrDocument::from_json(&text).map_err(|e| {
            ReaderError::new(NAME, format!("malformed document {}: {}", input.display(), e))
                .with_source(e)
        })?;
        let ir = document
            .into_table()
            .map_err(|e| ReaderError::new(NAME, format!("{}: {}", input.display(), e)))?;
        log::debug!("read {} rows from {}", ir.len(), input.display());
        Ok(ir)
    }
}

/// Writes `fintran-ir` documents.
///
/// Option `pretty = true|false` (default `true`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWriter;

impl Writer for JsonWriter {
    fn name(&self) -> &str {
        NAME
    }

    fn write(
        &self,
        ir: &IrTable,
        output: &Path,
        options: &StageOptions,
    ) -> Result<(), WriterError> {
        check_writer_input(NAME, ir)?;

        let pretty = match options.get("pretty").map(String::as_str) {
            None | Some("true") => true,
            Some("false") => false,
            Some(other) => {
                return Err(WriterError::new(
                    NAME,
                    format!("option 'pretty' must be true or false, got '{}'", other),
                ))
            }
        };

        let document = IrDocument::from_table(ir);
        let text = if pretty {
            document.to_json()
        } else {
            document.to_json_compact()
        }
        .map_err(|e| WriterError::new(NAME, format!("cannot serialize IR: {}", e)).with_source(e))?;

        std::fs::write(output, text).map_err(|e| {
            WriterError::new(NAME, format!("cannot write {}: {}", output.display(), e))
                .with_source(e)
        })?;
        log::debug!("wrote {} rows to {}", ir.len(), output.display());
        Ok(())
    }
}

//! CSV reader and writer.
//!
//! The header row names the columns; each name's type comes from the
//! canonical schema (unknown names are read as text and left for the schema
//! check to reject). An empty cell is null. Metadata is not carried.

use crate::core::error::{ReaderError, WriterError};
use crate::core::schema::expected_type;
use crate::core::table::IrTable;
use crate::core::types::{ColumnDef, FieldType, Value};
use crate::pipeline::stage::{check_writer_input, Reader, StageOptions, Writer};
use std::path::Path;

/// Name of the CSV reader and writer.
pub const NAME: &str = "csv";

/// Read the `delimiter` option (default `,`; `tab` or `\t` for tabs).
pub fn delimiter(options: &StageOptions) -> Result<u8, String> {
    match options.get("delimiter").map(String::as_str) {
        None => Ok(b','),
        Some("tab") | Some("\\t") | Some("\t") => Ok(b'\t'),
        Some(d) if d.len() == 1 && d.is_ascii() => Ok(d.as_bytes()[0]),
        Some(d) => Err(format!(
            "delimiter must be a single ASCII character, got '{}'",
            d
        )),
    }
}

/// Reads CSV files with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReader;

impl Reader for CsvReader {
    fn name(&self) -> &str {
        NAME
    }

    fn read(&self, input: &Path, options: &StageOptions) -> Result<IrTable, ReaderError> {
        let delimiter = delimiter(options).map_err(|e| ReaderError::new(NAME, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_path(input)
            .map_err(|e| {
                ReaderError::new(NAME, format!("cannot open {}: {}", input.display(), e))
                    .with_source(e)
            })?;

        let columns: Vec<ColumnDef> = reader
            .headers()
            .map_err(|e| {
                ReaderError::new(NAME, format!("cannot read header of {}: {}", input.display(), e))
                    .with_source(e)
            })?
            .iter()
            .map(|name| {
                let name = name.trim();
                ColumnDef::new(name, expected_type(name).unwrap_or(FieldType::Text))
            })
            .collect();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                ReaderError::new(NAME, format!("{}: row {}: {}", input.display(), i, e))
                    .with_source(e)
            })?;
            let row = record
                .iter()
                .zip(columns.iter())
                .map(|(raw, column)| {
                    Value::parse(raw, column.field_type).map_err(|e| {
                        ReaderError::new(
                            NAME,
                            format!("{}: row {}, column '{}': {}", input.display(), i, column.name, e),
                        )
                    })
                })
                .collect::<Result<Vec<Value>, _>>()?;
            rows.push(row);
        }

        let ir = IrTable::new(columns, rows)
            .map_err(|e| ReaderError::new(NAME, e.to_string()).with_source(e))?;
        log::debug!("read {} rows from {}", ir.len(), input.display());
        Ok(ir)
    }
}

/// Writes CSV files with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvWriter;

impl Writer for CsvWriter {
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
        let delimiter = delimiter(options).map_err(|e| WriterError::new(NAME, e))?;

        let wrap = |e: csv::Error| {
            WriterError::new(NAME, format!("cannot write {}: {}", output.display(), e))
                .with_source(e)
        };
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(output)
            .map_err(wrap)?;

        writer.write_record(ir.column_names()).map_err(wrap)?;
        for row in ir.rows() {
            writer
                .write_record(row.iter().map(|v| v.render().unwrap_or_default()))
                .map_err(wrap)?;
        }
        writer.flush().map_err(|e| {
            WriterError::new(NAME, format!("cannot write {}: {}", output.display(), e))
                .with_source(e)
        })?;
        log::debug!("wrote {} rows to {}", ir.len(), output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::validate_ir;
    use crate::test_support::sample_table;

    #[test]
    fn test_roundtrip_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        let ir = sample_table();

        CsvWriter.write(&ir, &path, &StageOptions::new()).unwrap();
        let back = CsvReader.read(&path, &StageOptions::new()).unwrap();
        assert!(back.content_eq(&ir));
        assert!(back.metadata().is_empty());
    }

    #[test]
    fn test_semicolon_delimiter_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(
            &path,
            "date;account;amount;currency;description\n2024-01-05;1001;12.50;EUR;\n",
        )
        .unwrap();

        let mut options = StageOptions::new();
        options.insert("delimiter".to_string(), ";".to_string());
        let ir = CsvReader.read(&path, &options).unwrap();
        assert!(validate_ir(&ir).is_ok());
        assert_eq!(ir.rows()[0][4], Value::Null);
        assert_eq!(ir.records().unwrap()[0].currency, "EUR");
    }

    #[test]
    fn test_bad_cells_name_row_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "date,account,amount,currency\n2024-01-05,1001,lots,EUR\n").unwrap();

        let err = CsvReader.read(&path, &StageOptions::new()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("row 0"));
        assert!(text.contains("'amount'"));
    }

    #[test]
    fn test_unknown_columns_left_to_schema_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.csv");
        std::fs::write(&path, "date,account,amount,currency,memo\n2024-01-05,1001,1,EUR,x\n")
            .unwrap();

        let ir = CsvReader.read(&path, &StageOptions::new()).unwrap();
        assert!(validate_ir(&ir).unwrap_err().to_string().contains("memo"));
    }

    #[test]
    fn test_delimiter_option() {
        let mut options = StageOptions::new();
        assert_eq!(delimiter(&options).unwrap(), b',');
        options.insert("delimiter".to_string(), "tab".to_string());
        assert_eq!(delimiter(&options).unwrap(), b'\t');
        options.insert("delimiter".to_string(), "::".to_string());
        assert!(delimiter(&options).is_err());
    }
}

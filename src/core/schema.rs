//! Canonical IR schema and the base structural check.
//!
//! Every reader output and every writer input must pass [`validate_ir`].

use crate::core::error::SchemaValidationError;
use crate::core::table::IrTable;
use crate::core::types::{ColumnDef, FieldType};
use std::collections::HashSet;

/// Canonical field names.
pub mod fields {
    /// Transaction date
    pub const DATE: &str = "date";
    /// Account identifier
    pub const ACCOUNT: &str = "account";
    /// Transaction amount
    pub const AMOUNT: &str = "amount";
    /// Currency code
    pub const CURRENCY: &str = "currency";
    /// Free-text description
    pub const DESCRIPTION: &str = "description";
    /// Reference number
    pub const REFERENCE: &str = "reference";
}

/// Fields every IR table must carry, with their types.
pub const REQUIRED_FIELDS: [(&str, FieldType); 4] = [
    (fields::DATE, FieldType::Date),
    (fields::ACCOUNT, FieldType::Text),
    (fields::AMOUNT, FieldType::Decimal),
    (fields::CURRENCY, FieldType::Text),
];

/// Fields an IR table may carry, with their types.
pub const OPTIONAL_FIELDS: [(&str, FieldType); 2] = [
    (fields::DESCRIPTION, FieldType::Text),
    (fields::REFERENCE, FieldType::Text),
];

/// The full six-column schema in canonical order.
pub fn standard_columns() -> Vec<ColumnDef> {
    REQUIRED_FIELDS
        .iter()
        .chain(OPTIONAL_FIELDS.iter())
        .map(|(name, ty)| ColumnDef::new(*name, *ty))
        .collect()
}

/// Expected type of a known field, or `None` for names outside the schema.
pub fn expected_type(name: &str) -> Option<FieldType> {
    REQUIRED_FIELDS
        .iter()
        .chain(OPTIONAL_FIELDS.iter())
        .find(|(field, _)| *field == name)
        .map(|(_, ty)| *ty)
}

/// Check whether a field is required.
pub fn is_required(name: &str) -> bool {
    REQUIRED_FIELDS.iter().any(|(field, _)| *field == name)
}

/// Check a table against the canonical schema.
///
/// Checks run in order: missing required fields, unexpected fields,
/// duplicate columns, column types, nulls in required fields, then cell types.
pub fn validate_ir(ir: &IrTable) -> Result<(), SchemaValidationError> {
    validate_columns(ir.columns())?;

    for (row_index, row) in ir.rows().iter().enumerate() {
        for (column, value) in ir.columns().iter().zip(row.iter()) {
            match value.field_type() {
                None if is_required(&column.name) => {
                    return Err(SchemaValidationError::NullInRequiredField {
                        field: column.name.clone(),
                        row: row_index,
                    });
                }
                Some(actual) if actual != column.field_type => {
                    return Err(SchemaValidationError::CellTypeMismatch {
                        field: column.name.clone(),
                        row: row_index,
                        expected: column.field_type,
                        actual: value.type_name().to_string(),
                    });
                }
                _ => {}
            }
        }
    }

    Ok(())
}

/// Check the column set alone.
pub fn validate_columns(columns: &[ColumnDef]) -> Result<(), SchemaValidationError> {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|(field, _)| !names.contains(field))
        .map(|(field, _)| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SchemaValidationError::MissingFields { fields: missing });
    }

    let unexpected: Vec<String> = names
        .iter()
        .filter(|name| expected_type(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !unexpected.is_empty() {
        return Err(SchemaValidationError::UnexpectedFields { fields: unexpected });
    }

    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(*name) {
            return Err(SchemaValidationError::DuplicateField {
                field: name.to_string(),
            });
        }
    }

    for column in columns {
        if let Some(expected) = expected_type(&column.name) {
            if expected != column.field_type {
                return Err(SchemaValidationError::TypeMismatch {
                    field: column.name.clone(),
                    expected,
                    actual: column.field_type,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Value;
    use crate::test_support::{record, sample_table};

    #[test]
    fn test_standard_columns() {
        let columns = standard_columns();
        assert_eq!(columns.len(), 6);
        assert_eq!(columns[0].name, fields::DATE);
        assert_eq!(columns[2].field_type, FieldType::Decimal);
    }

    #[test]
    fn test_valid_table_passes() {
        assert!(validate_ir(&sample_table()).is_ok());
        assert!(validate_ir(&IrTable::empty()).is_ok());
    }

    #[test]
    fn test_required_only_table_passes() {
        let columns: Vec<ColumnDef> = REQUIRED_FIELDS
            .iter()
            .map(|(n, t)| ColumnDef::new(*n, *t))
            .collect();
        let row: Vec<Value> = record("2024-01-01", "1001", "5", "USD")
            .into_row()
            .into_iter()
            .take(4)
            .collect();
        let ir = IrTable::new(columns, vec![row]).unwrap();
        assert!(validate_ir(&ir).is_ok());
    }

    #[test]
    fn test_missing_field() {
        let columns = vec![
            ColumnDef::new("date", FieldType::Date),
            ColumnDef::new("account", FieldType::Text),
            ColumnDef::new("currency", FieldType::Text),
        ];
        let err = validate_columns(&columns).unwrap_err();
        assert!(matches!(err, SchemaValidationError::MissingFields { ref fields } if fields == &["amount"]));
    }

    #[test]
    fn test_unexpected_field() {
        let mut columns = standard_columns();
        columns.push(ColumnDef::new("memo", FieldType::Text));
        let err = validate_columns(&columns).unwrap_err();
        assert!(err.to_string().contains("memo"));
    }

    #[test]
    fn test_duplicate_field() {
        let mut columns = standard_columns();
        columns.push(ColumnDef::new("reference", FieldType::Text));
        assert!(matches!(
            validate_columns(&columns),
            Err(SchemaValidationError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_column_type_mismatch() {
        let mut columns = standard_columns();
        columns[2] = ColumnDef::new("amount", FieldType::Text);
        assert!(matches!(
            validate_columns(&columns),
            Err(SchemaValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_null_in_required_field() {
        let mut row = record("2024-01-01", "1001", "5", "USD").into_row();
        row[1] = Value::Null;
        let ir = IrTable::new(standard_columns(), vec![row]).unwrap();
        let err = validate_ir(&ir).unwrap_err();
        assert_eq!(
            err,
            SchemaValidationError::NullInRequiredField {
                field: "account".to_string(),
                row: 0
            }
        );
    }

    #[test]
    fn test_cell_type_mismatch() {
        let mut row = record("2024-01-01", "1001", "5", "USD").into_row();
        row[2] = Value::from("five");
        let ir = IrTable::new(standard_columns(), vec![row]).unwrap();
        assert!(matches!(
            validate_ir(&ir),
            Err(SchemaValidationError::CellTypeMismatch { row: 0, .. })
        ));
    }
}

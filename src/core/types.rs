//! Core value types stored in the intermediate representation.
//!
//! The IR uses a closed, enum-based cell model:
//! - Every column has one [`FieldType`]
//! - Every cell is a [`Value`] whose variant matches the column type, or `Null`
//! - [`Record`] is the typed view of one row of the canonical schema

use crate::core::schema::fields;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format used whenever a date is rendered as text.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Semantic type of an IR column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Calendar date without time zone
    Date,
    /// UTF-8 text
    Text,
    /// Exact decimal number
    Decimal,
}

impl FieldType {
    /// Get the display name for this type.
    pub fn display_name(&self) -> &'static str {
        match self {
            FieldType::Date => "date",
            FieldType::Text => "text",
            FieldType::Decimal => "decimal",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A single cell of an IR table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Absence of a value
    Null,
    /// Calendar date
    Date(NaiveDate),
    /// Text
    Text(String),
    /// Exact decimal
    Decimal(Decimal),
}

impl Value {
    /// The field type this value belongs to, or `None` for `Null`.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Date(_) => Some(FieldType::Date),
            Value::Text(_) => Some(FieldType::Text),
            Value::Decimal(_) => Some(FieldType::Decimal),
        }
    }

    /// Check whether this is the `Null` value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or blank text.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Get the date, if this is a date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Get the text, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the decimal, if this is a decimal.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Name of the variant, used in type mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self.field_type() {
            Some(t) => t.display_name(),
            None => "null",
        }
    }

    /// Parse a text cell into a value of the given type.
    ///
    /// Empty input becomes `Null`.
    pub fn parse(raw: &str, field_type: FieldType) -> Result<Value, String> {
        if raw.is_empty() {
            return Ok(Value::Null);
        }
        match field_type {
            FieldType::Text => Ok(Value::Text(raw.to_string())),
            FieldType::Date => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| format!("invalid date '{}': {}", raw, e)),
            FieldType::Decimal => raw
                .trim()
                .parse::<Decimal>()
                .map(Value::Decimal)
                .map_err(|e| format!("invalid decimal '{}': {}", raw, e)),
        }
    }

    /// Render the value as plain text (`None` for `Null`).
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Decimal(d) => Some(d.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Decimal(d) => write!(f, "{}", d),
        }
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A row of IR cells, ordered like the table's columns.
pub type Row = Vec<Value>;

/// Definition of one IR column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Semantic type
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl ColumnDef {
    /// Create a column definition.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Typed view of one row of the canonical six-column schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    /// Transaction date
    pub date: NaiveDate,
    /// Account identifier
    pub account: String,
    /// Transaction amount
    pub amount: Decimal,
    /// Currency code
    pub currency: String,
    /// Optional free-text description
    pub description: Option<String>,
    /// Optional reference number
    pub reference: Option<String>,
}

impl Record {
    /// Create a record with the required fields set.
    pub fn new(
        date: NaiveDate,
        account: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            date,
            account: account.into(),
            amount,
            currency: currency.into(),
            description: None,
            reference: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the reference.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Convert into a row ordered like [`crate::core::schema::standard_columns`].
    pub fn into_row(self) -> Row {
        vec![
            Value::Date(self.date),
            Value::Text(self.account),
            Value::Decimal(self.amount),
            Value::Text(self.currency),
            self.description.into(),
            self.reference.into(),
        ]
    }

    /// Read a record from a row, resolving cells by column name.
    ///
    /// Returns the name of the first required field that is absent or has
    /// the wrong type.
    pub fn from_row(columns: &[ColumnDef], row: &[Value]) -> Result<Self, String> {
        let cell = |name: &str| -> Option<&Value> {
            columns
                .iter()
                .position(|c| c.name == name)
                .and_then(|i| row.get(i))
        };
        let text = |name: &str| -> Option<String> {
            cell(name).and_then(|v| v.as_text()).map(str::to_string)
        };

        Ok(Self {
            date: cell(fields::DATE)
                .and_then(Value::as_date)
                .ok_or_else(|| fields::DATE.to_string())?,
            account: text(fields::ACCOUNT).ok_or_else(|| fields::ACCOUNT.to_string())?,
            amount: cell(fields::AMOUNT)
                .and_then(Value::as_decimal)
                .ok_or_else(|| fields::AMOUNT.to_string())?,
            currency: text(fields::CURRENCY).ok_or_else(|| fields::CURRENCY.to_string())?,
            description: text(fields::DESCRIPTION),
            reference: text(fields::REFERENCE),
        })
    }
}

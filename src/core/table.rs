//! The immutable intermediate representation table.
//!
//! [`IrTable`] is cheap to clone: columns, rows and metadata live behind
//! `Arc`. Every constructor and every "modifying" method produces a table with
//! a fresh [`TableId`], while `clone()` keeps the id. Stages use the id to
//! tell a new instance from the one they were handed.

use crate::core::error::SchemaValidationError;
use crate::core::schema::standard_columns;
use crate::core::types::{ColumnDef, Record, Row, Value};
use crate::validation::report::ValidationReport;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier of one IR table instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(pub Uuid);

impl TableId {
    /// Create a new random table ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// One validation run recorded on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationHistoryEntry {
    /// Stage that produced the report
    pub stage: String,
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
    /// The report itself
    pub report: ValidationReport,
}

impl ValidationHistoryEntry {
    /// Create an entry stamped with the current time.
    pub fn new(stage: impl Into<String>, report: ValidationReport) -> Self {
        Self {
            stage: stage.into(),
            timestamp: Utc::now(),
            report,
        }
    }
}

/// Metadata carried alongside IR rows.
///
/// Maps a caller-chosen key to an ordered validation history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IrMetadata {
    validation: IndexMap<String, Vec<ValidationHistoryEntry>>,
}

impl IrMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// History recorded under a key, oldest first.
    pub fn history(&self, key: &str) -> &[ValidationHistoryEntry] {
        self.validation.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over all histories.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ValidationHistoryEntry])> {
        self.validation
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Check whether any history is recorded.
    pub fn is_empty(&self) -> bool {
        self.validation.is_empty()
    }

    /// Return a copy with an entry appended under `key`.
    pub fn appended(&self, key: &str, entry: ValidationHistoryEntry) -> Self {
        let mut next = self.clone();
        next.validation
            .entry(key.to_string())
            .or_default()
            .push(entry);
        next
    }
}

// ============================================================================
// Table
// ============================================================================

/// Immutable table of financial records.
#[derive(Debug, Clone)]
pub struct IrTable {
    id: TableId,
    columns: Arc<[ColumnDef]>,
    rows: Arc<[Row]>,
    metadata: Arc<IrMetadata>,
}

impl IrTable {
    /// Create a table, checking that every row matches the column count.
    ///
    /// Column names and cell types are not checked here; see
    /// [`crate::core::schema::validate_ir`].
    pub fn new(columns: Vec<ColumnDef>, rows: Vec<Row>) -> Result<Self, SchemaValidationError> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(SchemaValidationError::RowArity {
                row: index,
                expected: columns.len(),
                actual: row.len(),
            });
        }

        Ok(Self {
            id: TableId::new(),
            columns: columns.into(),
            rows: rows.into(),
            metadata: Arc::new(IrMetadata::new()),
        })
    }

    /// Create an empty table with the standard columns.
    pub fn empty() -> Self {
        Self {
            id: TableId::new(),
            columns: standard_columns().into(),
            rows: Vec::new().into(),
            metadata: Arc::new(IrMetadata::new()),
        }
    }

    /// Create a table with the standard columns from typed records.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let rows: Vec<Row> = records.into_iter().map(Record::into_row).collect();
        Self {
            id: TableId::new(),
            columns: standard_columns().into(),
            rows: rows.into(),
            metadata: Arc::new(IrMetadata::new()),
        }
    }

    /// Instance identifier.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Column definitions in order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Check whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Rows in order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Table metadata.
    pub fn metadata(&self) -> &IrMetadata {
        &self.metadata
    }

    /// Typed view of every row.
    pub fn records(&self) -> Result<Vec<Record>, SchemaValidationError> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                Record::from_row(&self.columns, row).map_err(|field| {
                    SchemaValidationError::NullInRequiredField { field, row: index }
                })
            })
            .collect()
    }

    // ========================================================================
    // New instances
    // ========================================================================

    /// New instance with the same rows and different metadata.
    pub fn with_metadata(&self, metadata: IrMetadata) -> Self {
        Self {
            id: TableId::new(),
            columns: Arc::clone(&self.columns),
            rows: Arc::clone(&self.rows),
            metadata: Arc::new(metadata),
        }
    }

    /// New instance with the same columns and metadata and different rows.
    pub fn with_rows(&self, rows: Vec<Row>) -> Result<Self, SchemaValidationError> {
        let table = Self::new(self.columns.to_vec(), rows)?;
        Ok(Self {
            metadata: Arc::clone(&self.metadata),
            ..table
        })
    }

    /// New instance with every cell of one column rewritten.
    ///
    /// Returns `None` when the column does not exist.
    pub fn map_column<F>(&self, name: &str, f: F) -> Option<Self>
    where
        F: Fn(&Value) -> Value,
    {
        let index = self.column_index(name)?;
        let rows: Vec<Row> = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row[index] = f(&row[index]);
                row
            })
            .collect();
        Some(Self {
            id: TableId::new(),
            columns: Arc::clone(&self.columns),
            rows: rows.into(),
            metadata: Arc::clone(&self.metadata),
        })
    }

    /// New instance with identical contents.
    pub fn fork(&self) -> Self {
        Self {
            id: TableId::new(),
            ..self.clone()
        }
    }

    // ========================================================================
    // Comparison
    // ========================================================================

    /// Check whether both handles refer to the same instance.
    pub fn is_same_instance(&self, other: &IrTable) -> bool {
        self.id == other.id
    }

    /// Check whether columns and rows are equal, ignoring identity and metadata.
    pub fn content_eq(&self, other: &IrTable) -> bool {
        self.columns == other.columns && self.rows == other.rows
    }

    /// Hash of columns and rows.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.columns.hash(&mut hasher);
        self.rows.hash(&mut hasher);
        hasher.finish()
    }
}

impl PartialEq for IrTable {
    fn eq(&self, other: &Self) -> bool {
        self.content_eq(other) && self.metadata == other.metadata
    }
}

//! In-memory table store used as a database-style sink.
//!
//! The store maps table names to IR tables. [`MemoryReader`] reads the table
//! named by the input path; [`MemorySink`] writes to the table named by the
//! output path using one of three write modes:
//!
//! - `replace` (default): the table is replaced
//! - `append`: rows are added after the existing rows
//! - `upsert`: rows whose `key` columns match an existing row replace it,
//!   the rest are appended

use crate::core::error::{ReaderError, WriterError};
use crate::core::table::IrTable;
use crate::core::types::Value;
use crate::pipeline::stage::{check_writer_input, Reader, StageOptions, Writer};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Name of the memory reader and writer.
pub const NAME: &str = "memory";

/// Shared, thread-safe map of named tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<IndexMap<String, IrTable>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a table by name.
    pub fn get(&self, name: &str) -> Option<IrTable> {
        self.tables.read().get(name).cloned()
    }

    /// Store a table, replacing any previous one.
    pub fn put(&self, name: impl Into<String>, ir: IrTable) {
        self.tables.write().insert(name.into(), ir);
    }

    /// Remove a table.
    pub fn remove(&self, name: &str) -> Option<IrTable> {
        self.tables.write().shift_remove(name)
    }

    /// Table names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Number of stored tables.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

fn table_name(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ============================================================================
// Reader
// ============================================================================

/// Reads tables from a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryReader {
    store: MemoryStore,
}

impl MemoryReader {
    /// Create a reader over a store.
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

impl Reader for MemoryReader {
    fn name(&self) -> &str {
        NAME
    }

    fn read(&self, input: &Path, _options: &StageOptions) -> Result<IrTable, ReaderError> {
        let name = table_name(input);
        self.store
            .get(&name)
            .map(|ir| ir.fork())
            .ok_or_else(|| ReaderError::new(NAME, format!("no table named '{}' in store", name)))
    }
}

// ============================================================================
// Sink
// ============================================================================

/// How a [`MemorySink`] combines incoming rows with an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Add rows after the existing ones
    Append,
    /// Replace the table
    #[default]
    Replace,
    /// Replace rows with matching keys, append the rest
    Upsert,
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(WriteMode::Append),
            "replace" => Ok(WriteMode::Replace),
            "upsert" => Ok(WriteMode::Upsert),
            other => Err(format!(
                "unknown write mode '{}' (expected append, replace or upsert)",
                other
            )),
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Append => write!(f, "append"),
            WriteMode::Replace => write!(f, "replace"),
            WriteMode::Upsert => write!(f, "upsert"),
        }
    }
}

/// Writes tables into a [`MemoryStore`].
///
/// Options: `mode = append|replace|upsert`, `key = col1,col2` (upsert only).
#[derive(Debug, Clone)]
pub struct MemorySink {
    store: MemoryStore,
}

impl MemorySink {
    /// Create a sink over a store.
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    fn merge(
        existing: &IrTable,
        incoming: &IrTable,
        mode: WriteMode,
        key: &[String],
    ) -> Result<IrTable, WriterError> {
        if mode == WriteMode::Replace {
            return Ok(incoming.fork());
        }
        if existing.columns() != incoming.columns() {
            return Err(WriterError::new(
                NAME,
                format!(
                    "cannot {} rows with columns [{}] into a table with columns [{}]",
                    mode,
                    incoming.column_names().join(", "),
                    existing.column_names().join(", ")
                ),
            ));
        }

        let mut rows = existing.rows().to_vec();
        match mode {
            WriteMode::Replace => {}
            WriteMode::Append => rows.extend(incoming.rows().iter().cloned()),
            WriteMode::Upsert => {
                let indices = key
                    .iter()
                    .map(|k| {
                        existing.column_index(k).ok_or_else(|| {
                            WriterError::new(NAME, format!("unknown key column '{}'", k))
                        })
                    })
                    .collect::<Result<Vec<usize>, _>>()?;
                let key_of =
                    |row: &[Value]| -> Vec<Value> { indices.iter().map(|&i| row[i].clone()).collect() };

                let mut positions: IndexMap<Vec<Value>, usize> = rows
                    .iter()
                    .enumerate()
                    .map(|(i, row)| (key_of(row), i))
                    .collect();
                for row in incoming.rows() {
                    match positions.get(&key_of(row)) {
                        Some(&i) => rows[i] = row.clone(),
                        None => {
                            positions.insert(key_of(row), rows.len());
                            rows.push(row.clone());
                        }
                    }
                }
            }
        }

        existing
            .with_rows(rows)
            .map(|ir| ir.with_metadata(incoming.metadata().clone()))
            .map_err(|e| WriterError::new(NAME, e.to_string()).with_source(e))
    }
}

impl Writer for MemorySink {
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

        let mode = match options.get("mode") {
            Some(mode) => mode
                .parse::<WriteMode>()
                .map_err(|e| WriterError::new(NAME, e))?,
            None => WriteMode::default(),
        };
        let key: Vec<String> = options
            .get("key")
            .map(|k| {
                k.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if mode == WriteMode::Upsert && key.is_empty() {
            return Err(WriterError::new(NAME, "upsert requires the 'key' option"));
        }

        let name = table_name(output);
        // Held across read, merge and store.
        let mut tables = self.store.tables.write();
        let merged = match tables.get(&name) {
            Some(existing) => Self::merge(existing, ir, mode, &key)?,
            None => ir.fork(),
        };
        log::debug!(
            "memory sink: {} {} rows into '{}' ({} total)",
            mode,
            ir.len(),
            name,
            merged.len()
        );
        tables.insert(name, merged);
        Ok(())
    }
}

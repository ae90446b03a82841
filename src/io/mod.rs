//! Readers, writers and transforms.
//!
//! Formats are thin glue around the IR: they lean on `serde_json` and `csv`
//! and hand off to the schema check for anything structural.

pub mod csv;
pub mod json;
pub mod memory;
pub mod transforms;

pub use self::csv::{CsvReader, CsvWriter};
pub use self::json::{IrDocument, JsonReader, JsonWriter};
pub use self::memory::{MemoryReader, MemorySink, MemoryStore, WriteMode};
pub use self::transforms::{NormalizeCurrency, TransformRegistry};

use crate::config::ConfigError;
use crate::pipeline::stage::{Reader, Writer};
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Factory function for creating readers.
pub type ReaderFactory = Arc<dyn Fn() -> Box<dyn Reader> + Send + Sync>;

/// Factory function for creating writers.
pub type WriterFactory = Arc<dyn Fn() -> Box<dyn Writer> + Send + Sync>;

/// Registry entry for one format.
#[derive(Clone)]
pub struct FormatEntry {
    /// Human-readable description
    pub description: String,
    /// File extensions (without dot) that select this format
    pub extensions: Vec<String>,
    reader: Option<ReaderFactory>,
    writer: Option<WriterFactory>,
}

impl FormatEntry {
    /// Create an entry with neither reader nor writer.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            extensions: Vec::new(),
            reader: None,
            writer: None,
        }
    }

    /// Add a file extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extensions.push(extension.into());
        self
    }

    /// Set the reader factory.
    pub fn with_reader<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Reader> + Send + Sync + 'static,
    {
        self.reader = Some(Arc::new(factory));
        self
    }

    /// Set the writer factory.
    pub fn with_writer<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Writer> + Send + Sync + 'static,
    {
        self.writer = Some(Arc::new(factory));
        self
    }

    /// Check whether the format can be read.
    pub fn can_read(&self) -> bool {
        self.reader.is_some()
    }

    /// Check whether the format can be written.
    pub fn can_write(&self) -> bool {
        self.writer.is_some()
    }
}

/// Registry of formats by name.
pub struct FormatRegistry {
    formats: IndexMap<String, FormatEntry>,
}

impl FormatRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            formats: IndexMap::new(),
        }
    }

    /// Create a registry with the file formats.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            json::NAME,
            FormatEntry::new("fintran-ir JSON document (keeps validation history)")
                .with_extension("json")
                .with_reader(|| Box::new(JsonReader))
                .with_writer(|| Box::new(JsonWriter)),
        );
        registry.register(
            self::csv::NAME,
            FormatEntry::new("CSV with a header row (option: delimiter)")
                .with_extension("csv")
                .with_reader(|| Box::new(CsvReader))
                .with_writer(|| Box::new(CsvWriter)),
        );
        registry
    }

    /// Register the in-memory format over a store.
    pub fn register_memory(&mut self, store: MemoryStore) {
        let reader_store = store.clone();
        self.register(
            memory::NAME,
            FormatEntry::new("In-memory tables (options: mode, key)")
                .with_reader(move || Box::new(MemoryReader::new(reader_store.clone())))
                .with_writer(move || Box::new(MemorySink::new(store.clone()))),
        );
    }

    /// Register a format, replacing any previous entry with the same name.
    pub fn register(&mut self, name: impl Into<String>, entry: FormatEntry) {
        self.formats.insert(name.into(), entry);
    }

    /// Create a reader by format name.
    pub fn create_reader(&self, name: &str) -> Result<Box<dyn Reader>, ConfigError> {
        self.formats
            .get(name)
            .and_then(|e| e.reader.as_ref())
            .map(|factory| factory())
            .ok_or_else(|| ConfigError::UnknownComponent {
                kind: "reader",
                name: name.to_string(),
                available: self.readers().map(str::to_string).collect(),
            })
    }

    /// Create a writer by format name.
    pub fn create_writer(&self, name: &str) -> Result<Box<dyn Writer>, ConfigError> {
        self.formats
            .get(name)
            .and_then(|e| e.writer.as_ref())
            .map(|factory| factory())
            .ok_or_else(|| ConfigError::UnknownComponent {
                kind: "writer",
                name: name.to_string(),
                available: self.writers().map(str::to_string).collect(),
            })
    }

    /// Format selected by a path's extension.
    pub fn infer(&self, path: &Path) -> Option<&str> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        self.formats
            .iter()
            .find(|(_, e)| e.extensions.iter().any(|x| *x == extension))
            .map(|(name, _)| name.as_str())
    }

    /// Format name from an explicit choice or the path's extension.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        path: &Path,
        kind: &'static str,
    ) -> Result<String, ConfigError> {
        match explicit {
            Some(name) => Ok(name.to_string()),
            None => self.infer(path).map(str::to_string).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "cannot infer {} from '{}'; pass it explicitly",
                    kind,
                    path.display()
                ))
            }),
        }
    }

    /// Check if a reader is registered.
    pub fn has_reader(&self, name: &str) -> bool {
        self.formats.get(name).map_or(false, FormatEntry::can_read)
    }

    /// Check if a writer is registered.
    pub fn has_writer(&self, name: &str) -> bool {
        self.formats.get(name).map_or(false, FormatEntry::can_write)
    }

    /// Names of formats that can be read.
    pub fn readers(&self) -> impl Iterator<Item = &str> {
        self.formats
            .iter()
            .filter(|(_, e)| e.can_read())
            .map(|(k, _)| k.as_str())
    }

    /// Names of formats that can be written.
    pub fn writers(&self) -> impl Iterator<Item = &str> {
        self.formats
            .iter()
            .filter(|(_, e)| e.can_write())
            .map(|(k, _)| k.as_str())
    }

    /// All formats.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &FormatEntry)> {
        self.formats.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.formats.keys().collect::<Vec<_>>())
            .finish()
    }
}

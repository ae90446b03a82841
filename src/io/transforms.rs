//! Built-in transforms and the transform registry.

use crate::config::ConfigError;
use crate::core::error::{FintranError, TransformError};
use crate::core::schema::fields;
use crate::core::table::IrTable;
use crate::core::types::Value;
use crate::pipeline::stage::Transform;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Trims and upper-cases currency codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeCurrency;

impl NormalizeCurrency {
    /// Registry name.
    pub const NAME: &'static str = "normalize_currency";
}

impl Transform for NormalizeCurrency {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn transform(&self, ir: &IrTable) -> Result<IrTable, FintranError> {
        ir.map_column(fields::CURRENCY, |value| match value {
            Value::Text(code) => Value::Text(code.trim().to_uppercase()),
            other => other.clone(),
        })
        .ok_or_else(|| {
            TransformError::new(Self::NAME, "table has no currency column").into()
        })
    }
}

/// Factory function type for creating transforms.
pub type TransformFactory = Arc<dyn Fn() -> Box<dyn Transform> + Send + Sync>;

struct TransformEntry {
    description: String,
    factory: TransformFactory,
}

/// Registry of transforms by name.
pub struct TransformRegistry {
    transforms: IndexMap<String, TransformEntry>,
}

impl TransformRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            transforms: IndexMap::new(),
        }
    }

    /// Create a registry with the built-in transforms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            NormalizeCurrency::NAME,
            "Trim and upper-case currency codes",
            || Box::new(NormalizeCurrency),
        );
        registry
    }

    /// Register a transform factory.
    pub fn register<F>(&mut self, name: impl Into<String>, description: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Transform> + Send + Sync + 'static,
    {
        self.transforms.insert(
            name.into(),
            TransformEntry {
                description: description.into(),
                factory: Arc::new(factory),
            },
        );
    }

    /// Create a transform by name.
    pub fn create(&self, name: &str) -> Result<Box<dyn Transform>, ConfigError> {
        self.transforms
            .get(name)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| ConfigError::UnknownComponent {
                kind: "transform",
                name: name.to_string(),
                available: self.names().map(str::to_string).collect(),
            })
    }

    /// Check if a transform is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(String::as_str)
    }

    /// Names with descriptions.
    pub fn list(&self) -> impl Iterator<Item = (&str, &str)> {
        self.transforms
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.description.as_str()))
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ColumnDef, FieldType};
    use crate::test_support::{record, table};

    #[test]
    fn test_normalize_currency() {
        let ir = table(vec![
            record("2024-01-01", "1001", "5", " usd"),
            record("2024-01-02", "1001", "5", "Eur "),
        ]);
        let out = NormalizeCurrency.transform(&ir).unwrap();

        assert!(!out.is_same_instance(&ir));
        let codes: Vec<String> = out.records().unwrap().into_iter().map(|r| r.currency).collect();
        assert_eq!(codes, ["USD", "EUR"]);
        assert_eq!(ir.records().unwrap()[0].currency, " usd");
    }

    #[test]
    fn test_normalize_currency_without_column() {
        let ir = IrTable::new(vec![ColumnDef::new("date", FieldType::Date)], Vec::new()).unwrap();
        let err = NormalizeCurrency.transform(&ir).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_registry() {
        let registry = TransformRegistry::with_builtins();
        assert!(registry.contains("normalize_currency"));
        assert_eq!(registry.create("normalize_currency").unwrap().name(), "normalize_currency");

        let err = registry.create("fx_convert").err().unwrap();
        assert!(err.to_string().contains("normalize_currency"));
    }
}

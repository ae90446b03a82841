//! Validator registry for building validators by name.

use crate::core::error::ValidatorConfigurationError;
use crate::validation::validator::Validator;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Factory function for creating validator instances from parameters.
pub type ValidatorFactory = Arc<
    dyn Fn(&JsonValue) -> Result<Box<dyn Validator>, ValidatorConfigurationError> + Send + Sync,
>;

/// Validator grouping for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorCategory {
    /// Accounting rules
    Business,
    /// Data-quality checks
    Quality,
    /// User-supplied validators
    Custom,
}

impl fmt::Display for ValidatorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorCategory::Business => write!(f, "business"),
            ValidatorCategory::Quality => write!(f, "quality"),
            ValidatorCategory::Custom => write!(f, "custom"),
        }
    }
}

/// Registry entry containing the factory and its description.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Factory function to create instances.
    pub factory: ValidatorFactory,
    /// One-line description for listings.
    pub description: String,
    /// Category for listings.
    pub category: ValidatorCategory,
}

/// Registry of validator factories, keyed by name.
///
/// Names are resolved at startup from declarative configuration; aliases map
/// alternative names onto a registered validator.
pub struct ValidatorRegistry {
    validators: IndexMap<String, RegistryEntry>,
    aliases: IndexMap<String, String>,
}

impl ValidatorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            validators: IndexMap::new(),
            aliases: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with built-in validators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::validation::business::register_all(&mut registry);
        crate::validation::quality::register_all(&mut registry);
        registry
    }

    /// Register a factory that receives raw JSON parameters.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        category: ValidatorCategory,
        description: impl Into<String>,
        factory: F,
    ) where
        F: Fn(&JsonValue) -> Result<Box<dyn Validator>, ValidatorConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.validators.insert(
            name.into(),
            RegistryEntry {
                factory: Arc::new(factory),
                description: description.into(),
                category,
            },
        );
    }

    /// Register a factory whose parameters deserialize into `P`.
    ///
    /// Missing or `null` parameters are treated as an empty table.
    pub fn register_typed<P, V, F>(
        &mut self,
        name: &str,
        category: ValidatorCategory,
        description: impl Into<String>,
        build: F,
    ) where
        P: DeserializeOwned,
        V: Validator + 'static,
        F: Fn(P) -> Result<V, ValidatorConfigurationError> + Send + Sync + 'static,
    {
        let validator_name = name.to_string();
        self.register(name, category, description, move |params| {
            let params: P = parse_params(&validator_name, params)?;
            Ok(Box::new(build(params)?) as Box<dyn Validator>)
        });
    }

    /// Add an alternative name for a registered validator.
    pub fn register_alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    /// Canonical name for a name or alias.
    pub fn resolve<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if let Some((key, _)) = self.validators.get_key_value(name) {
            return Some(key.as_str());
        }
        self.aliases
            .get(name)
            .filter(|target| self.validators.contains_key(target.as_str()))
            .map(String::as_str)
    }

    /// Create a validator by name or alias.
    pub fn create(
        &self,
        name: &str,
        params: &JsonValue,
    ) -> Result<Box<dyn Validator>, ValidatorConfigurationError> {
        let entry = self
            .resolve(name)
            .and_then(|canonical| self.validators.get(canonical))
            .ok_or_else(|| ValidatorConfigurationError::UnknownValidator {
                name: name.to_string(),
                available: self.available(),
            })?;
        (entry.factory)(params)
    }

    /// Check if a name or alias is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Registered canonical names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    /// Aliases and their targets.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, t)| (a.as_str(), t.as_str()))
    }

    /// Aliases pointing at one canonical name.
    pub fn aliases_of(&self, name: &str) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    /// Get a registry entry.
    pub fn get_entry(&self, name: &str) -> Option<&RegistryEntry> {
        self.resolve(name).and_then(|n| self.validators.get(n))
    }

    /// Get all registered entries.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.validators.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names in one category.
    pub fn by_category(&self, category: ValidatorCategory) -> Vec<&str> {
        self.validators
            .iter()
            .filter(|(_, e)| e.category == category)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Unregister a validator and its aliases.
    pub fn unregister(&mut self, name: &str) -> bool {
        if self.validators.shift_remove(name).is_some() {
            self.aliases.retain(|_, target| target != name);
            true
        } else {
            false
        }
    }

    /// Get the total number of registered validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Names and aliases, sorted.
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .validators
            .keys()
            .chain(self.aliases.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases)
            .finish()
    }
}

/// Deserialize validator parameters, rejecting unknown keys with a
/// configuration error.
pub fn parse_params<P: DeserializeOwned>(
    validator: &str,
    params: &JsonValue,
) -> Result<P, ValidatorConfigurationError> {
    let params = match params {
        JsonValue::Null => JsonValue::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(params)
        .map_err(|e| ValidatorConfigurationError::invalid_parameters(validator, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::IrTable;
    use crate::test_support::sample_table;
    use crate::validation::result::ValidationResult;
    use crate::validation::validator::FnValidator;
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let registry = ValidatorRegistry::with_builtins();
        for name in [
            "positive_amounts",
            "currency_consistency",
            "date_range",
            "duplicate_detection",
            "missing_value_detection",
            "outlier_detection",
            "detect_duplicates",
            "detect_missing",
            "detect_outliers",
        ] {
            assert!(registry.contains(name), "{}", name);
        }
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.by_category(ValidatorCategory::Business).len(), 3);
    }

    #[test]
    fn test_create_with_params() {
        let registry = ValidatorRegistry::with_builtins();
        let validator = registry
            .create("positive_amounts", &json!({"account_patterns": ["^4"]}))
            .unwrap();
        assert_eq!(validator.name(), "positive_amounts");

        let alias = registry
            .create("detect_outliers", &json!({"method": "iqr"}))
            .unwrap();
        assert_eq!(alias.name(), "outlier_detection");
    }

    #[test]
    fn test_unknown_name_lists_available() {
        let registry = ValidatorRegistry::with_builtins();
        let err = registry.create("spellcheck", &JsonValue::Null).err().unwrap();
        match err {
            ValidatorConfigurationError::UnknownValidator { name, available } => {
                assert_eq!(name, "spellcheck");
                assert!(available.contains(&"date_range".to_string()));
                assert!(available.contains(&"detect_missing".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let registry = ValidatorRegistry::with_builtins();
        let err = registry
            .create("date_range", &json!({"min": "2024-01-01"}))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ValidatorConfigurationError::InvalidParameters { .. }
        ));
    }

    #[test]
    fn test_null_params_use_defaults() {
        let registry = ValidatorRegistry::with_builtins();
        assert!(registry.create("currency_consistency", &JsonValue::Null).is_ok());
        assert!(registry.create("outlier_detection", &json!({})).is_ok());
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ValidatorRegistry::new();
        registry.register(
            "non_empty",
            ValidatorCategory::Custom,
            "Fails on empty tables",
            |_params| {
                Ok(Box::new(FnValidator::new("non_empty", |ir: &IrTable| {
                    let result = ValidationResult::pass("non_empty");
                    Ok(if ir.is_empty() {
                        result.with_error("table is empty")
                    } else {
                        result
                    })
                })) as Box<dyn Validator>)
            },
        );
        registry.register_alias("not_empty", "non_empty");

        let validator = registry.create("not_empty", &JsonValue::Null).unwrap();
        assert!(validator.validate(&sample_table()).unwrap().is_valid());
        assert!(!validator.validate(&IrTable::empty()).unwrap().is_valid());

        assert!(registry.unregister("non_empty"));
        assert!(!registry.contains("not_empty"));
    }
}

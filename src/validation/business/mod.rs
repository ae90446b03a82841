//! Business-rule validators.
//!
//! These check accounting constraints: sign of amounts per account class,
//! one currency per group, and allowed date windows. Violations are errors.

pub mod amounts;
pub mod currency;
pub mod dates;

pub use amounts::{PositiveAmountsParams, PositiveAmountsValidator};
pub use currency::{CurrencyConsistencyParams, CurrencyConsistencyValidator};
pub use dates::{DateRangeParams, DateRangeValidator};

use crate::validation::registry::{ValidatorCategory, ValidatorRegistry};

/// Register all business validators.
pub fn register_all(registry: &mut ValidatorRegistry) {
    registry.register_typed(
        PositiveAmountsValidator::NAME,
        ValidatorCategory::Business,
        "Accounts matching a pattern must carry positive amounts",
        PositiveAmountsValidator::from_params,
    );
    registry.register_typed(
        CurrencyConsistencyValidator::NAME,
        ValidatorCategory::Business,
        "Each group of records uses a single currency",
        CurrencyConsistencyValidator::from_params,
    );
    registry.register_typed(
        DateRangeValidator::NAME,
        ValidatorCategory::Business,
        "Dates fall inside an inclusive window",
        DateRangeValidator::from_params,
    );
}

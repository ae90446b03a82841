//! Data-quality validators.
//!
//! Quality findings (duplicates, gaps, unusual amounts) are reported as
//! warnings and never make a result invalid on their own.

pub mod duplicates;
pub mod missing;
pub mod outliers;

pub use duplicates::{DuplicateDetectionValidator, DuplicateMode, DuplicateParams};
pub use missing::{MissingValueParams, MissingValueValidator};
pub use outliers::{OutlierDetectionValidator, OutlierMethod, OutlierParams};

use crate::validation::registry::{ValidatorCategory, ValidatorRegistry};

/// Register all quality validators and their short aliases.
pub fn register_all(registry: &mut ValidatorRegistry) {
    registry.register_typed(
        DuplicateDetectionValidator::NAME,
        ValidatorCategory::Quality,
        "Rows repeating an earlier row on chosen fields (exact or fuzzy)",
        DuplicateDetectionValidator::from_params,
    );
    registry.register_alias("detect_duplicates", DuplicateDetectionValidator::NAME);

    registry.register_typed(
        MissingValueValidator::NAME,
        ValidatorCategory::Quality,
        "Null or blank values per field",
        MissingValueValidator::from_params,
    );
    registry.register_alias("detect_missing", MissingValueValidator::NAME);

    registry.register_typed(
        OutlierDetectionValidator::NAME,
        ValidatorCategory::Quality,
        "Unusual amounts by z-score, IQR or percentile band",
        OutlierDetectionValidator::from_params,
    );
    registry.register_alias("detect_outliers", OutlierDetectionValidator::NAME);
}

//! Preprocessing configuration
//!
//! [`PreprocessingOptions`] is the user-facing configuration, usually loaded
//! from JSON. Every field has a default, so `{}` is a valid options file:
//!
//! ```json
//! {
//!   "num_samples": 100000,
//!   "max_unique_enum_values": 10,
//!   "quantile_size": 20,
//!   "quantile_k2_threshold": 1000.0,
//!   "skip_box_cox": false,
//!   "skip_quantiles": true,
//!   "feature_overrides": { "3": "ENUM" },
//!   "whitelist_features": [1, 2, 3],
//!   "assert_whitelist_feature_coverage": true
//! }
//! ```
//!
//! Unknown fields are ignored, so options files shared with other tools may
//! carry extra keys such as `table_sample`.
//!
//! [`NormalizationOptions`] is the subset captured by the
//! [`NormalizationProcessor`](crate::processor::NormalizationProcessor).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{feature::FeatureId, parameters::FeatureType};

pub const DEFAULT_NUM_SAMPLES: u64 = 100_000;
pub const DEFAULT_MAX_UNIQUE_ENUM_VALUES: usize = 10;
pub const DEFAULT_QUANTILE_SIZE: usize = 20;
pub const DEFAULT_QUANTILE_K2_THRESHOLD: f64 = 1000.0;

/// Options for a full identification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingOptions {
    /// Target number of sampled values per feature
    pub num_samples: u64,
    pub max_unique_enum_values: usize,
    pub quantile_size: usize,
    pub quantile_k2_threshold: f64,
    pub skip_box_cox: bool,
    pub skip_quantiles: bool,
    pub feature_overrides: BTreeMap<FeatureId, FeatureType>,
    /// `None` or empty means every feature is accepted
    pub whitelist_features: Option<Vec<FeatureId>>,
    pub assert_whitelist_feature_coverage: bool,
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            num_samples: DEFAULT_NUM_SAMPLES,
            max_unique_enum_values: DEFAULT_MAX_UNIQUE_ENUM_VALUES,
            quantile_size: DEFAULT_QUANTILE_SIZE,
            quantile_k2_threshold: DEFAULT_QUANTILE_K2_THRESHOLD,
            skip_box_cox: false,
            skip_quantiles: true,
            feature_overrides: BTreeMap::new(),
            whitelist_features: None,
            assert_whitelist_feature_coverage: true,
        }
    }
}

impl PreprocessingOptions {
    #[must_use]
    pub fn normalization_options(&self) -> NormalizationOptions {
        NormalizationOptions {
            max_unique_enum_values: self.max_unique_enum_values,
            quantile_size: self.quantile_size,
            quantile_k2_threshold: self.quantile_k2_threshold,
            skip_box_cox: self.skip_box_cox,
            skip_quantiles: self.skip_quantiles,
            feature_overrides: self.feature_overrides.clone(),
            whitelist_features: self
                .whitelist_features
                .iter()
                .flatten()
                .copied()
                .collect(),
            assert_whitelist_feature_coverage: self.assert_whitelist_feature_coverage,
        }
    }
}

/// Options captured by the normalization processor
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationOptions {
    pub max_unique_enum_values: usize,
    pub quantile_size: usize,
    pub quantile_k2_threshold: f64,
    pub skip_box_cox: bool,
    pub skip_quantiles: bool,
    pub feature_overrides: BTreeMap<FeatureId, FeatureType>,
    /// Empty means no restriction
    pub whitelist_features: BTreeSet<FeatureId>,
    pub assert_whitelist_feature_coverage: bool,
}

impl Default for NormalizationOptions {
    fn default() -> Self {
        PreprocessingOptions::default().normalization_options()
    }
}

impl NormalizationOptions {
    #[must_use]
    pub fn is_whitelisted(&self, feature_id: FeatureId) -> bool {
        self.whitelist_features.is_empty() || self.whitelist_features.contains(&feature_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let options: PreprocessingOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, PreprocessingOptions::default());
        assert!(options.skip_quantiles);
        assert!(options.assert_whitelist_feature_coverage);
    }

    #[test]
    fn test_parses_overrides_and_whitelist() {
        let options: PreprocessingOptions = serde_json::from_str(
            r#"{
                "num_samples": 50,
                "feature_overrides": {"3": "ENUM", "4": "DO_NOT_PREPROCESS"},
                "whitelist_features": [3, 4, 4]
            }"#,
        )
        .unwrap();
        assert_eq!(options.num_samples, 50);
        assert_eq!(options.feature_overrides[&3], FeatureType::Enum);

        let norm = options.normalization_options();
        assert_eq!(norm.whitelist_features, BTreeSet::from([3, 4]));
        assert!(norm.is_whitelisted(3));
        assert!(!norm.is_whitelisted(5));
    }

    #[test]
    fn test_ignores_unknown_fields() {
        let options: PreprocessingOptions = serde_json::from_str(
            r#"{"num_samples": 5, "table_sample": 10.0, "skip_preprocessing": false}"#,
        )
        .unwrap();
        assert_eq!(options.num_samples, 5);
        assert_eq!(options.max_unique_enum_values, DEFAULT_MAX_UNIQUE_ENUM_VALUES);
    }

    #[test]
    fn test_empty_whitelist_accepts_everything() {
        let options = PreprocessingOptions {
            whitelist_features: Some(vec![]),
            ..PreprocessingOptions::default()
        };
        let norm = options.normalization_options();
        assert!(norm.is_whitelisted(123));
    }
}

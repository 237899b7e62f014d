//! Normalization parameters produced per feature
//!
//! [`NormalizationParameters`] describe how a downstream trainer maps raw
//! feature values to network inputs. The fields that apply depend on the
//! [`FeatureType`]:
//!
//! | type                | fields used                                  |
//! |---------------------|----------------------------------------------|
//! | `BINARY`            | none                                         |
//! | `PROBABILITY`       | none                                         |
//! | `CONTINUOUS`        | `mean`, `stddev`                             |
//! | `BOXCOX`            | `boxcox_lambda`, `boxcox_shift`, `mean`, `stddev` |
//! | `QUANTILE`          | `quantiles`                                  |
//! | `ENUM`              | `possible_values`                            |
//! | `CONTINUOUS_ACTION` | `mean`, `stddev`, `min_value`, `max_value`   |
//! | `DO_NOT_PREPROCESS` | `mean`, `stddev` (informational)             |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::feature::FeatureId;

/// Result of identification: feature id to its parameters
pub type NormalizationParamMap = BTreeMap<FeatureId, NormalizationParameters>;

/// How a feature is normalized
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    #[display("BINARY")]
    Binary,
    #[display("PROBABILITY")]
    Probability,
    #[display("CONTINUOUS")]
    Continuous,
    #[display("BOXCOX")]
    Boxcox,
    #[display("ENUM")]
    Enum,
    #[display("QUANTILE")]
    Quantile,
    #[display("CONTINUOUS_ACTION")]
    ContinuousAction,
    #[display("DO_NOT_PREPROCESS")]
    DoNotPreprocess,
}

/// Normalization parameters of a single feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParameters {
    pub feature_type: FeatureType,
    pub boxcox_lambda: Option<f64>,
    pub boxcox_shift: Option<f64>,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    pub possible_values: Option<Vec<i64>>,
    pub quantiles: Option<Vec<f64>>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl NormalizationParameters {
    /// Parameters with only the type set
    #[must_use]
    pub fn new(feature_type: FeatureType) -> Self {
        Self {
            feature_type,
            boxcox_lambda: None,
            boxcox_shift: None,
            mean: None,
            stddev: None,
            possible_values: None,
            quantiles: None,
            min_value: None,
            max_value: None,
        }
    }

    /// Continuous parameters that leave values unchanged
    ///
    /// Used for features whose sample has a single distinct value.
    #[must_use]
    pub fn no_op() -> Self {
        Self {
            boxcox_shift: Some(0.0),
            mean: Some(0.0),
            stddev: Some(1.0),
            ..Self::new(FeatureType::Continuous)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_type_serialization() {
        assert_eq!(
            serde_json::to_string(&FeatureType::DoNotPreprocess).unwrap(),
            "\"DO_NOT_PREPROCESS\""
        );
        let parsed: FeatureType = serde_json::from_str("\"BOXCOX\"").unwrap();
        assert_eq!(parsed, FeatureType::Boxcox);
        assert_eq!(FeatureType::ContinuousAction.to_string(), "CONTINUOUS_ACTION");
    }

    #[test]
    fn test_param_map_serializes_with_string_keys() {
        let mut map = NormalizationParamMap::new();
        map.insert(7, NormalizationParameters::no_op());
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["7"]["feature_type"], "CONTINUOUS");
        assert_eq!(json["7"]["stddev"], 1.0);

        let back: NormalizationParamMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
    }
}

//! Feature column data model
//!
//! A record's feature column is a sparse collection of
//! `(feature_id, feature_value)` entries. In JSON tables it is stored as an
//! object keyed by the decimal feature id:
//!
//! ```json
//! { "state_features": { "1": 0.2, "2": 3, "7": [0.1, 0.4] } }
//! ```
//!
//! A value is either a scalar or a list of scalars. Lists are kept intact
//! through sampling (one list is one sampled row) and flattened by the
//! aggregator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a sub-feature within a feature column
pub type FeatureId = i64;

/// Value of a single feature entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Scalar(f64),
    List(Vec<f64>),
}

impl FeatureValue {
    /// Returns the scalar values contained in this entry.
    ///
    /// ```
    /// use rlnorm_identify::feature::FeatureValue;
    ///
    /// assert_eq!(FeatureValue::Scalar(1.5).scalars(), &[1.5]);
    /// assert_eq!(FeatureValue::List(vec![1.0, 2.0]).scalars(), &[1.0, 2.0]);
    /// ```
    #[must_use]
    pub fn scalars(&self) -> &[f64] {
        match self {
            FeatureValue::Scalar(value) => std::slice::from_ref(value),
            FeatureValue::List(values) => values,
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_f64().map(FeatureValue::Scalar),
            Value::Array(items) => items
                .iter()
                .map(Value::as_f64)
                .collect::<Option<Vec<_>>>()
                .map(FeatureValue::List),
            _ => None,
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ColumnError {
    #[display("missing column '{column}'")]
    MissingColumn { column: String },
    #[display("column '{column}' is not a feature map")]
    NotAFeatureMap { column: String },
    #[display("column '{column}' has invalid feature id '{key}'")]
    InvalidFeatureId { column: String, key: String },
    #[display("column '{column}' has a non-numeric value for feature {feature_id}")]
    InvalidFeatureValue { column: String, feature_id: FeatureId },
}

/// All feature entries of one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureColumn {
    pub entries: Vec<(FeatureId, FeatureValue)>,
}

impl FeatureColumn {
    /// Parses a feature column from its JSON representation.
    ///
    /// `null` is treated as an empty collection.
    ///
    /// ```
    /// use rlnorm_identify::feature::{FeatureColumn, FeatureValue};
    /// use serde_json::json;
    ///
    /// let column = FeatureColumn::from_json("features", &json!({"3": 1.0, "4": [2.0]})).unwrap();
    /// assert_eq!(
    ///     column.entries,
    ///     vec![
    ///         (3, FeatureValue::Scalar(1.0)),
    ///         (4, FeatureValue::List(vec![2.0])),
    ///     ]
    /// );
    /// ```
    pub fn from_json(column: &str, value: &Value) -> Result<Self, ColumnError> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => {
                return Err(ColumnError::NotAFeatureMap {
                    column: column.to_owned(),
                });
            }
        };

        let entries = map
            .iter()
            .map(|(key, value)| {
                let feature_id =
                    key.trim()
                        .parse::<FeatureId>()
                        .map_err(|_| ColumnError::InvalidFeatureId {
                            column: column.to_owned(),
                            key: key.clone(),
                        })?;
                let value = FeatureValue::from_json(value).ok_or_else(|| {
                    ColumnError::InvalidFeatureValue {
                        column: column.to_owned(),
                        feature_id,
                    }
                })?;
                Ok((feature_id, value))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { entries })
    }
}

/// One `(feature_id, value)` pair produced by exploding a feature column
#[derive(Debug, Clone, PartialEq)]
pub struct ExplodedRow {
    pub feature_id: FeatureId,
    pub value: FeatureValue,
}

//! Regrouping of sampled rows into one value list per feature

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::feature::{ExplodedRow, FeatureId};

/// All sampled values of one feature
///
/// Field names follow the column names of the aggregated sample table, so the
/// JSON form is `{"feature_name": 3, "feature_values": [0.1, 0.7]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSampleRow {
    pub feature_name: FeatureId,
    pub feature_values: Vec<f64>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("malformed row {index}: {reason}")]
pub struct MalformedRowError {
    pub index: usize,
    pub reason: &'static str,
}

impl AggregatedSampleRow {
    /// Reads a row from untyped JSON.
    ///
    /// `feature_name` must be an integer and `feature_values` an array of
    /// numbers; nested arrays are flattened.
    ///
    /// ```
    /// use rlnorm_identify::aggregate::AggregatedSampleRow;
    /// use serde_json::json;
    ///
    /// let row = AggregatedSampleRow::from_json(
    ///     0,
    ///     &json!({"feature_name": 4, "feature_values": [1, [2, 3]]}),
    /// )
    /// .unwrap();
    /// assert_eq!(row.feature_name, 4);
    /// assert_eq!(row.feature_values, vec![1.0, 2.0, 3.0]);
    /// ```
    pub fn from_json(index: usize, value: &Value) -> Result<Self, MalformedRowError> {
        let malformed = |reason| MalformedRowError { index, reason };

        let object = value.as_object().ok_or(malformed("row is not an object"))?;
        let feature_name = object
            .get("feature_name")
            .ok_or(malformed("missing feature_name"))?
            .as_i64()
            .ok_or(malformed("feature_name is not an integer"))?;
        let values = object
            .get("feature_values")
            .ok_or(malformed("missing feature_values"))?;

        let mut feature_values = vec![];
        if !values.is_array() || !flatten_numbers(values, &mut feature_values) {
            return Err(malformed("feature_values is not a list of numbers"));
        }

        Ok(Self {
            feature_name,
            feature_values,
        })
    }
}

fn flatten_numbers(value: &Value, out: &mut Vec<f64>) -> bool {
    match value {
        Value::Number(number) => match number.as_f64() {
            Some(v) => {
                out.push(v);
                true
            }
            None => false,
        },
        Value::Array(items) => items.iter().all(|item| flatten_numbers(item, out)),
        _ => false,
    }
}

/// Groups sampled rows by feature id and flattens their values.
///
/// Values keep their row order within a feature. Features with no sampled
/// rows do not appear. The result is ordered by feature id.
#[must_use]
pub fn aggregate_samples<I>(rows: I) -> Vec<AggregatedSampleRow>
where
    I: IntoIterator<Item = ExplodedRow>,
{
    let mut grouped = BTreeMap::<FeatureId, Vec<f64>>::new();
    for row in rows {
        grouped
            .entry(row.feature_id)
            .or_default()
            .extend_from_slice(row.value.scalars());
    }
    grouped
        .into_iter()
        .map(|(feature_name, feature_values)| AggregatedSampleRow {
            feature_name,
            feature_values,
        })
        .collect()
}

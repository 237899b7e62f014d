//! Turning aggregated samples into a normalization parameter map
//!
//! [`NormalizationProcessor`] captures the [`NormalizationOptions`] and an
//! [`Estimator`] once, then maps aggregated sample rows to a
//! [`NormalizationParamMap`]. Estimator calls are independent per feature and
//! run in parallel; results are merged in input order.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde_json::Value;

use crate::{
    aggregate::{AggregatedSampleRow, MalformedRowError},
    estimator::{DefaultEstimator, EstimateError, Estimator},
    feature::FeatureId,
    options::NormalizationOptions,
    parameters::NormalizationParamMap,
};

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display(
    "Could not identify preprocessing type for these features: {missing:?}; extra features: {extra:?}"
)]
pub struct WhitelistCoverageError {
    /// Whitelisted features without parameters
    pub missing: BTreeSet<FeatureId>,
    /// Identified features outside the whitelist
    pub extra: BTreeSet<FeatureId>,
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ProcessError {
    #[display("malformed aggregated sample row")]
    MalformedRow(MalformedRowError),
    #[display("failed to estimate normalization parameters")]
    Estimate(EstimateError),
    #[display("whitelist coverage check failed")]
    WhitelistCoverage(WhitelistCoverageError),
}

/// Computes normalization parameters from aggregated samples
#[derive(Debug, Clone)]
pub struct NormalizationProcessor<E = DefaultEstimator> {
    options: NormalizationOptions,
    estimator: E,
}

impl NormalizationProcessor {
    #[must_use]
    pub fn new(options: NormalizationOptions) -> Self {
        Self::with_estimator(options, DefaultEstimator)
    }
}

impl<E> NormalizationProcessor<E>
where
    E: Estimator,
{
    #[must_use]
    pub fn with_estimator(options: NormalizationOptions, estimator: E) -> Self {
        Self { options, estimator }
    }

    #[must_use]
    pub fn options(&self) -> &NormalizationOptions {
        &self.options
    }

    /// Estimates parameters for every row and applies the whitelist.
    ///
    /// Rows whose estimate is `None` or whose feature is not whitelisted are
    /// left out. If a feature id appears in several rows, the last row wins.
    pub fn process(
        &self,
        rows: &[AggregatedSampleRow],
    ) -> Result<NormalizationParamMap, ProcessError> {
        let estimates = rows
            .par_iter()
            .map(|row| {
                self.estimator
                    .estimate_feature(row.feature_name, &row.feature_values, &self.options)
                    .map(|params| (row.feature_name, params))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut output = NormalizationParamMap::new();
        for (feature_id, params) in estimates {
            let Some(params) = params else {
                continue;
            };
            if !self.options.is_whitelisted(feature_id) {
                tracing::debug!(feature_id, "skipping feature outside whitelist");
                continue;
            }
            output.insert(feature_id, params);
        }

        self.check_whitelist_coverage(&output)?;
        tracing::info!(
            rows = rows.len(),
            identified = output.len(),
            "computed normalization parameters"
        );
        Ok(output)
    }

    /// Parses untyped JSON rows and processes them.
    pub fn process_json_rows(&self, rows: &[Value]) -> Result<NormalizationParamMap, ProcessError> {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(index, value)| AggregatedSampleRow::from_json(index, value))
            .collect::<Result<Vec<_>, _>>()?;
        self.process(&rows)
    }

    fn check_whitelist_coverage(
        &self,
        output: &NormalizationParamMap,
    ) -> Result<(), WhitelistCoverageError> {
        let whitelist = &self.options.whitelist_features;
        if !self.options.assert_whitelist_feature_coverage || whitelist.is_empty() {
            return Ok(());
        }
        let available = output.keys().copied().collect::<BTreeSet<_>>();
        if available == *whitelist {
            return Ok(());
        }
        Err(WhitelistCoverageError {
            missing: whitelist.difference(&available).copied().collect(),
            extra: available.difference(whitelist).copied().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::parameters::{FeatureType, NormalizationParameters};

    /// Identifies every non-empty feature as continuous with the first value as mean.
    fn first_value_estimator(
        _feature_id: FeatureId,
        values: &[f64],
        _options: &NormalizationOptions,
    ) -> Result<Option<NormalizationParameters>, EstimateError> {
        Ok(values.first().map(|&mean| NormalizationParameters {
            mean: Some(mean),
            ..NormalizationParameters::new(FeatureType::Continuous)
        }))
    }

    fn row(feature_name: FeatureId, feature_values: &[f64]) -> AggregatedSampleRow {
        AggregatedSampleRow {
            feature_name,
            feature_values: feature_values.to_vec(),
        }
    }

    fn whitelisted(features: &[FeatureId]) -> NormalizationOptions {
        NormalizationOptions {
            whitelist_features: features.iter().copied().collect(),
            ..NormalizationOptions::default()
        }
    }

    #[test]
    fn test_missing_whitelisted_feature_fails() {
        let processor =
            NormalizationProcessor::with_estimator(whitelisted(&[3, 7]), first_value_estimator);
        let rows = [row(3, &[1.0]), row(7, &[])];
        let ProcessError::WhitelistCoverage(err) = processor.process(&rows).unwrap_err() else {
            panic!("expected a whitelist coverage error");
        };
        assert_eq!(err.missing, BTreeSet::from([7]));
        assert!(err.extra.is_empty());
        assert!(err.to_string().contains("{7}"));
    }

    #[test]
    fn test_whitelist_filters_features() {
        let processor =
            NormalizationProcessor::with_estimator(whitelisted(&[3]), first_value_estimator);
        let output = processor
            .process(&[row(3, &[1.0]), row(5, &[2.0])])
            .unwrap();
        assert_eq!(output.keys().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_coverage_assertion_can_be_disabled() {
        let options = NormalizationOptions {
            assert_whitelist_feature_coverage: false,
            ..whitelisted(&[3, 7])
        };
        let processor = NormalizationProcessor::with_estimator(options, first_value_estimator);
        let output = processor.process(&[row(3, &[1.0])]).unwrap();
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_no_whitelist_passes_everything_through() {
        let processor = NormalizationProcessor::with_estimator(
            NormalizationOptions::default(),
            first_value_estimator,
        );
        let output = processor
            .process(&[row(5, &[2.0]), row(1, &[4.0])])
            .unwrap();
        assert_eq!(output.keys().copied().collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(output[&1].mean, Some(4.0));
    }

    #[test]
    fn test_empty_values_are_tolerated() {
        let processor = NormalizationProcessor::new(NormalizationOptions::default());
        let output = processor.process(&[row(2, &[])]).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let processor = NormalizationProcessor::new(NormalizationOptions::default());
        assert!(processor.process(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_later_duplicate_wins() {
        let processor = NormalizationProcessor::with_estimator(
            NormalizationOptions::default(),
            first_value_estimator,
        );
        let output = processor
            .process(&[row(1, &[1.0]), row(1, &[9.0])])
            .unwrap();
        assert_eq!(output[&1].mean, Some(9.0));
    }

    #[test]
    fn test_process_is_idempotent() {
        let processor = NormalizationProcessor::new(NormalizationOptions::default());
        let values = (0..100).map(|i| f64::from(i % 5)).collect::<Vec<_>>();
        let rows = [row(1, &values), row(2, &[0.5; 30])];
        let first = processor.process(&rows).unwrap();
        let second = processor.process(&rows).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[&1].feature_type, FeatureType::Enum);
    }

    #[test]
    fn test_estimator_error_is_fatal() {
        let processor = NormalizationProcessor::new(NormalizationOptions::default());
        let mut values = vec![1.0; 30];
        values[0] = f64::INFINITY;
        let err = processor.process(&[row(4, &values)]).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Estimate(EstimateError::NonFiniteValue { feature_id: 4 })
        ));
    }

    #[test]
    fn test_process_json_rows() {
        let processor = NormalizationProcessor::with_estimator(
            NormalizationOptions::default(),
            first_value_estimator,
        );
        let output = processor
            .process_json_rows(&[
                json!({"feature_name": 1, "feature_values": [[0.5, 1.5], 2.5]}),
                json!({"feature_name": 2, "feature_values": []}),
            ])
            .unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output[&1].mean, Some(0.5));

        let ProcessError::MalformedRow(err) = processor
            .process_json_rows(&[json!({"feature_values": [1.0]})])
            .unwrap_err()
        else {
            panic!("expected a malformed row error");
        };
        assert_eq!(err.index, 0);
    }
}

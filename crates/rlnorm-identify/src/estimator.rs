//! Per-feature parameter estimation
//!
//! An [`Estimator`] turns the sampled values of one feature into its
//! [`NormalizationParameters`]. The processor calls it once per aggregated row,
//! possibly from several threads at once, so implementations must be `Sync`.
//!
//! [`DefaultEstimator`] decides the feature type and fits the parameters:
//!
//! ```text
//! values ──┬─ < 20 values ────────────────────────────────▶ None
//!          │
//!          ├─ override? ──yes──▶ forced type ─┐
//!          │      no                          │
//!          │      ▼                           │
//!          │  identify_feature_type ──────────┤
//!          │                                  ▼
//!          │     BINARY / PROBABILITY ─▶ type only
//!          │     ENUM ─────────────────▶ possible_values
//!          │     DO_NOT_PREPROCESS ────▶ mean, max(stddev, 1)
//!          │     CONTINUOUS_ACTION ────▶ mean, stddev
//!          │     CONTINUOUS ──┬─ Box-Cox helps? ─▶ BOXCOX
//!          │                  ├─ heavy tails? ───▶ QUANTILE
//!          │                  └─ otherwise ──────▶ CONTINUOUS
//! ```

use std::collections::BTreeSet;

use rlnorm_stats::{
    boxcox::{BoxCoxFit, boxcox_fit},
    descriptive::DescriptiveStats,
    normality::normal_test,
    quantiles::unique_quantile_boundaries,
};

use crate::{
    feature::FeatureId,
    options::NormalizationOptions,
    parameters::{FeatureType, NormalizationParameters},
};

/// Features with fewer sampled values are left unidentified.
pub const MINIMUM_SAMPLES_TO_IDENTIFY: usize = 20;
/// Lower clamp applied to shifted values before the Box-Cox fit
pub const BOX_COX_MARGIN: f64 = 1e-4;
/// Box-Cox is rejected when the transformed stddev reaches this value.
pub const BOX_COX_MAX_STDDEV: f64 = 1e8;
/// Lower bound of reported standard deviations
pub const MIN_STDDEV: f64 = 1e-6;

/// λ values in this range are too close to the identity to be worth a
/// transformation.
const BOX_COX_IDENTITY_LAMBDA: std::ops::RangeInclusive<f64> = 0.9..=1.1;
/// Box-Cox must shrink `K²` by at least this factor.
const BOX_COX_MIN_IMPROVEMENT: f64 = 10.0;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EstimateError {
    #[display("feature {feature_id} has a non-finite sample value")]
    NonFiniteValue { feature_id: FeatureId },
}

/// Estimates the normalization parameters of a single feature.
///
/// Returns `Ok(None)` when the feature cannot be identified from the given
/// values. Closures with the same signature implement this trait, which is
/// convenient for tests and for plugging in custom rules.
pub trait Estimator: Sync {
    fn estimate_feature(
        &self,
        feature_id: FeatureId,
        values: &[f64],
        options: &NormalizationOptions,
    ) -> Result<Option<NormalizationParameters>, EstimateError>;
}

impl<F> Estimator for F
where
    F: Fn(
            FeatureId,
            &[f64],
            &NormalizationOptions,
        ) -> Result<Option<NormalizationParameters>, EstimateError>
        + Sync,
{
    fn estimate_feature(
        &self,
        feature_id: FeatureId,
        values: &[f64],
        options: &NormalizationOptions,
    ) -> Result<Option<NormalizationParameters>, EstimateError> {
        self(feature_id, values, options)
    }
}

/// Built-in estimator based on value ranges and normality tests
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEstimator;

impl Estimator for DefaultEstimator {
    fn estimate_feature(
        &self,
        feature_id: FeatureId,
        values: &[f64],
        options: &NormalizationOptions,
    ) -> Result<Option<NormalizationParameters>, EstimateError> {
        if values.len() < MINIMUM_SAMPLES_TO_IDENTIFY {
            tracing::debug!(
                feature_id,
                num_values = values.len(),
                "not enough values to identify feature"
            );
            return Ok(None);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EstimateError::NonFiniteValue { feature_id });
        }
        let Some(stats) = DescriptiveStats::new(values.iter().copied()) else {
            return Ok(None);
        };

        let forced = options.feature_overrides.get(&feature_id).copied();
        let feature_type = forced
            .unwrap_or_else(|| identify_feature_type(values, options.max_unique_enum_values));

        let params = match feature_type {
            FeatureType::Binary | FeatureType::Probability => {
                Some(NormalizationParameters::new(feature_type))
            }
            FeatureType::Enum => Some(NormalizationParameters {
                possible_values: Some(possible_values(values)),
                ..NormalizationParameters::new(FeatureType::Enum)
            }),
            FeatureType::DoNotPreprocess => Some(NormalizationParameters {
                mean: Some(stats.mean),
                stddev: Some(stats.sample_std_dev.max(1.0)),
                ..NormalizationParameters::new(FeatureType::DoNotPreprocess)
            }),
            FeatureType::ContinuousAction => {
                with_moments(FeatureType::ContinuousAction, stats.mean, stats.sample_std_dev)
            }
            FeatureType::Continuous | FeatureType::Boxcox | FeatureType::Quantile => {
                estimate_continuous(feature_id, values, &stats, options, forced)
            }
        };

        let params = params.map(|params| NormalizationParameters {
            min_value: Some(stats.min),
            max_value: Some(stats.max),
            ..params
        });
        if let Some(params) = &params {
            tracing::debug!(feature_id, feature_type = %params.feature_type, "identified feature");
        } else {
            tracing::debug!(feature_id, "feature has no usable spread");
        }
        Ok(params)
    }
}

/// Classifies a feature from its sampled values.
///
/// The checks run in order and the first match wins:
///
/// 1. `BINARY`: every value is 0 or 1, or all values are equal
/// 2. `PROBABILITY`: every value lies in `[0, 1]`
/// 3. `ENUM`: every value is a non-negative integer and there are at most
///    `max_unique_enum_values` distinct values
/// 4. `CONTINUOUS` otherwise
///
/// ```
/// use rlnorm_identify::{estimator::identify_feature_type, parameters::FeatureType};
///
/// assert_eq!(identify_feature_type(&[0.0, 1.0, 1.0], 10), FeatureType::Binary);
/// assert_eq!(identify_feature_type(&[0.2, 0.9], 10), FeatureType::Probability);
/// assert_eq!(identify_feature_type(&[2.0, 5.0, 2.0], 10), FeatureType::Enum);
/// assert_eq!(identify_feature_type(&[-1.5, 3.0], 10), FeatureType::Continuous);
/// ```
#[must_use]
#[expect(clippy::float_cmp)]
pub fn identify_feature_type(values: &[f64], max_unique_enum_values: usize) -> FeatureType {
    let Some(&first) = values.first() else {
        return FeatureType::Continuous;
    };
    if values.iter().all(|&v| v == 0.0 || v == 1.0) || values.iter().all(|&v| v == first) {
        return FeatureType::Binary;
    }
    if values.iter().all(|v| (0.0..=1.0).contains(v)) {
        return FeatureType::Probability;
    }
    if is_enum(values, max_unique_enum_values) {
        return FeatureType::Enum;
    }
    FeatureType::Continuous
}

#[expect(clippy::cast_possible_truncation)]
fn is_enum(values: &[f64], max_unique_enum_values: usize) -> bool {
    let mut distinct = BTreeSet::new();
    for &v in values {
        if v < 0.0 || v.fract() != 0.0 {
            return false;
        }
        distinct.insert(v as i64);
        if distinct.len() > max_unique_enum_values {
            return false;
        }
    }
    true
}

#[expect(clippy::cast_possible_truncation)]
fn possible_values(values: &[f64]) -> Vec<i64> {
    values
        .iter()
        .map(|&v| v as i64)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn with_moments(
    feature_type: FeatureType,
    mean: f64,
    sample_std_dev: f64,
) -> Option<NormalizationParameters> {
    if !mean.is_finite() || !sample_std_dev.is_finite() {
        return None;
    }
    Some(NormalizationParameters {
        mean: Some(mean),
        stddev: Some(sample_std_dev.max(MIN_STDDEV)),
        ..NormalizationParameters::new(feature_type)
    })
}

fn estimate_continuous(
    feature_id: FeatureId,
    values: &[f64],
    stats: &DescriptiveStats,
    options: &NormalizationOptions,
    forced: Option<FeatureType>,
) -> Option<NormalizationParameters> {
    let force_boxcox = forced == Some(FeatureType::Boxcox);
    let force_quantile = forced == Some(FeatureType::Quantile);
    let force_continuous = forced == Some(FeatureType::Continuous);

    if stats.max <= stats.min {
        return Some(NormalizationParameters::no_op());
    }

    let k2_original = normal_test(values).map_or(f64::NAN, |r| r.statistic);
    let shift = -stats.min;

    if !options.skip_box_cox && !force_quantile && !force_continuous {
        let shifted = values
            .iter()
            .map(|v| (v + shift).max(BOX_COX_MARGIN))
            .collect::<Vec<_>>();
        if let Some(fit) = boxcox_fit(&shifted) {
            let k2_boxcox = normal_test(&fit.transformed).map_or(f64::NAN, |r| r.statistic);
            tracing::debug!(
                feature_id,
                lambda = fit.lambda,
                k2_original,
                k2_boxcox,
                "fitted Box-Cox"
            );
            let improves = !BOX_COX_IDENTITY_LAMBDA.contains(&fit.lambda)
                && k2_original > k2_boxcox * BOX_COX_MIN_IMPROVEMENT
                && k2_boxcox <= options.quantile_k2_threshold;
            if force_boxcox || improves {
                if let Some(params) = boxcox_parameters(&fit, shift) {
                    return Some(params);
                }
            }
        }
    }

    let heavy_tailed = !options.skip_quantiles
        && !force_continuous
        && k2_original > options.quantile_k2_threshold;
    if force_quantile || heavy_tailed {
        return Some(NormalizationParameters {
            quantiles: Some(unique_quantile_boundaries(values, options.quantile_size)),
            ..NormalizationParameters::new(FeatureType::Quantile)
        });
    }

    with_moments(FeatureType::Continuous, stats.mean, stats.sample_std_dev)
}

fn boxcox_parameters(fit: &BoxCoxFit, shift: f64) -> Option<NormalizationParameters> {
    let stats = DescriptiveStats::new(fit.transformed.iter().copied())?;
    let stddev = stats.sample_std_dev;
    if !stddev.is_finite() || stddev <= 0.0 || stddev >= BOX_COX_MAX_STDDEV {
        return None;
    }
    Some(NormalizationParameters {
        boxcox_lambda: Some(fit.lambda),
        boxcox_shift: Some(shift),
        ..with_moments(FeatureType::Boxcox, stats.mean, stddev)?
    })
}

//! Quantile estimation by linear interpolation of the empirical CDF.
//!
//! For `n` sorted values and probability `p`, the position `h = n * p` is
//! clamped to `[1, n - 1]` and the quantile is interpolated between the
//! `floor(h)`-th and the following order statistic. This is the
//! `alphap = 0, betap = 1` plotting position (Hyndman & Fan type 4).

/// Computes one interpolated quantile from sorted data.
///
/// Returns `NaN` for empty input and the single value for one-element input.
///
/// # Panics
///
/// Panics if `sorted_values` is not sorted in ascending order.
///
/// # Examples
///
/// ```
/// use rlnorm_stats::quantiles::interpolated_quantile;
///
/// let values = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(interpolated_quantile(&values, 0.0), 1.0);
/// assert_eq!(interpolated_quantile(&values, 0.375), 1.5);
/// assert_eq!(interpolated_quantile(&values, 1.0), 4.0);
/// ```
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn interpolated_quantile(sorted_values: &[f64], probability: f64) -> f64 {
    assert!(
        sorted_values.is_sorted_by(|a, b| a <= b),
        "values must be sorted in ascending order"
    );
    match sorted_values {
        [] => f64::NAN,
        [single] => *single,
        _ => {
            let n = sorted_values.len() as f64;
            let position = n * probability;
            let k = position.clamp(1.0, n - 1.0).floor();
            let gamma = (position - k).clamp(0.0, 1.0);
            let k = k as usize;
            let (lower, upper) = (sorted_values[k - 1], sorted_values[k]);
            lower + gamma * (upper - lower)
        }
    }
}

/// Computes the quantiles at `0, 1/q, 2/q, ..., 1` and removes duplicates.
///
/// The result is sorted ascending. Heavily repeated values collapse into a
/// single boundary, so the output may be shorter than `quantile_size + 1`.
///
/// # Examples
///
/// ```
/// use rlnorm_stats::quantiles::unique_quantile_boundaries;
///
/// let values = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(unique_quantile_boundaries(&values, 2), vec![1.0, 2.0, 4.0]);
///
/// let constant = [5.0; 10];
/// assert_eq!(unique_quantile_boundaries(&constant, 4), vec![5.0]);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn unique_quantile_boundaries(values: &[f64], quantile_size: usize) -> Vec<f64> {
    if values.is_empty() || quantile_size == 0 {
        return vec![];
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut boundaries = (0..=quantile_size)
        .map(|i| interpolated_quantile(&sorted, i as f64 / quantile_size as f64))
        .collect::<Vec<_>>();
    boundaries.sort_by(f64::total_cmp);
    boundaries.dedup();
    boundaries
}

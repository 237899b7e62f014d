//! D'Agostino-Pearson omnibus test for normality
//!
//! The test combines a skewness test and a kurtosis test, each of which maps
//! its sample moment to an approximately standard-normal `z` score. The
//! omnibus statistic `K² = z_skew² + z_kurt²` follows a chi-squared
//! distribution with two degrees of freedom under the null hypothesis that the
//! sample was drawn from a normal distribution.
//!
//! Larger `K²` means "less normal". The default estimator uses the statistic
//! itself (not only the p-value) to compare a feature before and after a
//! Box-Cox transformation.
//!
//! # Examples
//!
//! ```
//! use rlnorm_stats::normality::normal_test;
//!
//! let values = (0..50).map(|i| f64::from(i % 7) + f64::from(i % 3)).collect::<Vec<_>>();
//! let result = normal_test(&values).unwrap();
//! assert!(result.statistic >= 0.0);
//! assert!((0.0..=1.0).contains(&result.p_value));
//! ```

/// Minimum number of observations accepted by the skewness test.
pub const MIN_NORMAL_TEST_SAMPLES: usize = 8;

/// Result of the omnibus normality test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalTestResult {
    /// `K²` statistic
    pub statistic: f64,
    /// Survival function of chi-squared(2) at `statistic`
    pub p_value: f64,
}

/// Central moments `(m2, m3, m4)` of the values (population normalization).
#[expect(clippy::cast_precision_loss)]
fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let (m2, m3, m4) = values.iter().fold((0.0, 0.0, 0.0), |(m2, m3, m4), v| {
        let d = v - mean;
        let d2 = d * d;
        (m2 + d2, m3 + d2 * d, m4 + d2 * d2)
    });
    (m2 / n, m3 / n, m4 / n)
}

/// Tests whether the skewness differs from that of a normal distribution.
///
/// Returns the `z` score, or `None` when there are fewer than
/// [`MIN_NORMAL_TEST_SAMPLES`] values or the values have zero variance.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn skew_test(values: &[f64]) -> Option<f64> {
    if values.len() < MIN_NORMAL_TEST_SAMPLES {
        return None;
    }
    let (m2, m3, _) = central_moments(values);
    if m2 <= 0.0 {
        return None;
    }
    let n = values.len() as f64;
    let skewness = m3 / m2.powf(1.5);

    let y = skewness * (((n + 1.0) * (n + 3.0)) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    Some(delta * (y / alpha).asinh())
}

/// Tests whether the kurtosis differs from that of a normal distribution.
///
/// Returns the `z` score, or `None` when there are fewer than
/// [`MIN_NORMAL_TEST_SAMPLES`] values or the values have zero variance.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn kurtosis_test(values: &[f64]) -> Option<f64> {
    if values.len() < MIN_NORMAL_TEST_SAMPLES {
        return None;
    }
    let (m2, _, m4) = central_moments(values);
    if m2 <= 0.0 {
        return None;
    }
    let n = values.len() as f64;
    let kurtosis = m4 / (m2 * m2);

    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let variance = 24.0 * n * (n - 2.0) * (n - 3.0)
        / ((n + 1.0) * (n + 1.0) * (n + 3.0) * (n + 5.0));
    let x = (kurtosis - expected) / variance.sqrt();
    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * ((6.0 * (n + 3.0) * (n + 5.0)) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return None;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();
    Some((term1 - term2) / (2.0 / (9.0 * a)).sqrt())
}

/// Runs the D'Agostino-Pearson omnibus test.
///
/// Returns `None` when either component test is undefined for the input.
#[must_use]
pub fn normal_test(values: &[f64]) -> Option<NormalTestResult> {
    let z_skew = skew_test(values)?;
    let z_kurt = kurtosis_test(values)?;
    let statistic = z_skew * z_skew + z_kurt * z_kurt;
    if !statistic.is_finite() {
        return None;
    }
    Some(NormalTestResult {
        statistic,
        p_value: (-statistic / 2.0).exp(),
    })
}

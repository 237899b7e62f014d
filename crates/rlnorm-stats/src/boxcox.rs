//! Box-Cox power transformation
//!
//! ```text
//! y = (x^λ - 1) / λ   if λ != 0
//! y = ln(x)           if λ == 0
//! ```
//!
//! The transformation is defined for strictly positive `x` only. Callers
//! shift their data before fitting (see the default estimator in
//! `rlnorm-identify`).
//!
//! [`boxcox_fit`] chooses λ by maximizing the profile log-likelihood
//!
//! ```text
//! llf(λ) = (λ - 1) Σ ln(x) - n/2 · ln(var(y))
//! ```
//!
//! with a golden-section search on `[LAMBDA_MIN, LAMBDA_MAX]`.

/// Lower bound of the λ search interval
pub const LAMBDA_MIN: f64 = -5.0;
/// Upper bound of the λ search interval
pub const LAMBDA_MAX: f64 = 5.0;

const LAMBDA_TOLERANCE: f64 = 1e-7;
const MAX_ITERATIONS: usize = 200;

/// A fitted Box-Cox transformation
#[derive(Debug, Clone)]
pub struct BoxCoxFit {
    /// Maximum-likelihood λ
    pub lambda: f64,
    /// Input values transformed with `lambda`
    pub transformed: Vec<f64>,
}

/// Applies the Box-Cox transformation to a single value.
///
/// # Examples
///
/// ```
/// use rlnorm_stats::boxcox::boxcox_transform;
///
/// assert_eq!(boxcox_transform(4.0, 1.0), 3.0);
/// assert_eq!(boxcox_transform(4.0, 0.5), 2.0);
/// assert_eq!(boxcox_transform(1.0, 0.0), 0.0);
/// ```
#[must_use]
pub fn boxcox_transform(value: f64, lambda: f64) -> f64 {
    if lambda.abs() < f64::EPSILON {
        value.ln()
    } else {
        (value.powf(lambda) - 1.0) / lambda
    }
}

/// Profile log-likelihood of λ for strictly positive values.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn boxcox_log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let sum_ln = values.iter().map(|v| v.ln()).sum::<f64>();
    let transformed = values.iter().map(|&v| boxcox_transform(v, lambda));
    let mean = transformed.clone().sum::<f64>() / n;
    let variance = transformed.map(|y| (y - mean).powi(2)).sum::<f64>() / n;
    (lambda - 1.0) * sum_ln - n / 2.0 * variance.ln()
}

/// Fits λ by maximum likelihood and returns it with the transformed values.
///
/// Returns `None` if there are fewer than two values, any value is not
/// strictly positive and finite, all values are equal, or the likelihood
/// is not finite at the optimum.
#[must_use]
pub fn boxcox_fit(values: &[f64]) -> Option<BoxCoxFit> {
    if values.len() < 2 || values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return None;
    }
    let first = values[0].to_bits();
    if values.iter().all(|v| v.to_bits() == first) {
        return None;
    }

    let llf = |lambda| boxcox_log_likelihood(values, lambda);
    let lambda = golden_section_max(llf, LAMBDA_MIN, LAMBDA_MAX);
    if !llf(lambda).is_finite() {
        return None;
    }

    let transformed = values
        .iter()
        .map(|&v| boxcox_transform(v, lambda))
        .collect();
    Some(BoxCoxFit {
        lambda,
        transformed,
    })
}

fn golden_section_max<F>(f: F, mut lo: f64, mut hi: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut x1 = hi - inv_phi * (hi - lo);
    let mut x2 = lo + inv_phi * (hi - lo);
    let mut f1 = f(x1);
    let mut f2 = f(x2);

    for _ in 0..MAX_ITERATIONS {
        if hi - lo < LAMBDA_TOLERANCE {
            break;
        }
        // NaN compares false, moving towards the lower bound
        if f1 > f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - inv_phi * (hi - lo);
            f1 = f(x1);
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + inv_phi * (hi - lo);
            f2 = f(x2);
        }
    }
    (lo + hi) / 2.0
}

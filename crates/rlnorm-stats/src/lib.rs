//! Statistical primitives for normalization parameter identification.
//!
//! This crate provides the numeric building blocks used by the default
//! estimator in `rlnorm-identify`:
//!
//! - **Descriptive statistics**: min, max, mean, median, population and sample standard deviation
//! - **Quantiles**: interpolated quantiles and deduplicated quantile boundaries
//! - **Normality testing**: D'Agostino-Pearson `K²` omnibus test
//! - **Box-Cox**: power transformation and maximum-likelihood λ fitting
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`quantiles`]: Quantile estimation by linear interpolation
//! - [`normality`]: Skewness, kurtosis and omnibus normality tests
//! - [`boxcox`]: Box-Cox transformation and fitting
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use rlnorm_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Computing quantile boundaries
//!
//! ```
//! use rlnorm_stats::quantiles::unique_quantile_boundaries;
//!
//! let values = [4.0, 3.0, 2.0, 1.0];
//! assert_eq!(unique_quantile_boundaries(&values, 2), vec![1.0, 2.0, 4.0]);
//! ```
//!
//! ## Fitting a Box-Cox transformation
//!
//! ```
//! use rlnorm_stats::boxcox::boxcox_fit;
//!
//! let values = [1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0];
//! let fit = boxcox_fit(&values).unwrap();
//! assert_eq!(fit.transformed.len(), values.len());
//! ```

pub mod boxcox;
pub mod descriptive;
pub mod normality;
pub mod quantiles;

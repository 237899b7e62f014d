//! Identification of feature normalization parameters from logged transitions
//!
//! This crate samples a sparse feature column (a map from feature id to value)
//! of a tabular dataset and derives per-feature normalization parameters for
//! reinforcement-learning training.
//!
//! # Overview
//!
//! Identification runs as a pipeline:
//!
//! 1. **Read Table** ([`table::TableSource`]): Open a session on a table store and
//!    read the records. The session is released on every path.
//! 2. **Sample** ([`sample::sample_feature_column`]): Explode the feature column,
//!    count rows per feature and draw a seeded stratified sample of roughly
//!    `num_samples` values per feature
//! 3. **Aggregate** ([`aggregate::aggregate_samples`]): Group the sampled values by
//!    feature id
//! 4. **Process** ([`processor::NormalizationProcessor`]): Estimate parameters for
//!    each feature with an [`estimator::Estimator`], filter by the whitelist and
//!    check whitelist coverage
//!
//! [`identify::identify_normalization_parameters`] runs all four steps.
//!
//! # Modules
//!
//! - [`table`]: Table sources, sessions and records
//! - [`feature`]: Feature ids, values and feature map columns
//! - [`sample`]: Per-feature stratified sampling
//! - [`aggregate`]: Regrouping of sampled rows
//! - [`estimator`]: Per-feature parameter estimation
//! - [`processor`]: Parameter map construction and whitelist handling
//! - [`options`]: Preprocessing configuration
//! - [`parameters`]: Feature types and normalization parameters
//! - [`identify`]: The end-to-end entry point
//!
//! # Examples
//!
//! ## Identifying a table column
//!
//! ```
//! use rlnorm_identify::{
//!     identify::identify_normalization_parameters,
//!     options::PreprocessingOptions,
//!     parameters::FeatureType,
//!     table::{MemoryTableSource, Record, TableSpec},
//! };
//! use serde_json::json;
//!
//! let records = (0..500)
//!     .map(|i| Record::new().with_column("state_features", json!({"1": i % 2})))
//!     .collect();
//! let source = MemoryTableSource::new().with_table("transitions", records);
//!
//! let options = PreprocessingOptions {
//!     num_samples: 100,
//!     ..PreprocessingOptions::default()
//! };
//! let params = identify_normalization_parameters(
//!     &source,
//!     &TableSpec::new("transitions"),
//!     "state_features",
//!     &options,
//!     0,
//! )
//! .unwrap();
//! assert_eq!(params[&1].feature_type, FeatureType::Binary);
//! ```
//!
//! ## Processing pre-aggregated samples
//!
//! ```
//! use rlnorm_identify::{
//!     aggregate::AggregatedSampleRow, options::NormalizationOptions,
//!     parameters::FeatureType, processor::NormalizationProcessor,
//! };
//!
//! let rows = vec![AggregatedSampleRow {
//!     feature_name: 5,
//!     feature_values: (0..40).map(|i| f64::from(i % 4)).collect(),
//! }];
//! let processor = NormalizationProcessor::new(NormalizationOptions::default());
//! let params = processor.process(&rows).unwrap();
//! assert_eq!(params[&5].feature_type, FeatureType::Enum);
//! assert_eq!(params[&5].possible_values, Some(vec![0, 1, 2, 3]));
//! ```

pub mod aggregate;
pub mod estimator;
pub mod feature;
pub mod identify;
pub mod options;
pub mod parameters;
pub mod processor;
pub mod sample;
pub mod table;

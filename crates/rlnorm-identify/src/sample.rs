//! Per-feature stratified sampling of a feature column
//!
//! This module turns the records of a table into a per-feature sample of
//! approximately `num_samples` values. The pipeline has four explicit stages,
//! each data parallel over its input:
//!
//! ```text
//! Records
//!     ↓ explode            one ExplodedRow per (feature_id, value) entry
//! ExplodedRows
//!     ↓ count              FeatureCounts: rows per feature id
//! FeatureCounts
//!     ↓ fractions          SampleFractions: num_samples / count
//! SampleFractions
//!     ↓ stratified sample  keep each row with its feature's fraction
//! Sampled ExplodedRows
//!     ↓ aggregate          (see crate::aggregate)
//! AggregatedSampleRows
//! ```
//!
//! # Approximate sample sizes
//!
//! Each row is kept independently with probability `fraction`, so the number
//! of sampled rows per feature is binomial with mean `num_samples` rather than
//! exactly `num_samples`. A feature may even end up with no sampled row at all
//! and then be absent from the aggregated output.
//!
//! # Determinism
//!
//! Rows are split into partitions of [`PARTITION_SIZE`] rows. Partition `i`
//! draws from a PCG32 stream seeded with `(seed, i)`, one uniform draw per row
//! regardless of the row's feature. The sample therefore depends only on the
//! rows (in record order) and the seed, not on thread scheduling.

use std::collections::{BTreeMap, HashMap};

use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;
use rayon::prelude::*;

use crate::{
    aggregate::{self, AggregatedSampleRow},
    feature::{ColumnError, ExplodedRow, FeatureId},
    table::Record,
};

/// Number of exploded rows sharing one random stream
pub const PARTITION_SIZE: usize = 8192;

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display(
    "feature {feature_id} has {population_count} rows, fewer than the requested sample size {sample_size}"
)]
pub struct InsufficientPopulationError {
    pub feature_id: FeatureId,
    pub population_count: u64,
    pub sample_size: u64,
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum SampleError {
    #[display("invalid feature column in record {record_index}")]
    #[from(ignore)]
    Column {
        record_index: usize,
        source: ColumnError,
    },
    #[display("insufficient population for sampling")]
    InsufficientPopulation(InsufficientPopulationError),
}

/// Flattens the feature column of every record into one row per entry.
///
/// Rows are returned in record order, then in entry order within a record.
pub fn explode(records: &[Record], column: &str) -> Result<Vec<ExplodedRow>, SampleError> {
    let columns = records
        .par_iter()
        .enumerate()
        .map(|(record_index, record)| {
            record
                .feature_column(column)
                .map_err(|source| SampleError::Column {
                    record_index,
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(columns
        .into_iter()
        .flat_map(|column| column.entries)
        .map(|(feature_id, value)| ExplodedRow { feature_id, value })
        .collect())
}

/// Number of exploded rows per feature id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureCounts {
    pub counts: BTreeMap<FeatureId, u64>,
}

impl FeatureCounts {
    #[must_use]
    pub fn from_rows(rows: &[ExplodedRow]) -> Self {
        let counts = rows
            .par_iter()
            .fold(HashMap::new, |mut counts, row| {
                *counts.entry(row.feature_id).or_insert(0) += 1;
                counts
            })
            .reduce(HashMap::new, |mut acc, counts| {
                for (feature_id, count) in counts {
                    *acc.entry(feature_id).or_insert(0) += count;
                }
                acc
            })
            .into_iter()
            .collect();
        Self { counts }
    }

    #[must_use]
    pub fn get(&self, feature_id: FeatureId) -> Option<u64> {
        self.counts.get(&feature_id).copied()
    }
}

/// Sampling probability per feature id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleFractions {
    pub fractions: HashMap<FeatureId, f64>,
}

impl SampleFractions {
    /// Computes `sample_size / count` for every counted feature.
    ///
    /// Features are checked in ascending id order, so the error always names
    /// the smallest offending feature id.
    #[expect(clippy::cast_precision_loss)]
    pub fn from_counts(
        counts: &FeatureCounts,
        sample_size: u64,
    ) -> Result<Self, InsufficientPopulationError> {
        let fractions = counts
            .counts
            .iter()
            .map(|(&feature_id, &population_count)| {
                if population_count < sample_size {
                    return Err(InsufficientPopulationError {
                        feature_id,
                        population_count,
                        sample_size,
                    });
                }
                Ok((feature_id, sample_size as f64 / population_count as f64))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { fractions })
    }

    #[must_use]
    pub fn get(&self, feature_id: FeatureId) -> Option<f64> {
        self.fractions.get(&feature_id).copied()
    }
}

/// Keeps each row independently with its feature's fraction.
///
/// Rows of features without a fraction are dropped.
#[must_use]
pub fn stratified_sample(
    rows: &[ExplodedRow],
    fractions: &SampleFractions,
    seed: u64,
) -> Vec<ExplodedRow> {
    rows.par_chunks(PARTITION_SIZE)
        .enumerate()
        .flat_map_iter(|(partition, chunk)| {
            let mut rng = Pcg32::new(seed, partition as u64);
            chunk
                .iter()
                .filter(move |row| {
                    let draw = rng.random::<f64>();
                    fractions
                        .get(row.feature_id)
                        .is_some_and(|fraction| draw < fraction)
                })
                .cloned()
        })
        .collect()
}

/// Runs explode, count, fractions, stratified sample and aggregate.
///
/// # Arguments
///
/// * `records` - Table records
/// * `column` - Name of the feature column
/// * `num_samples` - Target sample size per feature
/// * `seed` - Seed for the stratified sample
///
/// # Returns
///
/// One aggregated row per feature with at least one sampled value, ordered
/// by feature id
pub fn sample_feature_column(
    records: &[Record],
    column: &str,
    num_samples: u64,
    seed: u64,
) -> Result<Vec<AggregatedSampleRow>, SampleError> {
    let rows = explode(records, column)?;
    tracing::info!(
        records = records.len(),
        rows = rows.len(),
        column,
        "exploded feature column"
    );

    let counts = FeatureCounts::from_rows(&rows);
    tracing::info!(features = counts.counts.len(), "counted feature population");

    let fractions = SampleFractions::from_counts(&counts, num_samples)?;
    let sampled = stratified_sample(&rows, &fractions, seed);
    tracing::info!(
        sampled = sampled.len(),
        num_samples,
        seed,
        "drew stratified sample"
    );

    let aggregated = aggregate::aggregate_samples(sampled);
    for row in &aggregated {
        tracing::debug!(
            feature_id = row.feature_name,
            population = counts.get(row.feature_name),
            sampled = row.feature_values.len(),
            "sampled feature"
        );
    }
    Ok(aggregated)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::feature::FeatureValue;

    fn rows(feature_id: FeatureId, count: usize) -> Vec<ExplodedRow> {
        (0..count)
            .map(|i| ExplodedRow {
                feature_id,
                value: FeatureValue::Scalar(f64::from(u32::try_from(i).unwrap())),
            })
            .collect()
    }

    #[test]
    fn test_explode_preserves_record_order() {
        let records = vec![
            Record::new().with_column("f", json!({"1": 0.2, "2": 5})),
            Record::new().with_column("f", json!({"1": 0.5})),
            Record::new().with_column("f", json!(null)),
        ];
        let rows = explode(&records, "f").unwrap();
        let pairs = rows
            .iter()
            .map(|row| (row.feature_id, row.value.scalars()[0]))
            .collect::<Vec<_>>();
        assert_eq!(pairs, vec![(1, 0.2), (2, 5.0), (1, 0.5)]);
    }

    #[test]
    fn test_explode_reports_record_index() {
        let records = vec![
            Record::new().with_column("f", json!({"1": 0.2})),
            Record::new().with_column("g", json!({"1": 0.2})),
        ];
        let err = explode(&records, "f").unwrap_err();
        assert!(matches!(
            err,
            SampleError::Column {
                record_index: 1,
                source: ColumnError::MissingColumn { .. }
            }
        ));
    }

    #[test]
    fn test_counts() {
        let mut all = rows(1, 30);
        all.extend(rows(2, 5));
        all.extend(rows(1, 10));
        let counts = FeatureCounts::from_rows(&all);
        assert_eq!(counts.get(1), Some(40));
        assert_eq!(counts.get(2), Some(5));
        assert_eq!(counts.get(3), None);
    }

    #[test]
    fn test_fractions() {
        let counts = FeatureCounts {
            counts: BTreeMap::from([(1, 400), (2, 100)]),
        };
        let fractions = SampleFractions::from_counts(&counts, 100).unwrap();
        assert_eq!(fractions.get(1), Some(0.25));
        assert_eq!(fractions.get(2), Some(1.0));
    }

    #[test]
    fn test_insufficient_population_names_smallest_feature() {
        let counts = FeatureCounts {
            counts: BTreeMap::from([(9, 10), (4, 99), (1, 1000)]),
        };
        let err = SampleFractions::from_counts(&counts, 100).unwrap_err();
        assert_eq!(err.feature_id, 4);
        assert_eq!(err.population_count, 99);
        assert_eq!(err.sample_size, 100);
    }

    #[test]
    fn test_full_fraction_keeps_every_row() {
        let all = rows(1, 20_000);
        let fractions = SampleFractions {
            fractions: HashMap::from([(1, 1.0)]),
        };
        assert_eq!(stratified_sample(&all, &fractions, 5), all);
    }

    #[test]
    fn test_rows_without_fraction_are_dropped() {
        let all = rows(3, 100);
        let sampled = stratified_sample(&all, &SampleFractions::default(), 5);
        assert!(sampled.is_empty());
    }

    #[test]
    fn test_same_seed_same_sample() {
        let mut all = rows(1, 30_000);
        all.extend(rows(2, 12_000));
        let counts = FeatureCounts::from_rows(&all);
        let fractions = SampleFractions::from_counts(&counts, 1000).unwrap();

        let first = stratified_sample(&all, &fractions, 42);
        let second = stratified_sample(&all, &fractions, 42);
        assert_eq!(first, second);

        let other = stratified_sample(&all, &fractions, 43);
        assert_ne!(first, other);
    }

    #[test]
    fn test_sample_independent_of_thread_count() {
        let mut all = rows(1, 3 * PARTITION_SIZE + 17);
        all.extend(rows(2, PARTITION_SIZE));
        let counts = FeatureCounts::from_rows(&all);
        let fractions = SampleFractions::from_counts(&counts, 500).unwrap();

        let sample_with_threads = |num_threads| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build()
                .unwrap()
                .install(|| stratified_sample(&all, &fractions, 7))
        };
        let single = sample_with_threads(1);
        assert!(!single.is_empty());
        assert_eq!(single, sample_with_threads(8));
        assert_eq!(single, stratified_sample(&all, &fractions, 7));
    }

    #[test]
    #[expect(clippy::cast_precision_loss)]
    fn test_sample_size_is_close_to_target() {
        let mut all = rows(1, 50_000);
        all.extend(rows(2, 2_000));
        let counts = FeatureCounts::from_rows(&all);
        let fractions = SampleFractions::from_counts(&counts, 1000).unwrap();

        for seed in [1, 2, 3] {
            let sampled = stratified_sample(&all, &fractions, seed);
            let sampled_counts = FeatureCounts::from_rows(&sampled);
            for (feature_id, population) in [(1, 50_000.0), (2, 2_000.0)] {
                let fraction: f64 = 1000.0 / population;
                let std_dev = (population * fraction * (1.0 - fraction)).sqrt();
                let actual = sampled_counts.get(feature_id).unwrap() as f64;
                assert!(
                    (actual - 1000.0).abs() < 5.0 * std_dev,
                    "feature {feature_id}: sampled {actual}"
                );
            }
        }
    }

    #[test]
    fn test_sample_feature_column_pipeline() {
        let records = (0..500)
            .map(|i| {
                Record::new().with_column("features", json!({"1": f64::from(i), "2": [i, i + 1]}))
            })
            .collect::<Vec<_>>();
        let aggregated = sample_feature_column(&records, "features", 500, 0).unwrap();
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].feature_name, 1);
        assert_eq!(aggregated[0].feature_values.len(), 500);
        // list entries are flattened
        assert_eq!(aggregated[1].feature_name, 2);
        assert_eq!(aggregated[1].feature_values.len(), 1000);
    }

    #[test]
    fn test_sample_feature_column_insufficient_population() {
        let records = (0..10)
            .map(|i| Record::new().with_column("features", json!({"1": i})))
            .collect::<Vec<_>>();
        let err = sample_feature_column(&records, "features", 11, 0).unwrap_err();
        assert!(matches!(
            err,
            SampleError::InsufficientPopulation(InsufficientPopulationError {
                feature_id: 1,
                population_count: 10,
                sample_size: 11,
            })
        ));
    }
}

//! End-to-end identification of normalization parameters for a table column

use crate::{
    options::PreprocessingOptions,
    parameters::NormalizationParamMap,
    processor::{NormalizationProcessor, ProcessError},
    sample::{self, SampleError},
    table::{SessionGuard, SourceError, TableSource, TableSpec},
};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum IdentifyError {
    #[display("failed to read table")]
    Source(SourceError),
    #[display("failed to sample feature column")]
    Sample(SampleError),
    #[display("failed to compute normalization parameters")]
    Process(ProcessError),
}

/// Samples a feature column of a table and identifies its normalization
/// parameters.
///
/// The session is stopped once the sample is materialized, and on every
/// error path before that. Parameter estimation runs after the session is
/// released.
///
/// # Arguments
///
/// * `source` - Table store to open the session on
/// * `table_spec` - Table to read
/// * `column_name` - Feature map column, e.g. `state_features`
/// * `options` - Sampling and normalization options
/// * `seed` - Seed for the stratified sample
pub fn identify_normalization_parameters<S>(
    source: &S,
    table_spec: &TableSpec,
    column_name: &str,
    options: &PreprocessingOptions,
    seed: u64,
) -> Result<NormalizationParamMap, IdentifyError>
where
    S: TableSource,
{
    tracing::info!(
        table = %table_spec,
        column = column_name,
        "identifying normalization parameters"
    );

    let samples = {
        let mut session = SessionGuard::new(source.open_session()?);
        let records = session.read_table(table_spec)?;
        sample::sample_feature_column(&records, column_name, options.num_samples, seed)?
    };

    let processor = NormalizationProcessor::new(options.normalization_options());
    let params = processor.process(&samples)?;
    tracing::info!(
        table = %table_spec,
        features = params.len(),
        "identified normalization parameters"
    );
    Ok(params)
}

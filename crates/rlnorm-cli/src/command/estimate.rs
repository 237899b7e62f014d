use std::path::PathBuf;

use anyhow::Context;
use rlnorm_identify::processor::NormalizationProcessor;
use serde_json::Value;

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EstimateArg {
    /// JSON file with an array of `{"feature_name", "feature_values"}` rows
    rows: PathBuf,
    /// Preprocessing options JSON file
    #[arg(long)]
    options: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &EstimateArg) -> anyhow::Result<()> {
    let EstimateArg {
        rows,
        options,
        output,
    } = arg;

    let options = util::read_options_file(options.as_deref())?;
    let values: Vec<Value> = util::read_json_file("aggregated samples", rows)?;
    tracing::info!(rows = values.len(), "loaded aggregated samples");

    let processor = NormalizationProcessor::new(options.normalization_options());
    let parameters = processor.process_json_rows(&values).with_context(|| {
        format!(
            "Failed to compute normalization parameters from {}",
            rows.display()
        )
    })?;

    Output::save_json(&parameters, output.clone())?;
    Ok(())
}

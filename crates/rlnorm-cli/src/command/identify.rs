use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rlnorm_identify::{
    identify::identify_normalization_parameters,
    parameters::NormalizationParamMap,
    table::{JsonLinesTableSource, TableSpec},
};
use serde::{Deserialize, Serialize};

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct IdentifyArg {
    /// Name of the table to read
    table: String,
    /// Directory containing `<TABLE>.jsonl`
    #[arg(long)]
    table_dir: PathBuf,
    /// Feature map column to sample
    #[arg(long, default_value = "state_features")]
    column: String,
    /// Preprocessing options JSON file
    #[arg(long)]
    options: Option<PathBuf>,
    /// Target number of samples per feature, overriding the options file
    #[arg(long)]
    num_samples: Option<u64>,
    /// Seed for the stratified sample
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Identification result written by `rlnorm identify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IdentifyReport {
    pub identified_at: DateTime<Utc>,
    pub table_name: String,
    pub column_name: String,
    pub seed: u64,
    pub num_samples: u64,
    pub parameters: NormalizationParamMap,
}

pub(crate) fn run(arg: &IdentifyArg) -> anyhow::Result<()> {
    let IdentifyArg {
        table,
        table_dir,
        column,
        options,
        num_samples,
        seed,
        output,
    } = arg;

    let mut options = util::read_options_file(options.as_deref())?;
    if let Some(num_samples) = num_samples {
        options.num_samples = *num_samples;
    }

    let source = JsonLinesTableSource::new(table_dir);
    let table_spec = TableSpec::new(table);
    let parameters =
        identify_normalization_parameters(&source, &table_spec, column, &options, *seed)
            .with_context(|| {
                format!(
                    "Failed to identify normalization parameters for {table_spec} in {}",
                    table_dir.display()
                )
            })?;

    let report = IdentifyReport {
        identified_at: Utc::now(),
        table_name: table.clone(),
        column_name: column.clone(),
        seed: *seed,
        num_samples: options.num_samples,
        parameters,
    };
    Output::save_json(&report, output.clone())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rlnorm_identify::{identify::IdentifyError, parameters::FeatureType, table::SourceError};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn arg(table: &str, table_dir: &TempDir) -> IdentifyArg {
        IdentifyArg {
            table: table.to_owned(),
            table_dir: table_dir.path().to_path_buf(),
            column: "state_features".to_owned(),
            options: None,
            num_samples: Some(100),
            seed: 3,
            output: Some(table_dir.path().join("report.json")),
        }
    }

    #[test]
    fn test_identify_writes_report() {
        let dir = TempDir::new().unwrap();
        let lines = (0..300)
            .map(|i| json!({"state_features": {"1": i % 2, "2": i % 5}}).to_string())
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(dir.path().join("transitions.jsonl"), lines).unwrap();

        run(&arg("transitions", &dir)).unwrap();

        let report: IdentifyReport =
            util::read_json_file("report", dir.path().join("report.json")).unwrap();
        assert_eq!(report.table_name, "transitions");
        assert_eq!(report.num_samples, 100);
        assert_eq!(report.seed, 3);
        assert_eq!(report.parameters[&1].feature_type, FeatureType::Binary);
        assert_eq!(report.parameters[&2].feature_type, FeatureType::Enum);
    }

    #[test]
    fn test_identify_missing_table() {
        let dir = TempDir::new().unwrap();
        let err = run(&arg("transitions", &dir)).unwrap_err();
        let err = err
            .downcast_ref::<IdentifyError>()
            .expect("error should come from identification");
        assert!(matches!(
            err,
            IdentifyError::Source(SourceError::TableNotFound { table_name })
                if table_name == "transitions"
        ));
        assert!(!dir.path().join("report.json").exists());
    }
}

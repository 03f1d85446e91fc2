use std::error::Error;
use std::path::PathBuf;

use chrono::prelude::*;
use rand::prelude::*;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::charts::{BucketHistogram, ChartData};
use crate::classifier::LinearClassifier;
use crate::columns::build_layout;
use crate::config::RunConfig;
use crate::dataset::{CensusDataSet, NumericColumn};
use crate::prepare::prepare_partitions;
use crate::report::{write_report, RunReport};
use crate::training::{EncodedSet, Schedule, TrainingLoop};

mod charts;
mod classifier;
mod columns;
mod config;
mod csv_reader;
mod dataset;
mod logging;
mod metrics;
mod prepare;
mod quantile;
mod report;
mod training;

/// Buckets used for the histogram of raw ages shown before training.
const PREVIEW_BUCKETS: usize = 5;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Load(#[from] csv_reader::LoadError),
    #[error(transparent)]
    Split(#[from] dataset::SplitError),
    #[error(transparent)]
    Quantile(#[from] quantile::QuantileError),
    #[error(transparent)]
    Feature(#[from] columns::FeatureError),
    #[error(transparent)]
    Report(#[from] report::ReportError),
    #[error(transparent)]
    Chart(#[from] charts::ChartError),
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init()?;
    let config = match std::env::args().nth(1) {
        Some(path) => RunConfig::load(&PathBuf::from(path))?,
        None => {
            let config = RunConfig::default();
            config.validate()?;
            config
        }
    };
    if let Err(err) = run(&config) {
        tracing::error!("{}", err);
        return Err(err.into());
    }
    Ok(())
}

fn run(config: &RunConfig) -> Result<(), AppError> {
    let dataset = CensusDataSet::new(csv_reader::load(&config.data_source)?);
    tracing::debug!(columns = ?dataset.columns(), "census columns");

    let ages = dataset.numeric_values(NumericColumn::Age);
    let age_boundaries = quantile::quantile_boundaries(&ages, PREVIEW_BUCKETS)?;
    println!("boundaries are: {:?}", age_boundaries);
    let histogram = BucketHistogram::new(NumericColumn::Age.name(), &ages, age_boundaries);

    let seed = config.seed.unwrap_or_else(|| thread_rng().gen());
    tracing::info!(seed, "shuffling census rows");
    let mut rng = StdRng::seed_from_u64(seed);
    let (training, validation) =
        dataset.shuffle_split(&mut rng, config.training_size, config.validation_size)?;
    let (training, validation) = prepare_partitions(training, validation, config.scaling);
    tracing::info!(
        training_rows = training.len(),
        validation_rows = validation.len(),
        positive_rate = training.positive_rate(),
        scaling = ?config.scaling,
        "partitions prepared"
    );

    let layout = build_layout(&config.features, &training)?;
    for column in layout.columns() {
        tracing::info!(cardinality = column.cardinality(), "feature column {}", column);
    }
    let training_set = EncodedSet::encode(&layout, &training);
    let validation_set = EncodedSet::encode(&layout, &validation);

    let mut model = LinearClassifier::new(layout.dimension(), config.learning_rate, config.clip_norm());
    let schedule = Schedule {
        steps: config.steps,
        periods: config.periods,
    };
    let mut training_loop = TrainingLoop::new(&mut model, schedule);
    let training_report = training_loop.run(&training_set, &validation_set);
    tracing::debug!(state = ?training_loop.state(), "training loop finished");
    tracing::debug!(
        bias = model.bias(),
        steps = model.steps_taken(),
        nonzero_weights = model.weights().iter().filter(|w| **w != 0.0).count(),
        "model trained"
    );

    if let Some(path) = &config.report_path {
        let run_report = RunReport {
            finished_at: Utc::now(),
            learning_rate: config.learning_rate,
            steps: config.steps,
            feature_columns: layout.columns().iter().map(|c| c.to_string()).collect(),
            boundaries: layout.columns().iter().flat_map(|c| c.bucket_boundaries()).collect(),
            training: &training_report,
        };
        write_report(path, &run_report)?;
    }

    if config.interactive {
        let data = ChartData {
            report: &training_report,
            histogram,
        };
        charts::show(&data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn census_csv(rows: usize) -> String {
        (0..rows)
            .map(|i| {
                let age = 18 + (i * 7) % 60;
                let (gender, income, gain) = if age > 40 {
                    ("Male", ">50K", 5000 + i)
                } else {
                    ("Female", "<=50K", 0)
                };
                format!(
                    "{age}, Private, 77516, Bachelors, 13, Never-married, Adm-clerical, \
                     Not-in-family, White, {gender}, {gain}, 0, 40, United-States, {income}\n"
                )
            })
            .collect()
    }

    #[test]
    fn run_trains_from_local_csv_and_writes_report() {
        let mut data = tempfile::NamedTempFile::new().unwrap();
        data.write_all(census_csv(40).as_bytes()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("report.json");

        let config = RunConfig {
            data_source: data.path().to_str().unwrap().to_string(),
            steps: 20,
            periods: 4,
            training_size: 28,
            validation_size: 10,
            seed: Some(3),
            interactive: false,
            report_path: Some(report_path.clone()),
            ..RunConfig::default()
        };
        config.validate().unwrap();
        run(&config).unwrap();

        let file = std::fs::File::open(&report_path).unwrap();
        let report: serde_json::Value = serde_json::from_reader(file).unwrap();
        assert_eq!(report["training_losses"].as_array().unwrap().len(), 4);
        assert_eq!(report["validation_losses"].as_array().unwrap().len(), 4);
        assert_eq!(report["steps"], 20);
        assert_eq!(report["feature_columns"].as_array().unwrap().len(), 5);
        assert!(report["auc"].as_f64().unwrap() >= 0.0);
    }

    #[test]
    fn run_reports_too_small_dataset() {
        let mut data = tempfile::NamedTempFile::new().unwrap();
        data.write_all(census_csv(5).as_bytes()).unwrap();
        let config = RunConfig {
            data_source: data.path().to_str().unwrap().to_string(),
            interactive: false,
            ..RunConfig::default()
        };
        assert!(matches!(run(&config), Err(AppError::Split(_))));
    }
}

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::training::TrainingReport;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create {path}: {source}")]
    Create { path: PathBuf, source: std::io::Error },
    #[error("failed to write report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Summary of one run as written to `report_path`.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub finished_at: DateTime<Utc>,
    pub learning_rate: f64,
    pub steps: usize,
    pub feature_columns: Vec<String>,
    pub boundaries: Vec<(String, Vec<f64>)>,
    #[serde(flatten)]
    pub training: &'a TrainingReport,
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<(), ReportError> {
    let file = File::create(path).map_err(|source| ReportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    tracing::info!(path = %path.display(), "run report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::roc_curve;

    #[test]
    fn report_serializes_losses_and_roc() {
        let roc = roc_curve(&[0.0, 1.0], &[0.2, 0.8]);
        let training = TrainingReport {
            training_losses: vec![0.6, 0.5],
            validation_losses: vec![0.62, 0.55],
            validation_accuracy: 1.0,
            auc: roc.auc(),
            roc,
        };
        let report = RunReport {
            finished_at: Utc::now(),
            learning_rate: 0.5,
            steps: 100,
            feature_columns: vec!["age_buckets".to_string()],
            boundaries: vec![("age_buckets".to_string(), vec![0.1, 0.2])],
            training: &training,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &report).unwrap();

        let value: serde_json::Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["steps"], 100);
        assert_eq!(value["training_losses"][1], 0.5);
        assert_eq!(value["auc"], 1.0);
        assert_eq!(value["roc"]["true_positive_rates"].as_array().unwrap().len(), 3);
    }
}

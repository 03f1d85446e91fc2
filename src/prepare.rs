use serde::{Deserialize, Serialize};

use crate::csv_reader::Record;
use crate::dataset::NumericColumn;

const OVER_50K_MARKER: &str = ">50K";

/// How each partition's numeric columns are rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Every partition uses its own min/max.
    #[default]
    PerPartition,
    /// Every partition uses the training partition's min/max.
    Training,
}

/// Min and max of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn of(values: &[f64]) -> Range {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Range { min, max }
    }

    /// Maps `value` onto [0, 1]. A zero-width range maps everything to 0.
    pub fn scale(&self, value: f64) -> f64 {
        let width = self.max - self.min;
        if width > 0.0 {
            (value - self.min) / width
        } else {
            0.0
        }
    }
}

pub fn income_label(income_bracket: &str) -> u8 {
    u8::from(income_bracket.contains(OVER_50K_MARKER))
}

/// Census rows with their rescaled numeric columns and derived labels.
pub struct PreparedFrame {
    pub records: Vec<Record>,
    scaled: Vec<Vec<f64>>,
    pub ranges: Vec<Range>,
    pub labels: Vec<u8>,
}

impl PreparedFrame {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn scaled(&self, column: NumericColumn) -> &[f64] {
        &self.scaled[column.index()]
    }

    pub fn labels_f64(&self) -> Vec<f64> {
        self.labels.iter().map(|l| *l as f64).collect()
    }

    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|l| **l == 1).count() as f64 / self.labels.len() as f64
    }
}

/// Rescales every numeric column and derives the label. When `reference`
/// is given its ranges are used instead of this partition's own.
pub fn prepare_features(records: Vec<Record>, reference: Option<&[Range]>) -> PreparedFrame {
    let mut scaled = Vec::with_capacity(NumericColumn::ALL.len());
    let mut ranges = Vec::with_capacity(NumericColumn::ALL.len());
    for column in NumericColumn::ALL {
        let raw: Vec<f64> = records.iter().map(|r| column.value(r)).collect();
        let range = match reference {
            Some(ranges) => ranges[column.index()],
            None => Range::of(&raw),
        };
        scaled.push(raw.iter().map(|v| range.scale(*v)).collect());
        ranges.push(range);
    }
    let labels = records.iter().map(|r| income_label(&r.income_bracket)).collect();
    PreparedFrame { records, scaled, ranges, labels }
}

/// Prepares both partitions according to `scaling`.
pub fn prepare_partitions(
    training: Vec<Record>,
    validation: Vec<Record>,
    scaling: Scaling,
) -> (PreparedFrame, PreparedFrame) {
    let training = prepare_features(training, None);
    let validation = match scaling {
        Scaling::PerPartition => prepare_features(validation, None),
        Scaling::Training => prepare_features(validation, Some(&training.ranges)),
    };
    (training, validation)
}

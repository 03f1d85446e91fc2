//! Feature column descriptors and the encoder that turns prepared census rows
//! into sparse feature vectors for the linear model.
//!
//! Every column owns a contiguous slice of the model's weight vector:
//!
//! ```text
//! | age_buckets (5) | gender (2) | education (50) | gender_x_age_buckets (1000) | ...
//! ```
//!
//! Categorical, bucketized and crossed columns emit at most one active index
//! with value 1.0 per row; numeric columns emit their scaled value.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::{CategoricalColumn, ColumnError, NumericColumn};
use crate::prepare::PreparedFrame;
use crate::quantile::{bucket_index, quantile_boundaries, QuantileError};

const CROSS_SEPARATOR: &str = "_X_";

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error("bucket boundaries for `{column}`: {source}")]
    Quantile { column: String, source: QuantileError },
    #[error("`{0}` has an empty vocabulary")]
    EmptyVocabulary(String),
    #[error("`{0}` needs a hash bucket size above zero")]
    ZeroBuckets(String),
    #[error("a cross needs at least two parts, got {0}")]
    TooFewCrossParts(usize),
    #[error("`{0}` cannot be crossed; only categorical and bucketized columns can")]
    NotCrossable(String),
}

/// One active entry of a feature vector.
pub type SparseRow = Vec<(usize, f64)>;

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureColumn {
    /// The scaled value itself.
    Numeric { column: NumericColumn },
    /// Categorical column with a fixed, ordered vocabulary.
    Vocabulary { column: CategoricalColumn, keys: Vec<String> },
    /// Categorical column whose values are hashed into buckets.
    Hashed { column: CategoricalColumn, hash_bucket_size: usize },
    /// Numeric column split at the given boundaries.
    Bucketized { source: NumericColumn, boundaries: Vec<f64> },
    /// Hash-folded Cartesian product of categorical or bucketized columns.
    Crossed { parts: Vec<FeatureColumn>, hash_bucket_size: usize },
}

impl FeatureColumn {
    pub fn numeric(column: NumericColumn) -> Self {
        FeatureColumn::Numeric { column }
    }

    pub fn with_keys<S: Into<String>>(
        column: CategoricalColumn,
        keys: impl IntoIterator<Item = S>,
    ) -> Result<Self, FeatureError> {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(FeatureError::EmptyVocabulary(column.name().to_string()));
        }
        Ok(FeatureColumn::Vocabulary { column, keys })
    }

    pub fn with_hash_bucket(column: CategoricalColumn, hash_bucket_size: usize) -> Result<Self, FeatureError> {
        if hash_bucket_size == 0 {
            return Err(FeatureError::ZeroBuckets(column.name().to_string()));
        }
        Ok(FeatureColumn::Hashed { column, hash_bucket_size })
    }

    pub fn bucketized(source: NumericColumn, boundaries: Vec<f64>) -> Self {
        FeatureColumn::Bucketized { source, boundaries }
    }

    pub fn crossed(parts: Vec<FeatureColumn>, hash_bucket_size: usize) -> Result<Self, FeatureError> {
        if parts.len() < 2 {
            return Err(FeatureError::TooFewCrossParts(parts.len()));
        }
        if let Some(part) = parts.iter().find(|p| !p.is_crossable()) {
            return Err(FeatureError::NotCrossable(part.name()));
        }
        let column = FeatureColumn::Crossed { parts, hash_bucket_size };
        if hash_bucket_size == 0 {
            return Err(FeatureError::ZeroBuckets(column.name()));
        }
        Ok(column)
    }

    fn is_crossable(&self) -> bool {
        matches!(
            self,
            FeatureColumn::Vocabulary { .. } | FeatureColumn::Hashed { .. } | FeatureColumn::Bucketized { .. }
        )
    }

    pub fn name(&self) -> String {
        match self {
            FeatureColumn::Numeric { column } => column.name().to_string(),
            FeatureColumn::Vocabulary { column, .. } | FeatureColumn::Hashed { column, .. } => {
                column.name().to_string()
            }
            FeatureColumn::Bucketized { source, .. } => format!("{}_buckets", source.name()),
            FeatureColumn::Crossed { parts, .. } => {
                parts.iter().map(|p| p.name()).collect::<Vec<_>>().join("_x_")
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FeatureColumn::Numeric { .. } => "numeric",
            FeatureColumn::Vocabulary { .. } => "vocabulary",
            FeatureColumn::Hashed { .. } => "hashed",
            FeatureColumn::Bucketized { .. } => "bucketized",
            FeatureColumn::Crossed { .. } => "crossed",
        }
    }

    /// Number of weights the column occupies.
    pub fn dimension(&self) -> usize {
        match self {
            FeatureColumn::Numeric { .. } => 1,
            FeatureColumn::Vocabulary { keys, .. } => keys.len(),
            FeatureColumn::Hashed { hash_bucket_size, .. } => *hash_bucket_size,
            FeatureColumn::Bucketized { boundaries, .. } => boundaries.len() + 1,
            FeatureColumn::Crossed { hash_bucket_size, .. } => *hash_bucket_size,
        }
    }

    /// Number of distinct values before any hash folding. For a cross this is
    /// the product of its parts' cardinalities.
    pub fn cardinality(&self) -> usize {
        match self {
            FeatureColumn::Crossed { parts, .. } => parts
                .iter()
                .fold(1usize, |acc, p| acc.saturating_mul(p.cardinality())),
            other => other.dimension(),
        }
    }

    /// Boundaries of every bucketized column in this column, crosses included.
    pub fn bucket_boundaries(&self) -> Vec<(String, Vec<f64>)> {
        match self {
            FeatureColumn::Bucketized { boundaries, .. } => vec![(self.name(), boundaries.clone())],
            FeatureColumn::Crossed { parts, .. } => parts.iter().flat_map(|p| p.bucket_boundaries()).collect(),
            _ => Vec::new(),
        }
    }

    /// Local index and value of the active feature for `row`, if any.
    pub fn lookup(&self, frame: &PreparedFrame, row: usize) -> Option<(usize, f64)> {
        match self {
            FeatureColumn::Numeric { column } => Some((0, frame.scaled(*column)[row])),
            FeatureColumn::Vocabulary { column, keys } => {
                let value = column.value(&frame.records[row]);
                keys.iter().position(|k| k == value).map(|i| (i, 1.0))
            }
            FeatureColumn::Hashed { column, hash_bucket_size } => {
                let value = column.value(&frame.records[row]);
                Some((hash_bucket(value, *hash_bucket_size), 1.0))
            }
            FeatureColumn::Bucketized { source, boundaries } => {
                Some((bucket_index(boundaries, frame.scaled(*source)[row]), 1.0))
            }
            FeatureColumn::Crossed { parts, hash_bucket_size } => {
                let tokens = parts
                    .iter()
                    .map(|p| p.token(frame, row))
                    .collect::<Option<Vec<_>>>()?;
                Some((hash_bucket(&tokens.join(CROSS_SEPARATOR), *hash_bucket_size), 1.0))
            }
        }
    }

    /// Identifies this part's value inside a cross.
    fn token(&self, frame: &PreparedFrame, row: usize) -> Option<String> {
        match self {
            FeatureColumn::Vocabulary { column, keys } => {
                let value = column.value(&frame.records[row]);
                keys.iter().any(|k| k == value).then(|| format!("{}={}", column.name(), value))
            }
            FeatureColumn::Hashed { column, .. } => {
                Some(format!("{}={}", column.name(), column.value(&frame.records[row])))
            }
            FeatureColumn::Bucketized { .. } => {
                let (bucket, _) = self.lookup(frame, row)?;
                Some(format!("{}={}", self.name(), bucket))
            }
            FeatureColumn::Numeric { .. } | FeatureColumn::Crossed { .. } => None,
        }
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}, {} dims)", self.name(), self.kind(), self.dimension())
    }
}

/// Stable 64-bit fingerprint of a string.
pub fn fingerprint(value: &str) -> u64 {
    let hash = blake3::hash(value.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

fn hash_bucket(value: &str, hash_bucket_size: usize) -> usize {
    (fingerprint(value) % hash_bucket_size as u64) as usize
}

/// Feature columns laid out side by side in one weight vector.
#[derive(Debug, Clone)]
pub struct FeatureLayout {
    columns: Vec<FeatureColumn>,
    offsets: Vec<usize>,
    dimension: usize,
}

impl FeatureLayout {
    pub fn new(columns: Vec<FeatureColumn>) -> Self {
        let mut offsets = Vec::with_capacity(columns.len());
        let mut dimension = 0;
        for column in &columns {
            offsets.push(dimension);
            dimension += column.dimension();
        }
        FeatureLayout { columns, offsets, dimension }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn encode_row(&self, frame: &PreparedFrame, row: usize) -> SparseRow {
        self.columns
            .iter()
            .zip(&self.offsets)
            .filter_map(|(column, offset)| {
                column.lookup(frame, row).map(|(index, value)| (offset + index, value))
            })
            .collect()
    }

    pub fn encode(&self, frame: &PreparedFrame) -> Vec<SparseRow> {
        (0..frame.len()).map(|row| self.encode_row(frame, row)).collect()
    }
}

/// Declarative feature column as written in the config file. Bucket
/// boundaries are resolved against the training partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureSpec {
    Numeric { column: String },
    Vocabulary { column: String, keys: Vec<String> },
    Hashed { column: String, hash_bucket_size: usize },
    Bucketized { column: String, buckets: usize },
    Crossed { parts: Vec<FeatureSpec>, hash_bucket_size: usize },
}

impl FeatureSpec {
    pub fn resolve(&self, training: &PreparedFrame) -> Result<FeatureColumn, FeatureError> {
        match self {
            FeatureSpec::Numeric { column } => Ok(FeatureColumn::numeric(column.parse()?)),
            FeatureSpec::Vocabulary { column, keys } => FeatureColumn::with_keys(column.parse()?, keys.clone()),
            FeatureSpec::Hashed { column, hash_bucket_size } => {
                FeatureColumn::with_hash_bucket(column.parse()?, *hash_bucket_size)
            }
            FeatureSpec::Bucketized { column, buckets } => {
                let source: NumericColumn = column.parse()?;
                let boundaries = quantile_boundaries(training.scaled(source), *buckets)
                    .map_err(|err| FeatureError::Quantile { column: column.clone(), source: err })?;
                Ok(FeatureColumn::bucketized(source, boundaries))
            }
            FeatureSpec::Crossed { parts, hash_bucket_size } => {
                let parts = parts
                    .iter()
                    .map(|p| p.resolve(training))
                    .collect::<Result<Vec<_>, _>>()?;
                FeatureColumn::crossed(parts, *hash_bucket_size)
            }
        }
    }
}

/// Resolves every spec against the training partition into one layout.
pub fn build_layout(specs: &[FeatureSpec], training: &PreparedFrame) -> Result<FeatureLayout, FeatureError> {
    let columns = specs
        .iter()
        .map(|spec| spec.resolve(training))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FeatureLayout::new(columns))
}

fn bucketized(column: &str, buckets: usize) -> FeatureSpec {
    FeatureSpec::Bucketized { column: column.to_string(), buckets }
}

/// Age buckets, gender, hashed education, gender x age buckets and
/// capital gain x capital loss buckets.
pub fn default_feature_specs() -> Vec<FeatureSpec> {
    let gender = FeatureSpec::Vocabulary {
        column: "gender".to_string(),
        keys: vec!["Female".to_string(), "Male".to_string()],
    };
    vec![
        bucketized("age", 5),
        gender.clone(),
        FeatureSpec::Hashed { column: "education".to_string(), hash_bucket_size: 50 },
        FeatureSpec::Crossed { parts: vec![gender, bucketized("age", 5)], hash_bucket_size: 1000 },
        FeatureSpec::Crossed {
            parts: vec![bucketized("capital_gain", 100), bucketized("capital_loss", 100)],
            hash_bucket_size: 1000,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_reader::tests::record_with;
    use crate::prepare::prepare_features;

    fn frame() -> PreparedFrame {
        let mut records = vec![
            record_with(20, "Female", "<=50K"),
            record_with(30, "Male", "<=50K"),
            record_with(40, "Male", ">50K"),
            record_with(50, "Unknown", ">50K"),
            record_with(60, "Female", "<=50K"),
        ];
        records[2].education = "Masters".to_string();
        records[3].capital_gain = 5000;
        prepare_features(records, None)
    }

    #[test]
    fn vocabulary_maps_keys_in_order_and_drops_unknown() {
        let frame = frame();
        let gender = FeatureColumn::with_keys(CategoricalColumn::Gender, ["Female", "Male"]).unwrap();
        assert_eq!(gender.lookup(&frame, 0), Some((0, 1.0)));
        assert_eq!(gender.lookup(&frame, 1), Some((1, 1.0)));
        assert_eq!(gender.lookup(&frame, 3), None);
        assert_eq!(gender.dimension(), 2);
    }

    #[test]
    fn hashed_indices_stay_in_range_and_are_stable() {
        let frame = frame();
        let education = FeatureColumn::with_hash_bucket(CategoricalColumn::Education, 7).unwrap();
        for row in 0..frame.len() {
            let (index, value) = education.lookup(&frame, row).unwrap();
            assert!(index < 7);
            assert_eq!(value, 1.0);
        }
        assert_eq!(education.lookup(&frame, 0), education.lookup(&frame, 1));
        assert_eq!(fingerprint("Bachelors"), fingerprint("Bachelors"));
        assert_ne!(fingerprint("Bachelors"), fingerprint("Masters"));
    }

    #[test]
    fn bucketized_uses_scaled_values() {
        let frame = frame();
        let age = FeatureColumn::bucketized(NumericColumn::Age, vec![0.3, 0.6]);
        assert_eq!(age.dimension(), 3);
        assert_eq!(age.lookup(&frame, 0), Some((0, 1.0)));
        assert_eq!(age.lookup(&frame, 2), Some((1, 1.0)));
        assert_eq!(age.lookup(&frame, 4), Some((2, 1.0)));
        assert_eq!(age.name(), "age_buckets");
    }

    #[test]
    fn cross_reports_cardinality_and_folds_into_buckets() {
        let frame = frame();
        let gender = FeatureColumn::with_keys(CategoricalColumn::Gender, ["Female", "Male"]).unwrap();
        let age = FeatureColumn::bucketized(NumericColumn::Age, vec![0.2, 0.4, 0.6, 0.8]);
        let cross = FeatureColumn::crossed(vec![gender, age], 16).unwrap();
        assert_eq!(cross.name(), "gender_x_age_buckets");
        assert_eq!(cross.cardinality(), 10);
        assert_eq!(cross.dimension(), 16);
        for row in [0, 1, 2, 4] {
            let (index, _) = cross.lookup(&frame, row).unwrap();
            assert!(index < 16);
        }
        // out-of-vocabulary gender drops the whole cross
        assert_eq!(cross.lookup(&frame, 3), None);
    }

    #[test]
    fn cross_rejects_numeric_parts_and_single_parts() {
        let age = FeatureColumn::numeric(NumericColumn::Age);
        let gender = FeatureColumn::with_keys(CategoricalColumn::Gender, ["Female"]).unwrap();
        assert!(matches!(
            FeatureColumn::crossed(vec![age, gender.clone()], 10),
            Err(FeatureError::NotCrossable(name)) if name == "age"
        ));
        assert!(matches!(
            FeatureColumn::crossed(vec![gender.clone()], 10),
            Err(FeatureError::TooFewCrossParts(1))
        ));
        let hashed = FeatureColumn::with_hash_bucket(CategoricalColumn::Race, 3).unwrap();
        assert!(matches!(
            FeatureColumn::crossed(vec![gender, hashed], 0),
            Err(FeatureError::ZeroBuckets(_))
        ));
    }

    #[test]
    fn layout_offsets_columns_into_one_vector() {
        let frame = frame();
        let layout = build_layout(&default_feature_specs(), &frame).unwrap();
        let dims: Vec<usize> = layout.columns().iter().map(|c| c.dimension()).collect();
        assert_eq!(dims, vec![5, 2, 50, 1000, 1000]);
        assert_eq!(layout.dimension(), 2057);

        let row = layout.encode_row(&frame, 0);
        assert_eq!(row.len(), 5);
        assert!(row.iter().all(|(index, _)| *index < layout.dimension()));
        assert!(row[1].0 >= 5 && row[1].0 < 7);

        // unknown gender drops the vocabulary column and its cross
        assert_eq!(layout.encode_row(&frame, 3).len(), 3);
    }

    #[test]
    fn spec_resolution_reports_unknown_columns() {
        let frame = frame();
        let spec = FeatureSpec::Bucketized { column: "height".to_string(), buckets: 4 };
        assert!(matches!(spec.resolve(&frame), Err(FeatureError::Column(_))));
        let spec = FeatureSpec::Bucketized { column: "age".to_string(), buckets: 1 };
        assert!(matches!(spec.resolve(&frame), Err(FeatureError::Quantile { .. })));
    }
}

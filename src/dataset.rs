use std::fmt;
use std::str::FromStr;

use rand::prelude::*;
use thiserror::Error;

use crate::csv_reader::Record;

pub const COLUMNS: &'static [&'static str] = &[
    "age", "workclass", "sample_weight", "education", "education_num",
    "marital_status", "occupation", "relationship", "race", "gender",
    "capital_gain", "capital_loss", "hours_per_week", "native_country",
    "income_bracket",
];

#[derive(Debug, Error)]
pub enum ColumnError {
    #[error("unknown numeric column `{0}`")]
    UnknownNumeric(String),
    #[error("unknown categorical column `{0}`")]
    UnknownCategorical(String),
}

#[derive(Debug, Error)]
#[error("dataset has {available} rows but {training} training + {validation} validation were requested")]
pub struct SplitError {
    pub available: usize,
    pub training: usize,
    pub validation: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericColumn {
    Age,
    EducationNum,
    CapitalGain,
    CapitalLoss,
    HoursPerWeek,
}

impl NumericColumn {
    pub const ALL: [NumericColumn; 5] = [
        NumericColumn::Age,
        NumericColumn::EducationNum,
        NumericColumn::CapitalGain,
        NumericColumn::CapitalLoss,
        NumericColumn::HoursPerWeek,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NumericColumn::Age => "age",
            NumericColumn::EducationNum => "education_num",
            NumericColumn::CapitalGain => "capital_gain",
            NumericColumn::CapitalLoss => "capital_loss",
            NumericColumn::HoursPerWeek => "hours_per_week",
        }
    }

    /// Position of the column inside `NumericColumn::ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn value(self, record: &Record) -> f64 {
        match self {
            NumericColumn::Age => record.age as f64,
            NumericColumn::EducationNum => record.education_num as f64,
            NumericColumn::CapitalGain => record.capital_gain as f64,
            NumericColumn::CapitalLoss => record.capital_loss as f64,
            NumericColumn::HoursPerWeek => record.hours_per_week as f64,
        }
    }
}

impl fmt::Display for NumericColumn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for NumericColumn {
    type Err = ColumnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NumericColumn::ALL
            .into_iter()
            .find(|column| column.name() == s)
            .ok_or_else(|| ColumnError::UnknownNumeric(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoricalColumn {
    Workclass,
    Education,
    MaritalStatus,
    Occupation,
    Relationship,
    Race,
    Gender,
    NativeCountry,
}

impl CategoricalColumn {
    pub const ALL: [CategoricalColumn; 8] = [
        CategoricalColumn::Workclass,
        CategoricalColumn::Education,
        CategoricalColumn::MaritalStatus,
        CategoricalColumn::Occupation,
        CategoricalColumn::Relationship,
        CategoricalColumn::Race,
        CategoricalColumn::Gender,
        CategoricalColumn::NativeCountry,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CategoricalColumn::Workclass => "workclass",
            CategoricalColumn::Education => "education",
            CategoricalColumn::MaritalStatus => "marital_status",
            CategoricalColumn::Occupation => "occupation",
            CategoricalColumn::Relationship => "relationship",
            CategoricalColumn::Race => "race",
            CategoricalColumn::Gender => "gender",
            CategoricalColumn::NativeCountry => "native_country",
        }
    }

    pub fn value(self, record: &Record) -> &str {
        match self {
            CategoricalColumn::Workclass => &record.workclass,
            CategoricalColumn::Education => &record.education,
            CategoricalColumn::MaritalStatus => &record.marital_status,
            CategoricalColumn::Occupation => &record.occupation,
            CategoricalColumn::Relationship => &record.relationship,
            CategoricalColumn::Race => &record.race,
            CategoricalColumn::Gender => &record.gender,
            CategoricalColumn::NativeCountry => &record.native_country,
        }
    }
}

impl fmt::Display for CategoricalColumn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CategoricalColumn {
    type Err = ColumnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoricalColumn::ALL
            .into_iter()
            .find(|column| column.name() == s)
            .ok_or_else(|| ColumnError::UnknownCategorical(s.to_string()))
    }
}

/// The loaded census rows, in load order until shuffled.
pub struct CensusDataSet {
    pub records: Vec<Record>,
}

impl CensusDataSet {
    pub fn new(records: Vec<Record>) -> Self {
        CensusDataSet { records }
    }

    pub fn columns(&self) -> Vec<&'static str> {
        Vec::from(COLUMNS)
    }

    pub fn numeric_values(&self, column: NumericColumn) -> Vec<f64> {
        self.records.iter().map(|r| column.value(r)).collect()
    }

    /// Shuffles the rows, then takes the first `training` rows and the last
    /// `validation` rows. The two partitions never share a row.
    pub fn shuffle_split<R: Rng + ?Sized>(
        mut self,
        rng: &mut R,
        training: usize,
        validation: usize,
    ) -> Result<(Vec<Record>, Vec<Record>), SplitError> {
        let available = self.records.len();
        if training.checked_add(validation).map_or(true, |n| n > available) {
            return Err(SplitError { available, training, validation });
        }
        self.records.shuffle(rng);
        let validation_rows = self.records.split_off(available - validation);
        self.records.truncate(training);
        Ok((self.records, validation_rows))
    }
}

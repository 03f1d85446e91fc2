use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::dataset::COLUMNS;

/// Upper bound on a downloaded dataset; adult.data is under 4 MiB.
const MAX_DOWNLOAD_BYTES: u64 = 64 * 1024 * 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed census row: {0}")]
    Csv(#[from] csv::Error),
    #[error("census row on line {line} has {found} columns, expected {expected}")]
    ColumnCount { line: u64, found: usize, expected: usize },
    #[error("no census rows found in {0}")]
    Empty(String),
}

/// One row of the census table, in file column order.
#[derive(Debug, serde::Deserialize, Clone, PartialEq)]
pub struct Record {
    pub age: u32,
    pub workclass: String,
    #[allow(dead_code)]
    pub sample_weight: u32,
    pub education: String,
    pub education_num: u32,
    pub marital_status: String,
    pub occupation: String,
    pub relationship: String,
    pub race: String,
    pub gender: String,
    pub capital_gain: u32,
    pub capital_loss: u32,
    pub hours_per_week: u32,
    pub native_country: String,
    pub income_bracket: String,
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Loads census rows from an http(s) URL or a local file path.
pub fn load(source: &str) -> Result<Vec<Record>, LoadError> {
    let records = if is_remote(source) {
        tracing::info!(url = source, "downloading census data");
        let bytes = fetch(source)?;
        read_records(bytes.as_slice())?
    } else {
        tracing::info!(path = source, "reading census data");
        let file = File::open(source).map_err(|source_err| LoadError::Io {
            path: PathBuf::from(source),
            source: source_err,
        })?;
        read_records(file)?
    };
    if records.is_empty() {
        return Err(LoadError::Empty(source.to_string()));
    }
    tracing::info!(rows = records.len(), "census data loaded");
    Ok(records)
}

fn fetch(url: &str) -> Result<Vec<u8>, LoadError> {
    let fetch_err = |message: String| LoadError::Fetch {
        url: url.to_string(),
        message,
    };
    let response = ureq::AgentBuilder::new()
        .timeout(FETCH_TIMEOUT)
        .build()
        .get(url)
        .call()
        .map_err(|err| fetch_err(err.to_string()))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_DOWNLOAD_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|err| fetch_err(err.to_string()))?;
    Ok(bytes)
}

/// Parses headerless census CSV. Whitespace after each comma is dropped and
/// every row must carry all fifteen columns.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<Record>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut records = Vec::<Record>::new();
    for result in rdr.records() {
        let row = result?;
        if row.len() != COLUMNS.len() {
            return Err(LoadError::ColumnCount {
                line: row.position().map_or(0, |p| p.line()),
                found: row.len(),
                expected: COLUMNS.len(),
            });
        }
        let record: Record = row.deserialize(None)?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn record_with(age: u32, gender: &str, income_bracket: &str) -> Record {
        Record {
            age,
            workclass: "Private".to_string(),
            sample_weight: 77516,
            education: "Bachelors".to_string(),
            education_num: 13,
            marital_status: "Never-married".to_string(),
            occupation: "Adm-clerical".to_string(),
            relationship: "Not-in-family".to_string(),
            race: "White".to_string(),
            gender: gender.to_string(),
            capital_gain: 0,
            capital_loss: 0,
            hours_per_week: 40,
            native_country: "United-States".to_string(),
            income_bracket: income_bracket.to_string(),
        }
    }

    const SAMPLE: &str = "\
39, State-gov, 77516, Bachelors, 13, Never-married, Adm-clerical, Not-in-family, White, Male, 2174, 0, 40, United-States, <=50K
52, Self-emp-inc, 287927, HS-grad, 9, Married-civ-spouse, Exec-managerial, Wife, White, Female, 15024, 0, 40, United-States, >50K

";

    #[test]
    fn parses_census_rows_with_leading_spaces() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].age, 39);
        assert_eq!(records[0].workclass, "State-gov");
        assert_eq!(records[0].capital_gain, 2174);
        assert_eq!(records[1].gender, "Female");
        assert_eq!(records[1].income_bracket, ">50K");
    }

    #[test]
    fn rejects_rows_with_missing_columns() {
        let short = "39, State-gov, 77516, Bachelors\n";
        assert!(matches!(
            read_records(short.as_bytes()),
            Err(LoadError::ColumnCount { line: 1, found: 4, expected: 15 })
        ));
    }

    #[test]
    fn rejects_rows_with_extra_columns() {
        let long = format!("{}, EXTRA\n", SAMPLE.lines().next().unwrap());
        assert!(matches!(
            read_records(long.as_bytes()),
            Err(LoadError::ColumnCount { line: 1, found: 16, expected: 15 })
        ));
    }

    #[test]
    fn rejects_a_bad_row_after_good_ones() {
        let mut lines = SAMPLE.lines();
        let mixed = format!(
            "{}\n{}\n39, State-gov\n",
            lines.next().unwrap(),
            lines.next().unwrap()
        );
        let err = read_records(mixed.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::ColumnCount { line: 3, found: 2, .. }));
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let bad = SAMPLE.lines().next().unwrap().replacen("39", "old", 1);
        assert!(matches!(read_records(bad.as_bytes()), Err(LoadError::Csv(_))));
    }

    #[test]
    fn loads_from_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let records = load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn empty_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = load(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, LoadError::Empty(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load("/definitely/not/here/adult.data").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}

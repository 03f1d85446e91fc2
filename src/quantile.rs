use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QuantileError {
    #[error("at least two buckets are required, got {0}")]
    TooFewBuckets(usize),
    #[error("cannot compute quantiles of an empty column")]
    EmptyColumn,
}

/// Returns the `num_buckets - 1` cutpoints at fractions `1/k .. (k-1)/k`
/// that split `values` into equal-frequency buckets.
///
/// Quantiles interpolate linearly between the two nearest ranks. NaN values
/// are skipped. Columns with few distinct values produce repeated cutpoints.
pub fn quantile_boundaries(values: &[f64], num_buckets: usize) -> Result<Vec<f64>, QuantileError> {
    if num_buckets < 2 {
        return Err(QuantileError::TooFewBuckets(num_buckets));
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return Err(QuantileError::EmptyColumn);
    }
    sorted.sort_by(f64::total_cmp);

    let boundaries = (1..num_buckets)
        .map(|i| quantile_sorted(&sorted, i as f64 / num_buckets as f64))
        .collect();
    Ok(boundaries)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Index of the bucket `value` falls in: the number of boundaries `<= value`.
pub fn bucket_index(boundaries: &[f64], value: f64) -> usize {
    boundaries.partition_point(|b| *b <= value)
}

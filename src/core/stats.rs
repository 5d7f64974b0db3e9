//! Small statistics helpers shared by the extractors.

use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::hash::Hash;

/// Arithmetic mean, 0 for an empty sample.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

/// Population standard deviation, 0 for fewer than two samples.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().population_std_dev()
}

/// Coefficient of variation `std / mean`.
///
/// Zero when there are fewer than two samples or the mean is zero.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if values.len() < 2 || m == 0.0 {
        return 0.0;
    }
    std_dev(values) / m
}

/// Shannon entropy of a symbol sequence normalized to [0, 1] by
/// `log2(distinct symbols)`.
///
/// A single distinct symbol (or no symbols) has entropy 0.
pub fn normalized_entropy<T, I>(symbols: I) -> f64
where
    T: Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut total = 0usize;
    for symbol in symbols {
        *counts.entry(symbol).or_insert(0) += 1;
        total += 1;
    }

    if counts.len() < 2 {
        return 0.0;
    }

    let total = total as f64;
    let entropy: f64 = counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum();

    (entropy / (counts.len() as f64).log2()).clamp(0.0, 1.0)
}

/// Gaps in seconds between consecutive timestamps (already ordered).
pub fn gaps_secs(timestamps: &[chrono::DateTime<chrono::Utc>]) -> Vec<f64> {
    timestamps
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6)
        .collect()
}

/// Clamp to [0, 1], mapping NaN to 0.
pub fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

use crate::classifier::correct_count;
use crate::time_series::MetricSample;

/// Floor applied to elapsed time so an instant submit cannot divide by zero.
pub const MIN_ELAPSED_SECS: f64 = 0.1;

/// Characters per word in the WPM formula.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Percentage of typed characters that match their positional target.
pub fn accuracy(input: &[char], passage: &[char]) -> f64 {
    if input.is_empty() {
        return 0.0;
    }
    100.0 * correct_count(input, passage) as f64 / input.len() as f64
}

/// Gross words per minute over every typed character, correct or not.
pub fn wpm(chars_typed: usize, elapsed_secs: f64) -> f64 {
    let minutes = elapsed_secs.max(MIN_ELAPSED_SECS) / 60.0;
    (chars_typed as f64 / CHARS_PER_WORD) / minutes
}

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        None
    } else {
        Some(data.iter().sum::<f64>() / data.len() as f64)
    }
}

pub fn std_dev(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    let variance = data.iter().map(|v| (m - v) * (m - v)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

/// Spread of the sampled WPM values; 0.0 with no samples.
pub fn consistency(samples: &[MetricSample]) -> f64 {
    let values: Vec<f64> = samples.iter().map(|s| s.wpm).collect();
    std_dev(&values).unwrap_or(0.0)
}

/// Live or final numbers for the current attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiveMetrics {
    pub elapsed_ms: u64,
    pub wpm: f64,
    pub accuracy: f64,
    pub errors: usize,
}

impl LiveMetrics {
    pub fn compute(input: &[char], passage: &[char], elapsed_ms: u64) -> Self {
        Self {
            elapsed_ms,
            wpm: wpm(input.len(), elapsed_ms as f64 / 1000.0),
            accuracy: accuracy(input, passage),
            errors: crate::classifier::snapshot_error_count(input, passage),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}

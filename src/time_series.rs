/// Minimum spacing between two recorded samples.
pub const SAMPLE_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    pub elapsed_ms: u64,
    pub wpm: f64,
}

impl MetricSample {
    pub fn new(elapsed_ms: u64, wpm: f64) -> Self {
        Self { elapsed_ms, wpm }
    }

    pub fn seconds(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}

/// Chart coordinates are (seconds, wpm).
impl From<MetricSample> for (f64, f64) {
    fn from(s: MetricSample) -> Self {
        (s.seconds(), s.wpm)
    }
}

/// Append-only WPM series holding at most one sample per second.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricHistory {
    samples: Vec<MetricSample>,
}

impl MetricHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample when the history is empty or a full interval has
    /// passed since the last one. Returns whether the sample was kept.
    pub fn record(&mut self, elapsed_ms: u64, wpm: f64) -> bool {
        let due = match self.samples.last() {
            None => true,
            Some(last) => elapsed_ms.saturating_sub(last.elapsed_ms) >= SAMPLE_INTERVAL_MS,
        };
        if due {
            self.samples.push(MetricSample::new(elapsed_ms, wpm));
        }
        due
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn coords(&self) -> Vec<(f64, f64)> {
        self.samples.iter().copied().map(Into::into).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

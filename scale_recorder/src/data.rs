//! Weight readings produced by the recorder and the smoothing applied to them.

/// One pass of the recorder loop. Uses a builder pattern for construction.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSample {
    /// Timestamp of the reading in seconds since UNIX epoch.
    pub timestamp_s: u64,
    /// Latest raw 24-bit conversion.
    pub raw: i32,
    /// Offset-corrected, scaled weight.
    pub weight: f32,
    /// Mean of the last few weights.
    pub average_weight: f32,
}

impl WeightSample {
    pub fn builder(timestamp_s: u64) -> WeightSampleBuilder {
        WeightSampleBuilder::new(timestamp_s)
    }
}

/// Builder for `WeightSample`. Missing weights default to `NAN`, a missing raw reading to `0`.
#[derive(Default)]
pub struct WeightSampleBuilder {
    timestamp_s: u64,
    raw: Option<i32>,
    weight: Option<f32>,
    average_weight: Option<f32>,
}

impl WeightSampleBuilder {
    pub fn new(timestamp_s: u64) -> Self {
        Self { timestamp_s, ..Default::default() }
    }

    pub fn with_raw(mut self, raw: i32) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn with_weight(mut self, weight: f32, average_weight: f32) -> Self {
        self.weight = Some(weight);
        self.average_weight = Some(average_weight);
        self
    }

    pub fn build(self) -> WeightSample {
        WeightSample {
            timestamp_s: self.timestamp_s,
            raw: self.raw.unwrap_or_default(),
            weight: self.weight.unwrap_or(f32::NAN),
            average_weight: self.average_weight.unwrap_or(f32::NAN),
        }
    }
}

/// Fixed-size window over the most recent weights.
///
/// The window starts filled with zeros, so the first `size - 1` averages are
/// pulled toward zero.
#[derive(Debug, Clone)]
pub struct RunningAverage {
    weights: Vec<f32>,
    next: usize,
}

impl RunningAverage {
    pub fn new(size: usize) -> Self {
        Self { weights: vec![0.0; size.max(1)], next: 0 }
    }

    /// Insert `weight`, replacing the oldest entry, and return the window mean.
    pub fn add(&mut self, weight: f32) -> f32 {
        self.weights[self.next] = weight;
        self.next = (self.next + 1) % self.weights.len();
        self.weights.iter().sum::<f32>() / self.weights.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn average_fills_from_zero() {
        let mut avg = RunningAverage::new(4);
        assert_eq!(avg.add(4.0), 1.0);
        assert_eq!(avg.add(4.0), 2.0);
        assert_eq!(avg.add(4.0), 3.0);
        assert_eq!(avg.add(4.0), 4.0);
    }

    #[test]
    fn average_drops_oldest() {
        let mut avg = RunningAverage::new(2);
        avg.add(10.0);
        avg.add(20.0);
        assert_eq!(avg.add(30.0), 25.0);
    }

    #[test]
    fn builder_defaults() {
        let sample = WeightSample::builder(42).build();
        assert_eq!(sample.timestamp_s, 42);
        assert_eq!(sample.raw, 0);
        assert!(sample.weight.is_nan());
        assert!(sample.average_weight.is_nan());

        let sample = WeightSample::builder(42).with_raw(-7).with_weight(1.5, 0.5).build();
        assert_eq!(sample.raw, -7);
        assert_eq!(sample.weight, 1.5);
        assert_eq!(sample.average_weight, 0.5);
    }
}

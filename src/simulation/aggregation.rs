//! Streaming aggregation of observed makespans.

use rand::Rng;

/// One-pass mean and variance (Welford's algorithm) with running minimum
/// and maximum, without storing the data points.
#[derive(Debug)]
pub struct WelfordAggregation {
    n: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for WelfordAggregation {
    /// Create an empty aggregation: no data points, placeholder values for
    /// min (`f64::MAX`) and max (`f64::MIN`).
    fn default() -> Self {
        Self {
            n: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }
}

impl WelfordAggregation {
    /// Fold a new data point into the aggregation.
    pub fn push(&mut self, value: f64) {
        self.n += 1;
        let delta = value - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn mean(&self) -> Option<f64> {
        (self.n > 0).then_some(self.mean)
    }

    /// Population variance `M2 / n`, not the sample form.
    pub fn variance(&self) -> Option<f64> {
        (self.n > 0).then(|| self.m2 / self.n as f64)
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn min(&self) -> Option<f64> {
        (self.n > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.n > 0).then_some(self.max)
    }
}

/// Uniform fixed-size subsample of a stream of unknown length.
///
/// After `n` offers every element of the stream is retained with
/// probability `capacity / n`. The retained set depends on the offer
/// order, so reproducibility requires feeding the stream in a fixed order.
#[derive(Debug)]
pub struct ReservoirSample<R: Rng> {
    capacity: usize,
    rng: R,
    values: Vec<f64>,
    offered: u64,
}

impl<R: Rng> ReservoirSample<R> {
    pub fn new(capacity: usize, rng: R) -> Self {
        Self {
            capacity,
            rng,
            values: Vec::with_capacity(capacity),
            offered: 0,
        }
    }

    /// Offer the `i`-th stream element: appended while the reservoir has
    /// room, afterwards it replaces a random slot with probability
    /// `capacity / (i + 1)`.
    pub fn push(&mut self, value: f64) {
        let index = self.offered as usize;
        self.offered += 1;
        if self.capacity == 0 {
            return;
        }
        if self.values.len() < self.capacity {
            self.values.push(value);
        } else {
            let slot = self.rng.gen_range(0..=index);
            if slot < self.capacity {
                self.values[slot] = value;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Approximate median of the stream: the middle element of the sorted
    /// sample, or the average of the two central elements for even sizes.
    pub fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_unstable_by(f64::total_cmp);
        let n = sorted.len();
        if n % 2 == 1 {
            Some(sorted[n / 2])
        } else {
            Some(0.5 * (sorted[n / 2 - 1] + sorted[n / 2]))
        }
    }
}

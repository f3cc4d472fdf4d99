use super::{percentile_label, validate_quantiles, Histogram, Snapshot};
use metrix_core::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Running estimate for one quantile.
#[derive(Debug, Clone, Copy)]
struct Estimator {
    quantile: f64,
    estimate: f64,
    step: f64,
    /// Direction of the last move: 1 up, -1 down, 0 before the first sample.
    sign: i8,
}

impl Estimator {
    fn new(quantile: f64) -> Self {
        Self {
            quantile,
            estimate: 0.0,
            step: 1.0,
            sign: 0,
        }
    }

    fn update(&mut self, x: f64, rng: &mut StdRng) {
        if self.sign == 0 {
            self.estimate = x;
            self.sign = 1;
            return;
        }

        // The median moves on every sample; other quantiles move up with
        // probability q and down with probability 1 - q.
        let symmetric = self.quantile == 0.5;

        if x > self.estimate {
            if !symmetric && rng.gen::<f64>() <= 1.0 - self.quantile {
                return;
            }

            self.step += f64::from(self.sign);
            if self.step > 0.0 {
                self.estimate += self.step;
            } else {
                self.estimate += 1.0;
            }

            if self.estimate > x {
                self.step += x - self.estimate;
                self.estimate = x;
            }

            if self.sign < 0 {
                self.step = 1.0;
            }
            self.sign = 1;
        } else if x < self.estimate {
            if !symmetric && rng.gen::<f64>() <= self.quantile {
                return;
            }

            self.step -= f64::from(self.sign);
            if self.step > 0.0 {
                self.estimate -= self.step;
            } else {
                self.estimate -= 1.0;
            }

            if self.estimate < x {
                self.step += self.estimate - x;
                self.estimate = x;
            }

            if self.sign > 0 {
                self.step = 1.0;
            }
            self.sign = -1;
        }
    }
}

/// Constant-memory quantile estimator based on frugal streaming.
///
/// Each quantile keeps a single running estimate that is nudged toward every
/// new sample, so recent data weighs more than old data. Much cheaper than
/// [`BucketHistogram`](super::BucketHistogram), with no precision guarantee.
#[derive(Debug, Clone)]
pub struct StreamingHistogram {
    labels: Vec<String>,
    estimators: Vec<Estimator>,
    entries: u64,
    min: f64,
    max: f64,
    rng: StdRng,
}

impl StreamingHistogram {
    pub fn new(quantiles: Vec<f64>) -> Result<Self> {
        Self::build(quantiles, StdRng::from_entropy())
    }

    /// Same as [`new`](Self::new) with a deterministic random source.
    pub fn with_seed(quantiles: Vec<f64>, seed: u64) -> Result<Self> {
        Self::build(quantiles, StdRng::seed_from_u64(seed))
    }

    fn build(quantiles: Vec<f64>, rng: StdRng) -> Result<Self> {
        validate_quantiles(&quantiles)?;

        Ok(Self {
            labels: quantiles.iter().map(|q| percentile_label(*q)).collect(),
            estimators: quantiles.into_iter().map(Estimator::new).collect(),
            entries: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            rng,
        })
    }
}

impl Histogram for StreamingHistogram {
    fn add(&mut self, value: f64) {
        self.entries += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        for estimator in &mut self.estimators {
            estimator.update(value, &mut self.rng);
        }
    }

    fn snapshot(&self) -> Snapshot {
        if self.entries == 0 {
            return Snapshot::default();
        }

        Snapshot {
            min: Some(self.min),
            max: Some(self.max),
            overflow: None,
            quantiles: self
                .labels
                .iter()
                .zip(&self.estimators)
                .map(|(label, estimator)| (label.clone(), estimator.estimate))
                .collect(),
        }
    }

    fn clear(&mut self) {
        for estimator in &mut self.estimators {
            *estimator = Estimator::new(estimator.quantile);
        }
        self.entries = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    fn count(&self) -> u64 {
        self.entries
    }
}

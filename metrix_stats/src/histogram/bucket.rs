use super::{percentile_label, Histogram, HistogramOptions, Snapshot};
use dashmap::DashMap;
use metrix_core::Result;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::debug;

/// Boundary sets already computed, keyed by the bit patterns of `(error, max)`.
static BOUNDARIES: Lazy<DashMap<(u64, u64), Arc<[f64]>>> = Lazy::new(DashMap::new);

/// Upper bounds of geometrically growing buckets covering `(0, max]`.
///
/// Widths start at 1 and grow by `1 + 2 * error`, so a bucket's midpoint is
/// within `error` of anything it holds once buckets are wider than the
/// first few unit-sized ones.
fn compute_boundaries(error: f64, max: f64) -> Vec<f64> {
    let ratio = 1.0 + 2.0 * error;
    let mut boundaries = Vec::new();
    let mut right = 0.0;
    let mut width = 1.0;

    while right < max {
        right += width;
        boundaries.push(right);
        width *= ratio;
    }

    boundaries
}

fn boundaries_for(error: f64, max: f64) -> Arc<[f64]> {
    let key = (error.to_bits(), max.to_bits());
    if let Some(found) = BOUNDARIES.get(&key) {
        return found.value().clone();
    }

    BOUNDARIES
        .entry(key)
        .or_insert_with(|| {
            let boundaries = compute_boundaries(error, max);
            debug!(
                "Computed {} bucket boundaries for error {} and max {}",
                boundaries.len(),
                error,
                max
            );
            Arc::from(boundaries)
        })
        .value()
        .clone()
}

/// Fixed-boundary histogram with bounded relative error.
///
/// Memory is proportional to the number of buckets, which depends only on
/// `error` and `max`. Histograms built with the same parameters share one
/// boundary array.
#[derive(Debug, Clone)]
pub struct BucketHistogram {
    ceiling: f64,
    quantiles: Vec<f64>,
    labels: Vec<String>,
    boundaries: Arc<[f64]>,
    buckets: Vec<u64>,
    max_bucket: usize,
    entries: u64,
    overflow: u64,
    min: f64,
    max: f64,
}

impl BucketHistogram {
    pub fn new(mut options: HistogramOptions) -> Result<Self> {
        options.validate()?;
        options.quantiles.sort_by(f64::total_cmp);
        options.quantiles.dedup();

        let boundaries = boundaries_for(options.error, options.max);
        let labels = options.quantiles.iter().map(|q| percentile_label(*q)).collect();

        Ok(Self {
            ceiling: options.max,
            quantiles: options.quantiles,
            labels,
            buckets: vec![0; boundaries.len()],
            boundaries,
            max_bucket: 0,
            entries: 0,
            overflow: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        })
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Whether both histograms read from the same cached boundary array.
    pub fn shares_boundaries_with(&self, other: &BucketHistogram) -> bool {
        Arc::ptr_eq(&self.boundaries, &other.boundaries)
    }

    fn bucket_estimate(&self, index: usize) -> f64 {
        let midpoint = if index == 0 {
            self.boundaries[0]
        } else {
            (self.boundaries[index] + self.boundaries[index - 1]) / 2.0
        };
        midpoint.max(self.min).min(self.max)
    }
}

impl Histogram for BucketHistogram {
    fn add(&mut self, value: f64) {
        self.entries += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        if value > self.ceiling {
            self.overflow += 1;
            return;
        }

        let index = self.boundaries.partition_point(|b| *b < value);
        match self.buckets.get_mut(index) {
            Some(count) => {
                *count += 1;
                self.max_bucket = self.max_bucket.max(index);
            }
            None => self.overflow += 1,
        }
    }

    fn snapshot(&self) -> Snapshot {
        if self.entries == 0 {
            return Snapshot::default();
        }

        let entries = self.entries as f64;
        let mut estimates: Vec<Option<f64>> = vec![None; self.quantiles.len()];
        // Quantiles are sorted ascending, so the scan from the top bucket down
        // resolves them from the last one to the first.
        let mut unresolved = self.quantiles.len();
        let mut seen = self.overflow as f64;

        for index in (0..=self.max_bucket).rev() {
            seen += self.buckets.get(index).copied().unwrap_or(0) as f64;

            while unresolved > 0 {
                let target = (1.0 - self.quantiles[unresolved - 1]) * entries;
                if seen <= target {
                    break;
                }
                unresolved -= 1;
                estimates[unresolved] = Some(self.bucket_estimate(index));
            }

            if unresolved == 0 {
                break;
            }
        }

        let fallback = self.boundaries.last().copied().unwrap_or(self.ceiling);
        let quantiles = self
            .labels
            .iter()
            .zip(estimates)
            .map(|(label, estimate)| (label.clone(), estimate.unwrap_or(fallback)))
            .collect();

        Snapshot {
            min: Some(self.min),
            max: Some(self.max),
            overflow: (self.overflow > 0).then_some(self.overflow),
            quantiles,
        }
    }

    fn clear(&mut self) {
        self.buckets.iter_mut().for_each(|count| *count = 0);
        self.max_bucket = 0;
        self.entries = 0;
        self.overflow = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    fn count(&self) -> u64 {
        self.entries
    }
}

//! Quantile-estimating histograms.

pub mod bucket;
pub mod streaming;

use metrix_core::{MetricsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

pub use bucket::BucketHistogram;
pub use streaming::StreamingHistogram;

pub const DEFAULT_ERROR: f64 = 0.005;
/// One hour, in milliseconds.
pub const DEFAULT_MAX: f64 = 60.0 * 60.0 * 1000.0;
pub const DEFAULT_QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// Summarizes a stream of samples into approximate quantiles.
pub trait Histogram: Send + Debug {
    fn add(&mut self, value: f64);

    /// Point-in-time summary. Empty until the first sample; taking one never
    /// changes the histogram.
    fn snapshot(&self) -> Snapshot;

    fn clear(&mut self);

    /// Number of samples added since creation or the last clear.
    fn count(&self) -> u64;
}

/// Summary of a histogram: exact extremes plus one estimate per quantile,
/// keyed by its label (`p50`, `p99.9`, ...). Serializes to `{}` when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Samples above the histogram's ceiling, present only when non-zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow: Option<u64>,
    #[serde(flatten)]
    pub quantiles: BTreeMap<String, f64>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.quantiles.is_empty()
    }

    /// Looks up a field by its report label: `min`, `max` or a percentile.
    pub fn get(&self, label: &str) -> Option<f64> {
        match label {
            "min" => self.min,
            "max" => self.max,
            _ => self.quantiles.get(label).copied(),
        }
    }

    pub fn quantile(&self, quantile: f64) -> Option<f64> {
        self.quantiles.get(&percentile_label(quantile)).copied()
    }
}

/// Canonical label of a quantile: `p` followed by the percentage rounded to
/// two decimals, without trailing zeros (`0.5` is `p50`, `0.9999` is `p99.99`).
pub fn percentile_label(quantile: f64) -> String {
    let percent = (quantile * 100.0 * 100.0).round() / 100.0;
    format!("p{}", percent)
}

pub(crate) fn validate_quantiles(quantiles: &[f64]) -> Result<()> {
    if quantiles.is_empty() {
        return Err(MetricsError::InvalidHistogram(
            "at least one quantile is required".to_string(),
        ));
    }

    if let Some(q) = quantiles.iter().find(|q| !(**q > 0.0 && **q < 1.0)) {
        return Err(MetricsError::InvalidHistogram(format!(
            "quantile {} is outside (0, 1)",
            q
        )));
    }

    Ok(())
}

/// Parameters of a [`BucketHistogram`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramOptions {
    /// Relative precision of the estimates, as a fraction.
    pub error: f64,
    /// Soft ceiling. Larger samples are counted as overflow.
    pub max: f64,
    pub quantiles: Vec<f64>,
}

impl HistogramOptions {
    pub fn new(error: f64, max: f64, quantiles: Vec<f64>) -> Self {
        Self {
            error,
            max,
            quantiles,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.error > 0.0 && self.error < 1.0) {
            return Err(MetricsError::InvalidHistogram(format!(
                "error must be in (0, 1), got {}",
                self.error
            )));
        }

        if !(self.max.is_finite() && self.max > 0.0) {
            return Err(MetricsError::InvalidHistogram(format!(
                "max must be positive and finite, got {}",
                self.max
            )));
        }

        validate_quantiles(&self.quantiles)
    }
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            error: DEFAULT_ERROR,
            max: DEFAULT_MAX,
            quantiles: DEFAULT_QUANTILES.to_vec(),
        }
    }
}

/// Which histogram to build for a metric, and with what parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistogramSpec {
    Bucket(HistogramOptions),
    Streaming {
        quantiles: Vec<f64>,
        /// Fixed seed for reproducible estimates.
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl HistogramSpec {
    pub fn bucket(error: f64, max: f64, quantiles: Vec<f64>) -> Self {
        HistogramSpec::Bucket(HistogramOptions::new(error, max, quantiles))
    }

    pub fn streaming(quantiles: Vec<f64>) -> Self {
        HistogramSpec::Streaming {
            quantiles,
            seed: None,
        }
    }

    pub fn quantiles(&self) -> &[f64] {
        match self {
            HistogramSpec::Bucket(options) => &options.quantiles,
            HistogramSpec::Streaming { quantiles, .. } => quantiles,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            HistogramSpec::Bucket(options) => options.validate(),
            HistogramSpec::Streaming { quantiles, .. } => validate_quantiles(quantiles),
        }
    }

    pub fn build(&self) -> Result<Box<dyn Histogram>> {
        Ok(match self {
            HistogramSpec::Bucket(options) => Box::new(BucketHistogram::new(options.clone())?),
            HistogramSpec::Streaming { quantiles, seed } => match seed {
                Some(seed) => Box::new(StreamingHistogram::with_seed(quantiles.clone(), *seed)?),
                None => Box::new(StreamingHistogram::new(quantiles.clone())?),
            },
        })
    }
}

impl Default for HistogramSpec {
    fn default() -> Self {
        HistogramSpec::Bucket(HistogramOptions::default())
    }
}

//! Policies folding events into aggregator state.

use crate::histogram::{Histogram, HistogramSpec, Snapshot};
use metrix_core::{MetricEvent, Result};
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::{debug, warn};

pub type Counters = BTreeMap<String, f64>;
pub type Histograms = BTreeMap<String, Box<dyn Histogram>>;

/// Histogram parameters used by the default timer and sample reducers:
/// 1% error up to one hour, p50 to p99.9.
pub fn default_histogram_spec() -> HistogramSpec {
    HistogramSpec::bucket(0.01, 60.0 * 60.0 * 1000.0, vec![0.5, 0.9, 0.99, 0.999])
}

/// Folds one event into the aggregator's histograms and counters.
///
/// Runs synchronously inside the aggregator's lock: implementations must
/// not emit events on the recorder the aggregator listens to.
pub trait Reducer: Send + Sync + Debug {
    fn reduce(&self, event: &MetricEvent, histograms: &mut Histograms, counters: &mut Counters);

    /// Checked once when the aggregator is built.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Adds `value` to the histogram registered under `name`, building it from
/// `spec` on first sight.
pub fn record_sample(histograms: &mut Histograms, name: &str, spec: &HistogramSpec, value: f64) {
    if let Some(histogram) = histograms.get_mut(name) {
        histogram.add(value);
        return;
    }

    match spec.build() {
        Ok(mut histogram) => {
            debug!("Creating histogram '{}'", name);
            histogram.add(value);
            histograms.insert(name.to_string(), histogram);
        }
        Err(e) => warn!("Cannot create histogram '{}': {}", name, e),
    }
}

/// Sums counter increments per name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumCounter;

impl Reducer for SumCounter {
    fn reduce(&self, event: &MetricEvent, _histograms: &mut Histograms, counters: &mut Counters) {
        *counters.entry(event.name.to_string()).or_insert(0.0) += event.measurement.value();
    }
}

/// Keeps the last reported value per name in the counters map.
///
/// Gauges and counters share that map and are keyed by bare name. A gauge
/// update replaces whatever total a same-named counter had accumulated, and a
/// later counter increment adds onto the gauge value. Give gauges and
/// counters distinct names, or scope one of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestGauge;

impl Reducer for LatestGauge {
    fn reduce(&self, event: &MetricEvent, _histograms: &mut Histograms, counters: &mut Counters) {
        counters.insert(event.name.to_string(), event.measurement.value());
    }
}

/// Records timer durations in a histogram per name.
#[derive(Debug, Clone)]
pub struct TimerToHistogram {
    spec: HistogramSpec,
}

impl TimerToHistogram {
    pub fn new(spec: HistogramSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self { spec })
    }

    pub fn spec(&self) -> &HistogramSpec {
        &self.spec
    }
}

impl Default for TimerToHistogram {
    fn default() -> Self {
        Self {
            spec: default_histogram_spec(),
        }
    }
}

impl Reducer for TimerToHistogram {
    fn reduce(&self, event: &MetricEvent, histograms: &mut Histograms, _counters: &mut Counters) {
        if let Some(duration) = event.duration() {
            record_sample(histograms, &event.name, &self.spec, duration);
        }
    }

    fn validate(&self) -> Result<()> {
        self.spec.validate()
    }
}

/// Records raw sample values in a histogram per name.
#[derive(Debug, Clone)]
pub struct SampleToHistogram {
    spec: HistogramSpec,
}

impl SampleToHistogram {
    pub fn new(spec: HistogramSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self { spec })
    }

    pub fn spec(&self) -> &HistogramSpec {
        &self.spec
    }
}

impl Default for SampleToHistogram {
    fn default() -> Self {
        Self {
            spec: default_histogram_spec(),
        }
    }
}

impl Reducer for SampleToHistogram {
    fn reduce(&self, event: &MetricEvent, histograms: &mut Histograms, _counters: &mut Counters) {
        record_sample(histograms, &event.name, &self.spec, event.measurement.value());
    }

    fn validate(&self) -> Result<()> {
        self.spec.validate()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Reducer for Discard {
    fn reduce(&self, _event: &MetricEvent, _histograms: &mut Histograms, _counters: &mut Counters) {}
}

/// Derives new counters from a report's counters and histogram snapshots.
///
/// Returned pairs are written into the aggregator's counters, so they show
/// up in the current report and persist into later ones.
#[cfg_attr(test, mockall::automock)]
pub trait Composite: Send + Sync {
    fn derive(
        &self,
        counters: &Counters,
        histograms: &BTreeMap<String, Snapshot>,
    ) -> Option<Vec<(String, f64)>>;
}

impl<F> Composite for F
where
    F: Fn(&Counters, &BTreeMap<String, Snapshot>) -> Option<Vec<(String, f64)>> + Send + Sync,
{
    fn derive(
        &self,
        counters: &Counters,
        histograms: &BTreeMap<String, Snapshot>,
    ) -> Option<Vec<(String, f64)>> {
        self(counters, histograms)
    }
}

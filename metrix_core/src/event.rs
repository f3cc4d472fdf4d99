//! Events emitted by metric sources and consumed by bus subscribers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Tag keys to tag values attached to a source or a single emission.
pub type Tags = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Counter,
    Timer,
    Gauge,
    Histogram,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Counter,
        EventKind::Timer,
        EventKind::Gauge,
        EventKind::Histogram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Counter => "counter",
            EventKind::Timer => "timer",
            EventKind::Gauge => "gauge",
            EventKind::Histogram => "histogram",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            EventKind::Counter => 0,
            EventKind::Timer => 1,
            EventKind::Gauge => 2,
            EventKind::Histogram => 3,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric payload of an event.
///
/// Counters carry a delta (`increment`), never a running total. Gauges and
/// histogram samples carry absolute values. Timers carry both ends of the
/// measured interval, in clock milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    Counter { increment: f64 },
    Timer { start_ts: f64, stop_ts: f64 },
    Gauge { value: f64 },
    Histogram { value: f64 },
}

impl Measurement {
    pub fn kind(&self) -> EventKind {
        match self {
            Measurement::Counter { .. } => EventKind::Counter,
            Measurement::Timer { .. } => EventKind::Timer,
            Measurement::Gauge { .. } => EventKind::Gauge,
            Measurement::Histogram { .. } => EventKind::Histogram,
        }
    }

    /// The number a reducer usually folds: the increment, the elapsed time or
    /// the sampled value.
    pub fn value(&self) -> f64 {
        match *self {
            Measurement::Counter { increment } => increment,
            Measurement::Timer { start_ts, stop_ts } => stop_ts - start_ts,
            Measurement::Gauge { value } | Measurement::Histogram { value } => value,
        }
    }
}

/// A single measurement on its way to the subscribers of a bus.
///
/// Events are handed out by reference and never retained by the bus. The tag
/// map is shared and immutable, so merging tags for a later emission builds a
/// new map instead of touching the one an earlier event carried.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    pub name: Arc<str>,
    pub measurement: Measurement,
    pub tags: Option<Arc<Tags>>,
    /// Emission time, only stamped by precise sources.
    pub timestamp: Option<f64>,
}

impl MetricEvent {
    pub fn new(name: Arc<str>, measurement: Measurement) -> Self {
        Self {
            name,
            measurement,
            tags: None,
            timestamp: None,
        }
    }

    pub fn with_tags(mut self, tags: Option<Arc<Tags>>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.measurement.kind()
    }

    /// Elapsed milliseconds for timer events.
    pub fn duration(&self) -> Option<f64> {
        match self.measurement {
            Measurement::Timer { start_ts, stop_ts } => Some(stop_ts - start_ts),
            _ => None,
        }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()
            .and_then(|tags| tags.get(key))
            .map(String::as_str)
    }
}

/// Merges tag layers in order; later layers win on key conflicts.
///
/// Returns `None` when every layer is absent or empty.
pub fn merge_tags(layers: &[Option<&Tags>]) -> Option<Arc<Tags>> {
    let mut merged = Tags::new();
    for layer in layers.iter().flatten() {
        merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    if merged.is_empty() {
        None
    } else {
        Some(Arc::new(merged))
    }
}

//! Metric sources: the objects instrumented code mutates.
//!
//! Every mutation packages a measurement into a [`MetricEvent`] and publishes
//! it on the recorder's bus before returning. Sources keep no aggregated
//! state; folding events into totals and distributions is the job of whoever
//! subscribes to the bus.

pub mod counter;
pub mod disabled;
pub mod gauge;
pub mod histogram;
pub mod timer;

use crate::bus::EventBus;
use crate::clock::Clock;
use crate::error::Result;
use crate::event::{MetricEvent, Tags};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

pub use counter::{DefaultCounter, PreciseCounter};
pub use disabled::{NullCounter, NullGauge, NullHistogram, NullTimer};
pub use gauge::{DefaultGauge, PreciseGauge};
pub use histogram::DefaultHistogram;
pub use timer::{DefaultTimer, NoTagTimer, TimerToken};

/// Counter source. Emits the delta of every call, never a running total.
pub trait Counter: Send + Sync {
    fn incr(&self, n: f64);

    fn decr(&self, n: f64) {
        self.incr(-n);
    }
}

/// Timer source. Emits one event per successful `stop`, nothing on `start`.
pub trait Timer: Send + Sync {
    /// Records the start time.
    ///
    /// With tags, the start is parked in a pending buffer until the matching
    /// `stop`. The buffer is unbounded: a tagged start that is never stopped
    /// stays there for the life of the timer.
    fn start(&self, tags: Option<Tags>) -> TimerToken;

    /// Emits the elapsed time since the start the token refers to.
    ///
    /// Tags given here are merged over the creation-time and start-time tags
    /// for this emission only.
    fn stop(&self, token: TimerToken, tags: Option<Tags>) -> Result<()>;
}

/// Gauge source. Emits the new absolute value on every update.
pub trait Gauge: Send + Sync {
    fn update(&self, value: f64);
}

/// Histogram source. Emits every sample as-is.
pub trait HistogramSource: Send + Sync {
    fn add(&self, value: f64);
}

/// Handle through which sources publish: the shared bus plus the naming and
/// time conventions of the recorder that created them.
#[derive(Debug, Clone)]
pub struct Emitter {
    bus: Arc<EventBus>,
    separator: Arc<str>,
    clock: Arc<dyn Clock>,
}

impl Emitter {
    pub fn new(bus: Arc<EventBus>, separator: impl Into<Arc<str>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            bus,
            separator: separator.into(),
            clock,
        }
    }

    pub fn emit(&self, event: &MetricEvent) {
        self.bus.publish(event);
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

pub trait CounterFactory: Send + Sync + Debug {
    fn create(&self, emitter: &Emitter, name: Arc<str>, tags: Option<Tags>) -> Box<dyn Counter>;
}

pub trait TimerFactory: Send + Sync + Debug {
    fn create(&self, emitter: &Emitter, name: Arc<str>, tags: Option<Tags>) -> Box<dyn Timer>;
}

pub trait GaugeFactory: Send + Sync + Debug {
    fn create(&self, emitter: &Emitter, name: Arc<str>, tags: Option<Tags>) -> Box<dyn Gauge>;
}

pub trait HistogramFactory: Send + Sync + Debug {
    fn create(
        &self,
        emitter: &Emitter,
        name: Arc<str>,
        tags: Option<Tags>,
    ) -> Box<dyn HistogramSource>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterStrategy {
    #[default]
    Default,
    /// Stamps every event with its emission time.
    Precise,
    Disabled,
}

impl CounterFactory for CounterStrategy {
    fn create(&self, emitter: &Emitter, name: Arc<str>, tags: Option<Tags>) -> Box<dyn Counter> {
        match self {
            CounterStrategy::Default => Box::new(DefaultCounter::new(emitter.clone(), name, tags)),
            CounterStrategy::Precise => Box::new(PreciseCounter::new(emitter.clone(), name, tags)),
            CounterStrategy::Disabled => Box::new(NullCounter),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStrategy {
    #[default]
    Default,
    /// Drops every tag: creation, start and stop.
    NoTags,
    Disabled,
}

impl TimerFactory for TimerStrategy {
    fn create(&self, emitter: &Emitter, name: Arc<str>, tags: Option<Tags>) -> Box<dyn Timer> {
        match self {
            TimerStrategy::Default => Box::new(DefaultTimer::new(emitter.clone(), name, tags)),
            TimerStrategy::NoTags => Box::new(NoTagTimer::new(emitter.clone(), name)),
            TimerStrategy::Disabled => Box::new(NullTimer),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeStrategy {
    #[default]
    Default,
    /// Also emits every value as a histogram sample.
    Precise,
    Disabled,
}

impl GaugeFactory for GaugeStrategy {
    fn create(&self, emitter: &Emitter, name: Arc<str>, tags: Option<Tags>) -> Box<dyn Gauge> {
        match self {
            GaugeStrategy::Default => Box::new(DefaultGauge::new(emitter.clone(), name, tags)),
            GaugeStrategy::Precise => Box::new(PreciseGauge::new(emitter.clone(), name, tags)),
            GaugeStrategy::Disabled => Box::new(NullGauge),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramStrategy {
    #[default]
    Default,
    Disabled,
}

impl HistogramFactory for HistogramStrategy {
    fn create(
        &self,
        emitter: &Emitter,
        name: Arc<str>,
        tags: Option<Tags>,
    ) -> Box<dyn HistogramSource> {
        match self {
            HistogramStrategy::Default => {
                Box::new(DefaultHistogram::new(emitter.clone(), name, tags))
            }
            HistogramStrategy::Disabled => Box::new(NullHistogram),
        }
    }
}

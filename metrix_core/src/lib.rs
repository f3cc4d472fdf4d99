pub mod bus;
pub mod clock;
pub mod error;
pub mod event;
pub mod recorder;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

pub use bus::{EventBus, SubscriptionId};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{MetricsError, Result};
pub use event::{merge_tags, EventKind, Measurement, MetricEvent, Tags};
pub use recorder::{Recorder, RecorderConfig, DEFAULT_SEPARATOR};
pub use source::{
    Counter, CounterFactory, CounterStrategy, Emitter, Gauge, GaugeFactory, GaugeStrategy,
    HistogramFactory, HistogramSource, HistogramStrategy, Timer, TimerFactory, TimerStrategy,
    TimerToken,
};

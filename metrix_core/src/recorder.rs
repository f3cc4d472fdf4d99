use crate::bus::{EventBus, SubscriptionId};
use crate::clock::{Clock, MonotonicClock};
use crate::error::{MetricsError, Result};
use crate::event::{EventKind, MetricEvent, Tags};
use crate::source::{
    Counter, CounterFactory, CounterStrategy, Emitter, Gauge, GaugeFactory, GaugeStrategy,
    HistogramFactory, HistogramSource, HistogramStrategy, Timer, TimerFactory, TimerStrategy,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_SEPARATOR: &str = "/";

/// Factories and conventions a recorder is built from.
#[derive(Clone)]
pub struct RecorderConfig {
    pub separator: String,
    pub counter: Arc<dyn CounterFactory>,
    pub timer: Arc<dyn TimerFactory>,
    pub gauge: Arc<dyn GaugeFactory>,
    pub histogram: Arc<dyn HistogramFactory>,
    pub clock: Arc<dyn Clock>,
}

impl RecorderConfig {
    /// Every factory produces no-op sources.
    pub fn disabled() -> Self {
        Self {
            counter: Arc::new(CounterStrategy::Disabled),
            timer: Arc::new(TimerStrategy::Disabled),
            gauge: Arc::new(GaugeStrategy::Disabled),
            histogram: Arc::new(HistogramStrategy::Disabled),
            ..Self::default()
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_counter(mut self, factory: impl CounterFactory + 'static) -> Self {
        self.counter = Arc::new(factory);
        self
    }

    pub fn with_timer(mut self, factory: impl TimerFactory + 'static) -> Self {
        self.timer = Arc::new(factory);
        self
    }

    pub fn with_gauge(mut self, factory: impl GaugeFactory + 'static) -> Self {
        self.gauge = Arc::new(factory);
        self
    }

    pub fn with_histogram(mut self, factory: impl HistogramFactory + 'static) -> Self {
        self.histogram = Arc::new(factory);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(MetricsError::InvalidConfig(
                "separator cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            counter: Arc::new(CounterStrategy::Default),
            timer: Arc::new(TimerStrategy::Default),
            gauge: Arc::new(GaugeStrategy::Default),
            histogram: Arc::new(HistogramStrategy::Default),
            clock: Arc::new(MonotonicClock::new()),
        }
    }
}

impl fmt::Debug for RecorderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderConfig")
            .field("separator", &self.separator)
            .field("counter", &self.counter)
            .field("timer", &self.timer)
            .field("gauge", &self.gauge)
            .field("histogram", &self.histogram)
            .finish()
    }
}

#[derive(Debug)]
struct Shared {
    emitter: Emitter,
    counter: Arc<dyn CounterFactory>,
    timer: Arc<dyn TimerFactory>,
    gauge: Arc<dyn GaugeFactory>,
    histogram: Arc<dyn HistogramFactory>,
}

/// Mints metric sources and owns the bus their events travel on.
///
/// A recorder holds no source state. Cloning it, or calling [`Recorder::scope`],
/// yields another view over the same bus and factories; a scope only adds
/// `<name><separator>` to the prefix of every name it mints.
#[derive(Debug, Clone)]
pub struct Recorder {
    shared: Arc<Shared>,
    prefix: Arc<str>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::from_parts(RecorderConfig::default())
    }

    pub fn with_config(config: RecorderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config))
    }

    /// Recorder whose sources never emit. Instrumented code keeps calling the
    /// same methods; nothing reaches subscribers.
    pub fn disabled() -> Self {
        Self::from_parts(RecorderConfig::disabled())
    }

    fn from_parts(config: RecorderConfig) -> Self {
        debug!("Creating recorder with {:?}", config);
        let emitter = Emitter::new(
            Arc::new(EventBus::new()),
            config.separator.as_str(),
            config.clock,
        );

        Self {
            shared: Arc::new(Shared {
                emitter,
                counter: config.counter,
                timer: config.timer,
                gauge: config.gauge,
                histogram: config.histogram,
            }),
            prefix: Arc::from(""),
        }
    }

    pub fn scope(&self, name: &str) -> Recorder {
        let prefix = format!("{}{}{}", self.prefix, name, self.separator());
        debug!("Creating scope '{}'", prefix);
        Recorder {
            shared: self.shared.clone(),
            prefix: prefix.into(),
        }
    }

    /// Creates a counter. A supplied initial value is emitted right away as
    /// the first increment.
    pub fn counter(&self, name: &str, initial: Option<f64>, tags: Option<Tags>) -> Box<dyn Counter> {
        let counter = self
            .shared
            .counter
            .create(&self.shared.emitter, self.qualify(name), tags);
        if let Some(value) = initial {
            counter.incr(value);
        }
        counter
    }

    pub fn timer(&self, name: &str, tags: Option<Tags>) -> Box<dyn Timer> {
        self.shared
            .timer
            .create(&self.shared.emitter, self.qualify(name), tags)
    }

    /// Creates a gauge. A supplied initial value is emitted right away.
    pub fn gauge(&self, name: &str, initial: Option<f64>, tags: Option<Tags>) -> Box<dyn Gauge> {
        let gauge = self
            .shared
            .gauge
            .create(&self.shared.emitter, self.qualify(name), tags);
        if let Some(value) = initial {
            gauge.update(value);
        }
        gauge
    }

    pub fn histogram(&self, name: &str, tags: Option<Tags>) -> Box<dyn HistogramSource> {
        self.shared
            .histogram
            .create(&self.shared.emitter, self.qualify(name), tags)
    }

    /// Registers a handler for every event of `kind`, whichever scope emits it.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&MetricEvent) + Send + Sync + 'static,
    {
        self.bus().subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus().unsubscribe(id)
    }

    pub fn separator(&self) -> &str {
        self.shared.emitter.separator()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        self.shared.emitter.bus()
    }

    fn qualify(&self, name: &str) -> Arc<str> {
        if self.prefix.is_empty() {
            Arc::from(name)
        } else {
            format!("{}{}", self.prefix, name).into()
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::source::{DefaultCounter, NullCounter};
    use crate::test_support::{capture, tags};
    use std::time::Duration;

    #[derive(Debug)]
    struct ForbidFactory;

    impl CounterFactory for ForbidFactory {
        fn create(&self, emitter: &Emitter, name: Arc<str>, tags: Option<Tags>) -> Box<dyn Counter> {
            if name.starts_with("forbidden") {
                Box::new(NullCounter)
            } else {
                Box::new(DefaultCounter::new(emitter.clone(), name, tags))
            }
        }
    }

    #[test]
    fn test_nested_scope_names() {
        let recorder = Recorder::new();
        let counters = capture(recorder.bus(), EventKind::Counter);
        let timers = capture(recorder.bus(), EventKind::Timer);
        let histograms = capture(recorder.bus(), EventKind::Histogram);

        let scoped = recorder.scope("foo").scope("bar");
        assert_eq!(scoped.prefix(), "foo/bar/");

        scoped.counter("my_counter", None, None).incr(1.0);
        let timer = scoped.timer("my_timer", None);
        let token = timer.start(None);
        timer.stop(token, None).unwrap();
        scoped.histogram("my_histo", None).add(1.0);

        assert_eq!(&*counters.lock()[0].name, "foo/bar/my_counter");
        assert_eq!(&*timers.lock()[0].name, "foo/bar/my_timer");
        assert_eq!(&*histograms.lock()[0].name, "foo/bar/my_histo");
    }

    #[test]
    fn test_custom_separator() {
        let recorder = Recorder::with_config(RecorderConfig::default().with_separator(".")).unwrap();
        let events = capture(recorder.bus(), EventKind::Counter);

        recorder.scope("a").scope("b").counter("c", None, None).incr(1.0);

        assert_eq!(recorder.separator(), ".");
        assert_eq!(&*events.lock()[0].name, "a.b.c");
    }

    #[test]
    fn test_empty_separator_rejected() {
        let err = Recorder::with_config(RecorderConfig::default().with_separator("")).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidConfig(_)));
    }

    #[test]
    fn test_initial_values_are_emitted() {
        let recorder = Recorder::new();
        let counters = capture(recorder.bus(), EventKind::Counter);
        let gauges = capture(recorder.bus(), EventKind::Gauge);

        let counter = recorder.counter("connections", Some(5.0), None);
        counter.incr(1.0);
        recorder.gauge("queue", Some(3.0), None);
        recorder.gauge("idle", None, None);

        let increments: Vec<f64> = counters.lock().iter().map(|e| e.measurement.value()).collect();
        assert_eq!(increments, vec![5.0, 1.0]);
        assert_eq!(gauges.lock().len(), 1);
        assert_eq!(gauges.lock()[0].measurement.value(), 3.0);
    }

    #[test]
    fn test_scope_tags_propagate() {
        let recorder = Recorder::new().scope("scope1");
        let events = capture(recorder.bus(), EventKind::Gauge);

        recorder
            .gauge("toto", Some(5.0), Some(tags(&[("tag0", "test")])))
            .update(12.0);

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| &*e.name == "scope1/toto"));
        assert!(events.iter().all(|e| e.tag("tag0") == Some("test")));
    }

    #[test]
    fn test_disabled_recorder_never_emits() {
        let recorder = Recorder::disabled();
        let events: Vec<_> = EventKind::ALL
            .iter()
            .map(|kind| capture(recorder.bus(), *kind))
            .collect();

        recorder.counter("counter", Some(1.0), None).incr(1.0);
        let timer = recorder.timer("timer", None);
        let token = timer.start(Some(tags(&[("a", "b")])));
        timer.stop(token, None).unwrap();
        recorder.gauge("gauge", Some(2.0), None).update(3.0);
        recorder.histogram("histo", None).add(4.0);

        assert!(events.iter().all(|captured| captured.lock().is_empty()));
    }

    #[test]
    fn test_factory_can_disable_single_metrics() {
        let recorder = Recorder::with_config(RecorderConfig::default().with_counter(ForbidFactory)).unwrap();
        let events = capture(recorder.bus(), EventKind::Counter);

        recorder.counter("forbiddenEvent", Some(1.0), None).incr(1.0);
        assert!(events.lock().is_empty());

        recorder.counter("okEvent", Some(1.0), None);
        assert_eq!(&*events.lock()[0].name, "okEvent");
    }

    #[test]
    fn test_timer_uses_configured_clock() {
        let clock = Arc::new(ManualClock::new(0.0));
        let recorder = Recorder::with_config(RecorderConfig::default().with_clock(clock.clone())).unwrap();
        let events = capture(recorder.bus(), EventKind::Timer);

        let timer = recorder.timer("request_latency", None);
        let token = timer.start(None);
        clock.advance(Duration::from_millis(42));
        timer.stop(token, None).unwrap();

        assert_eq!(events.lock()[0].duration(), Some(42.0));
    }

    #[test]
    fn test_precise_counter_stamps_wall_clock_time() {
        let recorder =
            Recorder::with_config(RecorderConfig::default().with_counter(CounterStrategy::Precise))
                .unwrap();
        let events = capture(recorder.bus(), EventKind::Counter);

        recorder.counter("requests", Some(1.0), None);
        let wall_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as f64;

        let timestamp = events.lock()[0].timestamp.unwrap();
        assert!((wall_ms - timestamp).abs() < 1000.0, "{} vs {}", timestamp, wall_ms);
    }

    #[test]
    fn test_unsubscribe_through_scope() {
        let recorder = Recorder::new();
        let scoped = recorder.scope("s");
        let events = capture(recorder.bus(), EventKind::Counter);
        let id = scoped.subscribe(EventKind::Counter, |_| {});

        assert_eq!(recorder.bus().subscriber_count(EventKind::Counter), 2);
        assert!(recorder.unsubscribe(id));
        scoped.counter("c", Some(1.0), None);
        assert_eq!(events.lock().len(), 1);
    }

    proptest::proptest! {
        #[test]
        fn prop_scope_prefix_joins_segments(
            segments in proptest::collection::vec("[a-z]{1,8}", 0..5),
            name in "[a-z]{1,8}",
        ) {
            let recorder = Recorder::new();
            let events = capture(recorder.bus(), EventKind::Counter);
            let scoped = segments.iter().fold(recorder.clone(), |r, s| r.scope(s));

            scoped.counter(&name, Some(1.0), None);

            let mut expected = segments.clone();
            expected.push(name.clone());
            let emitted = events.lock()[0].name.to_string();
            proptest::prop_assert_eq!(emitted, expected.join("/"));
        }
    }
}

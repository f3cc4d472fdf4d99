use crate::histogram::{Histogram, Snapshot};
use crate::reducer::{
    Composite, Counters, Discard, Histograms, LatestGauge, Reducer, SampleToHistogram,
    SumCounter, TimerToHistogram,
};
use metrix_core::{EventKind, Recorder, Result, SubscriptionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Point-in-time view of an aggregator's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub counters: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, Snapshot>,
}

impl Report {
    pub fn counter(&self, name: &str) -> Option<f64> {
        self.counters.get(name).copied()
    }

    pub fn histogram(&self, name: &str) -> Option<&Snapshot> {
        self.histograms.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.histograms.is_empty()
    }
}

/// One reducer per event kind plus the composites run at report time.
#[derive(Clone)]
pub struct AggregatorConfig {
    pub counter: Arc<dyn Reducer>,
    pub timer: Arc<dyn Reducer>,
    pub gauge: Arc<dyn Reducer>,
    pub histogram: Arc<dyn Reducer>,
    pub composites: Vec<Arc<dyn Composite>>,
}

impl AggregatorConfig {
    /// Ignores every event.
    pub fn discard() -> Self {
        Self {
            counter: Arc::new(Discard),
            timer: Arc::new(Discard),
            gauge: Arc::new(Discard),
            histogram: Arc::new(Discard),
            composites: Vec::new(),
        }
    }

    pub fn with_counter(mut self, reducer: impl Reducer + 'static) -> Self {
        self.counter = Arc::new(reducer);
        self
    }

    pub fn with_timer(mut self, reducer: impl Reducer + 'static) -> Self {
        self.timer = Arc::new(reducer);
        self
    }

    pub fn with_gauge(mut self, reducer: impl Reducer + 'static) -> Self {
        self.gauge = Arc::new(reducer);
        self
    }

    pub fn with_histogram(mut self, reducer: impl Reducer + 'static) -> Self {
        self.histogram = Arc::new(reducer);
        self
    }

    /// Composites run in the order they were added.
    pub fn with_composite(mut self, composite: impl Composite + 'static) -> Self {
        self.composites.push(Arc::new(composite));
        self
    }

    pub fn reducer(&self, kind: EventKind) -> &Arc<dyn Reducer> {
        match kind {
            EventKind::Counter => &self.counter,
            EventKind::Timer => &self.timer,
            EventKind::Gauge => &self.gauge,
            EventKind::Histogram => &self.histogram,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for kind in EventKind::ALL {
            self.reducer(kind).validate()?;
        }
        Ok(())
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            counter: Arc::new(SumCounter),
            timer: Arc::new(TimerToHistogram::default()),
            gauge: Arc::new(LatestGauge),
            histogram: Arc::new(SampleToHistogram::default()),
            composites: Vec::new(),
        }
    }
}

impl fmt::Debug for AggregatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatorConfig")
            .field("counter", &self.counter)
            .field("timer", &self.timer)
            .field("gauge", &self.gauge)
            .field("histogram", &self.histogram)
            .field("composites", &self.composites.len())
            .finish()
    }
}

#[derive(Debug, Default)]
struct AggregatorState {
    counters: Counters,
    histograms: Histograms,
}

/// Folds a recorder's events into counters and histograms.
///
/// State is private to each aggregator: several aggregators can listen to
/// the same recorder with different reducers. Dropping the aggregator
/// unsubscribes it.
pub struct Aggregator {
    recorder: Recorder,
    state: Arc<Mutex<AggregatorState>>,
    composites: Vec<Arc<dyn Composite>>,
    subscriptions: Vec<SubscriptionId>,
}

impl Aggregator {
    pub fn new(recorder: &Recorder, config: AggregatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::attach(recorder, config))
    }

    /// Aggregator with the default reducers.
    pub fn with_defaults(recorder: &Recorder) -> Self {
        Self::attach(recorder, AggregatorConfig::default())
    }

    fn attach(recorder: &Recorder, config: AggregatorConfig) -> Self {
        let state = Arc::new(Mutex::new(AggregatorState::default()));

        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let state = Arc::clone(&state);
                let reducer = Arc::clone(config.reducer(kind));
                recorder.subscribe(kind, move |event| {
                    let mut state = state.lock();
                    let AggregatorState {
                        counters,
                        histograms,
                    } = &mut *state;
                    reducer.reduce(event, histograms, counters);
                })
            })
            .collect();

        info!(
            "Aggregator attached to recorder '{}' with {} composites",
            recorder.prefix(),
            config.composites.len()
        );

        Self {
            recorder: recorder.clone(),
            state,
            composites: config.composites,
            subscriptions,
        }
    }

    /// Snapshots every histogram, then runs the composites over a copy of
    /// the counters. Composite outputs are stored and included in the report.
    ///
    /// Composites run without the aggregator lock held, so they may emit on
    /// the recorder.
    pub fn report(&self) -> Report {
        let (mut counters, histograms) = {
            let state = self.state.lock();
            let histograms: BTreeMap<String, Snapshot> = state
                .histograms
                .iter()
                .map(|(name, histogram)| (name.clone(), histogram.snapshot()))
                .collect();
            (state.counters.clone(), histograms)
        };

        if self.composites.is_empty() {
            return Report {
                counters,
                histograms,
            };
        }

        let mut derived = Vec::new();
        for composite in &self.composites {
            if let Some(pairs) = composite.derive(&counters, &histograms) {
                counters.extend(pairs.iter().cloned());
                derived.extend(pairs);
            }
        }

        let mut state = self.state.lock();
        state.counters.extend(derived);
        Report {
            counters: state.counters.clone(),
            histograms,
        }
    }

    pub fn counter(&self, name: &str) -> Option<f64> {
        self.state.lock().counters.get(name).copied()
    }

    pub fn histogram(&self, name: &str) -> Option<Snapshot> {
        self.state.lock().histograms.get(name).map(|h| h.snapshot())
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.counters.clear();
        state.histograms.clear();
        info!("Aggregator cleared");
    }

    pub fn clear_counters(&self) {
        self.state.lock().counters.clear();
        debug!("Aggregator counters cleared");
    }

    pub fn clear_histograms(&self) {
        self.state.lock().histograms.clear();
        debug!("Aggregator histograms cleared");
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Aggregator")
            .field("counters", &state.counters.len())
            .field("histograms", &state.histograms.len())
            .field("composites", &self.composites.len())
            .finish()
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.recorder.unsubscribe(id);
        }
        debug!("Aggregator detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::HistogramSpec;
    use crate::reducer::{record_sample, MockComposite};
    use metrix_core::{
        Counter, CounterStrategy, Gauge, GaugeStrategy, HistogramSource, ManualClock,
        MetricEvent, MetricsError, RecorderConfig, Tags, Timer,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::time::Duration;

    fn manual_recorder() -> (Recorder, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0.0));
        let recorder =
            Recorder::with_config(RecorderConfig::default().with_clock(clock.clone())).unwrap();
        (recorder, clock)
    }

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_aggregation() {
        let (recorder, clock) = manual_recorder();
        let aggregator = Aggregator::with_defaults(&recorder);

        recorder.counter("counter", Some(3.0), None);
        let connections = recorder.scope("connections");
        connections.counter("add", Some(17.0), None);
        connections.counter("remove", Some(2.0), None);

        let mut rng = StdRng::seed_from_u64(1);
        let request_latency = recorder.timer("request_latency", None);
        let connect_latency = connections.timer("connect_latency", None);
        for _ in 0..128 {
            for timer in [&request_latency, &connect_latency] {
                let token = timer.start(None);
                clock.advance(Duration::from_millis(rng.gen_range(0..=50)));
                timer.stop(token, None).unwrap();
            }
        }

        let report = aggregator.report();
        assert_eq!(report.counter("counter"), Some(3.0));
        assert_eq!(report.counter("connections/add"), Some(17.0));
        assert_eq!(report.counter("connections/remove"), Some(2.0));

        for name in ["request_latency", "connections/connect_latency"] {
            let latency = report.histogram(name).unwrap();
            let (min, max) = (latency.min.unwrap(), latency.max.unwrap());
            assert!((0.0..=10.0).contains(&min), "{} min = {}", name, min);
            assert!((40.0..=50.0).contains(&max), "{} max = {}", name, max);
            let p50 = latency.get("p50").unwrap();
            let p90 = latency.get("p90").unwrap();
            let p99 = latency.get("p99").unwrap();
            assert!((15.0..=35.0).contains(&p50), "{} p50 = {}", name, p50);
            assert!((30.0..=55.0).contains(&p90), "{} p90 = {}", name, p90);
            assert!((40.0..=50.0).contains(&p99), "{} p99 = {}", name, p99);
        }
    }

    #[derive(Debug)]
    struct PerUrlTimer;

    impl Reducer for PerUrlTimer {
        fn reduce(&self, event: &MetricEvent, histograms: &mut Histograms, _: &mut Counters) {
            let Some(duration) = event.duration() else {
                return;
            };
            let spec = HistogramSpec::default();
            record_sample(histograms, &event.name, &spec, duration);
            if let Some(url) = event.tag("url") {
                record_sample(histograms, &format!("{}/{}", url, event.name), &spec, duration);
            }
        }
    }

    #[test]
    fn test_custom_timer_reducer_splits_by_tag() {
        let recorder = Recorder::new();
        let aggregator =
            Aggregator::new(&recorder, AggregatorConfig::default().with_timer(PerUrlTimer))
                .unwrap();
        let timer = recorder.timer("request_latency_ms", None);

        for url in ["home", "edit", "explore"] {
            for _ in 0..100 {
                let token = timer.start(None);
                timer.stop(token, Some(tags(&[("url", url)]))).unwrap();
            }
        }

        let report = aggregator.report();
        assert_eq!(report.histograms.len(), 4);
        for name in [
            "request_latency_ms",
            "home/request_latency_ms",
            "edit/request_latency_ms",
            "explore/request_latency_ms",
        ] {
            assert!(report.histogram(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_composite_counters() {
        let recorder = Recorder::new();
        let config = AggregatorConfig::default()
            .with_composite(|counters: &Counters, _: &BTreeMap<String, Snapshot>| {
                let current = counters.get("connections/add")? - counters.get("connections/remove")?;
                Some(vec![("connections/current".to_string(), current)])
            })
            .with_composite(|counters: &Counters, _: &BTreeMap<String, Snapshot>| {
                let (a, b, c) = (counters.get("a")?, counters.get("b")?, counters.get("c")?);
                Some(vec![
                    ("d".to_string(), a + b + c),
                    ("e".to_string(), a * b * c),
                ])
            });
        let aggregator = Aggregator::new(&recorder, config).unwrap();

        let scope = recorder.scope("connections");
        let add = scope.counter("add", None, None);
        let remove = scope.counter("remove", None, None);
        for _ in 0..3 {
            add.incr(1.0);
        }
        remove.incr(1.0);
        remove.incr(1.0);

        recorder.counter("a", Some(10.0), None);
        recorder.counter("b", Some(30.0), None);
        recorder.counter("c", Some(5.0), None);

        let report = aggregator.report();
        assert_eq!(report.counter("connections/current"), Some(1.0));
        assert_eq!(report.counter("d"), Some(45.0));
        assert_eq!(report.counter("e"), Some(1500.0));

        // Outputs persist between reports.
        assert_eq!(aggregator.counter("connections/current"), Some(1.0));
        assert_eq!(aggregator.report().counter("connections/current"), Some(1.0));
    }

    #[test]
    fn test_composite_may_emit_on_recorder() {
        let recorder = Recorder::new();
        let inner = recorder.clone();
        let config = AggregatorConfig::default().with_composite(
            move |counters: &Counters, _: &BTreeMap<String, Snapshot>| {
                inner.counter("report_runs", Some(1.0), None);
                Some(vec![("seen".to_string(), counters.len() as f64)])
            },
        );
        let aggregator = Aggregator::new(&recorder, config).unwrap();
        recorder.counter("requests", Some(4.0), None);

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let first = aggregator.report();
            let second = aggregator.report();
            let _ = tx.send((first, second));
        });
        let (first, second) = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("report blocked while a composite emitted");

        assert_eq!(first.counter("requests"), Some(4.0));
        assert_eq!(first.counter("seen"), Some(1.0));
        assert_eq!(first.counter("report_runs"), Some(1.0));
        assert_eq!(second.counter("report_runs"), Some(2.0));
    }

    #[test]
    fn test_composites_see_earlier_outputs_and_snapshots() {
        let recorder = Recorder::new();
        let mut first = MockComposite::new();
        first
            .expect_derive()
            .times(1)
            .returning(|counters, histograms| {
                assert_eq!(counters.get("hits"), Some(&2.0));
                assert_eq!(histograms["size"].max, Some(9.0));
                Some(vec![("first".to_string(), 1.0)])
            });
        let mut second = MockComposite::new();
        second
            .expect_derive()
            .times(1)
            .returning(|counters, _| {
                assert_eq!(counters.get("first"), Some(&1.0));
                None
            });

        let aggregator = Aggregator::new(
            &recorder,
            AggregatorConfig::default()
                .with_composite(first)
                .with_composite(second),
        )
        .unwrap();

        recorder.counter("hits", Some(2.0), None);
        recorder.histogram("size", None).add(9.0);

        let report = aggregator.report();
        assert_eq!(report.counter("first"), Some(1.0));
        assert_eq!(report.counter("hits"), Some(2.0));
    }

    #[test]
    fn test_gauges_report_latest_value() {
        let recorder = Recorder::new();
        let aggregator = Aggregator::with_defaults(&recorder);

        let gauge = recorder.gauge("temperature", Some(20.0), None);
        gauge.update(25.0);
        gauge.update(22.5);

        assert_eq!(aggregator.report().counter("temperature"), Some(22.5));
    }

    #[test]
    fn test_precise_gauge_feeds_histogram() {
        let recorder = Recorder::with_config(
            RecorderConfig::default().with_gauge(GaugeStrategy::Precise),
        )
        .unwrap();
        let aggregator = Aggregator::with_defaults(&recorder);

        let gauge = recorder.gauge("queue", None, None);
        for value in [1.0, 5.0, 3.0] {
            gauge.update(value);
        }

        let report = aggregator.report();
        assert_eq!(report.counter("queue"), Some(3.0));
        let histogram = report.histogram("queue/histogram").unwrap();
        assert_eq!(histogram.min, Some(1.0));
        assert_eq!(histogram.max, Some(5.0));
    }

    #[test]
    fn test_report_does_not_reset_state() {
        let recorder = Recorder::new();
        let aggregator = Aggregator::with_defaults(&recorder);
        let counter = recorder.counter("hits", None, None);

        counter.incr(1.0);
        assert_eq!(aggregator.report().counter("hits"), Some(1.0));
        counter.incr(1.0);
        assert_eq!(aggregator.report().counter("hits"), Some(2.0));
    }

    #[test]
    fn test_clear_keeps_subscription() {
        let recorder = Recorder::new();
        let aggregator = Aggregator::with_defaults(&recorder);
        let counter = recorder.counter("hits", Some(4.0), None);
        let histogram = recorder.histogram("size", None);
        histogram.add(3.0);

        aggregator.clear_histograms();
        let report = aggregator.report();
        assert!(report.histograms.is_empty());
        assert_eq!(report.counter("hits"), Some(4.0));

        histogram.add(3.0);
        aggregator.clear_counters();
        let report = aggregator.report();
        assert!(report.counters.is_empty());
        assert_eq!(report.histogram("size").unwrap().min, Some(3.0));

        aggregator.clear();
        assert!(aggregator.report().is_empty());

        counter.incr(2.0);
        assert_eq!(aggregator.report().counter("hits"), Some(2.0));
    }

    #[test]
    fn test_independent_aggregators() {
        let recorder = Recorder::new();
        let summing = Aggregator::with_defaults(&recorder);
        let discarding = Aggregator::new(&recorder, AggregatorConfig::discard()).unwrap();

        recorder.counter("hits", Some(1.0), None);

        assert_eq!(summing.report().counter("hits"), Some(1.0));
        assert!(discarding.report().is_empty());
    }

    #[test]
    fn test_disabled_recorder_never_reaches_aggregator() {
        let recorder = Recorder::disabled();
        let aggregator = Aggregator::with_defaults(&recorder);

        recorder.counter("c", Some(1.0), None).incr(1.0);
        let timer = recorder.timer("t", None);
        timer.stop(timer.start(None), None).unwrap();
        recorder.gauge("g", Some(1.0), None).update(2.0);
        recorder.histogram("h", None).add(1.0);

        assert!(aggregator.report().is_empty());
    }

    #[test]
    fn test_disabled_counter_strategy_only_silences_counters() {
        let recorder = Recorder::with_config(
            RecorderConfig::default().with_counter(CounterStrategy::Disabled),
        )
        .unwrap();
        let aggregator = Aggregator::with_defaults(&recorder);

        recorder.counter("c", Some(1.0), None);
        recorder.gauge("g", Some(1.0), None);

        let report = aggregator.report();
        assert_eq!(report.counter("c"), None);
        assert_eq!(report.counter("g"), Some(1.0));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let recorder = Recorder::new();
        let aggregator = Aggregator::with_defaults(&recorder);
        for kind in EventKind::ALL {
            assert_eq!(recorder.bus().subscriber_count(kind), 1);
        }

        drop(aggregator);
        for kind in EventKind::ALL {
            assert_eq!(recorder.bus().subscriber_count(kind), 0);
        }
        recorder.counter("after", Some(1.0), None);
    }

    #[derive(Debug)]
    struct Rejecting;

    impl Reducer for Rejecting {
        fn reduce(&self, _: &MetricEvent, _: &mut Histograms, _: &mut Counters) {}

        fn validate(&self) -> Result<()> {
            Err(MetricsError::InvalidConfig("rejected".to_string()))
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let recorder = Recorder::new();
        let result = Aggregator::new(&recorder, AggregatorConfig::default().with_gauge(Rejecting));
        assert!(matches!(result, Err(MetricsError::InvalidConfig(_))));
        for kind in EventKind::ALL {
            assert_eq!(recorder.bus().subscriber_count(kind), 0);
        }
    }

    #[test]
    fn test_streaming_timer_histograms() {
        let (recorder, clock) = manual_recorder();
        let reducer = TimerToHistogram::new(HistogramSpec::Streaming {
            quantiles: vec![0.5, 0.9],
            seed: Some(3),
        })
        .unwrap();
        let aggregator =
            Aggregator::new(&recorder, AggregatorConfig::default().with_timer(reducer)).unwrap();

        let timer = recorder.timer("work", None);
        for ms in [10, 10, 10] {
            let token = timer.start(None);
            clock.advance(Duration::from_millis(ms));
            timer.stop(token, None).unwrap();
        }

        let report = aggregator.report();
        let snapshot = report.histogram("work").unwrap();
        assert_eq!(snapshot.get("p50"), Some(10.0));
        assert_eq!(snapshot.get("p90"), Some(10.0));
    }

    #[test]
    fn test_report_serializes() {
        let recorder = Recorder::new();
        let aggregator = Aggregator::with_defaults(&recorder);
        recorder.counter("hits", Some(2.0), None);
        recorder.histogram("size", None).add(4.0);

        let json = serde_json::to_value(aggregator.report()).unwrap();
        assert_eq!(json["counters"]["hits"], 2.0);
        assert_eq!(json["histograms"]["size"]["p50"], 4.0);
        assert_eq!(json["histograms"]["size"]["min"], 4.0);
    }
}

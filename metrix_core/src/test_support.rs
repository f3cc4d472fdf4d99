use crate::bus::EventBus;
use crate::clock::ManualClock;
use crate::event::{EventKind, MetricEvent, Tags};
use crate::source::Emitter;
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) fn manual_emitter(start_ms: f64) -> (Emitter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_ms));
    let emitter = Emitter::new(Arc::new(EventBus::new()), "/", clock.clone());
    (emitter, clock)
}

pub(crate) fn capture(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<MetricEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    bus.subscribe(kind, move |event| sink.lock().push(event.clone()));
    events
}

pub(crate) fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

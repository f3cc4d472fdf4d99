use super::{Counter, Emitter};
use crate::event::{MetricEvent, Measurement, Tags};
use std::sync::Arc;

/// Counter emitting one delta event per call.
#[derive(Debug)]
pub struct DefaultCounter {
    emitter: Emitter,
    name: Arc<str>,
    tags: Option<Arc<Tags>>,
}

impl DefaultCounter {
    pub fn new(emitter: Emitter, name: Arc<str>, tags: Option<Tags>) -> Self {
        Self {
            emitter,
            name,
            tags: tags.filter(|t| !t.is_empty()).map(Arc::new),
        }
    }
}

impl Counter for DefaultCounter {
    fn incr(&self, n: f64) {
        let event = MetricEvent::new(self.name.clone(), Measurement::Counter { increment: n })
            .with_tags(self.tags.clone());
        self.emitter.emit(&event);
    }
}

/// Counter that also records when each increment happened.
#[derive(Debug)]
pub struct PreciseCounter {
    emitter: Emitter,
    name: Arc<str>,
    tags: Option<Arc<Tags>>,
}

impl PreciseCounter {
    pub fn new(emitter: Emitter, name: Arc<str>, tags: Option<Tags>) -> Self {
        Self {
            emitter,
            name,
            tags: tags.filter(|t| !t.is_empty()).map(Arc::new),
        }
    }
}

impl Counter for PreciseCounter {
    fn incr(&self, n: f64) {
        let event = MetricEvent::new(self.name.clone(), Measurement::Counter { increment: n })
            .with_tags(self.tags.clone())
            .with_timestamp(self.emitter.now_ms());
        self.emitter.emit(&event);
    }
}

use super::{Emitter, HistogramSource};
use crate::event::{MetricEvent, Measurement, Tags};
use std::sync::Arc;

/// Histogram source forwarding every sample as a histogram event.
#[derive(Debug)]
pub struct DefaultHistogram {
    emitter: Emitter,
    name: Arc<str>,
    tags: Option<Arc<Tags>>,
}

impl DefaultHistogram {
    pub fn new(emitter: Emitter, name: Arc<str>, tags: Option<Tags>) -> Self {
        Self {
            emitter,
            name,
            tags: tags.filter(|t| !t.is_empty()).map(Arc::new),
        }
    }
}

impl HistogramSource for DefaultHistogram {
    fn add(&self, value: f64) {
        let event = MetricEvent::new(self.name.clone(), Measurement::Histogram { value })
            .with_tags(self.tags.clone());
        self.emitter.emit(&event);
    }
}

use super::{Emitter, Gauge};
use crate::event::{MetricEvent, Measurement, Tags};
use std::sync::Arc;

/// Suffix appended (after the separator) to the histogram twin of a precise gauge.
pub const HISTOGRAM_SUFFIX: &str = "histogram";

#[derive(Debug)]
pub struct DefaultGauge {
    emitter: Emitter,
    name: Arc<str>,
    tags: Option<Arc<Tags>>,
}

impl DefaultGauge {
    pub fn new(emitter: Emitter, name: Arc<str>, tags: Option<Tags>) -> Self {
        Self {
            emitter,
            name,
            tags: tags.filter(|t| !t.is_empty()).map(Arc::new),
        }
    }
}

impl Gauge for DefaultGauge {
    fn update(&self, value: f64) {
        let event = MetricEvent::new(self.name.clone(), Measurement::Gauge { value })
            .with_tags(self.tags.clone());
        self.emitter.emit(&event);
    }
}

/// Gauge that also feeds every value to a histogram named
/// `<name><separator>histogram`, so the distribution of values is kept too.
#[derive(Debug)]
pub struct PreciseGauge {
    emitter: Emitter,
    name: Arc<str>,
    histogram_name: Arc<str>,
    tags: Option<Arc<Tags>>,
}

impl PreciseGauge {
    pub fn new(emitter: Emitter, name: Arc<str>, tags: Option<Tags>) -> Self {
        let histogram_name: Arc<str> =
            format!("{}{}{}", name, emitter.separator(), HISTOGRAM_SUFFIX).into();
        Self {
            emitter,
            name,
            histogram_name,
            tags: tags.filter(|t| !t.is_empty()).map(Arc::new),
        }
    }

    pub fn histogram_name(&self) -> &str {
        &self.histogram_name
    }
}

impl Gauge for PreciseGauge {
    fn update(&self, value: f64) {
        let gauge = MetricEvent::new(self.name.clone(), Measurement::Gauge { value })
            .with_tags(self.tags.clone());
        self.emitter.emit(&gauge);

        let sample = MetricEvent::new(self.histogram_name.clone(), Measurement::Histogram { value })
            .with_tags(self.tags.clone());
        self.emitter.emit(&sample);
    }
}

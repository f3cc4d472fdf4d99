use super::{Emitter, Timer};
use crate::error::{MetricsError, Result};
use crate::event::{merge_tags, MetricEvent, Measurement, Tags};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Opaque value returned by [`Timer::start`] and handed back to `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TimerToken {
    /// No start recorded. Disabled timers hand these out; active timers
    /// reject them.
    #[default]
    Unset,
    /// Start timestamp in clock milliseconds.
    Started(f64),
    /// Negative handle into the timer's pending buffer, used when tags were
    /// given at start. Handles are unique across every timer in the process.
    Pending(i64),
}

static NEXT_HANDLE: AtomicI64 = AtomicI64::new(-1);

#[derive(Debug)]
struct PendingStart {
    start_ts: f64,
    tags: Tags,
}

/// Timer merging creation, start and stop tags into each emitted event.
#[derive(Debug)]
pub struct DefaultTimer {
    emitter: Emitter,
    name: Arc<str>,
    tags: Option<Arc<Tags>>,
    pending: Mutex<HashMap<i64, PendingStart>>,
}

impl DefaultTimer {
    pub fn new(emitter: Emitter, name: Arc<str>, tags: Option<Tags>) -> Self {
        Self {
            emitter,
            name,
            tags: tags.filter(|t| !t.is_empty()).map(Arc::new),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Number of tagged starts still waiting for their stop.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Timer for DefaultTimer {
    fn start(&self, tags: Option<Tags>) -> TimerToken {
        let start_ts = self.emitter.now_ms();
        match tags.filter(|t| !t.is_empty()) {
            Some(tags) => {
                let handle = NEXT_HANDLE.fetch_sub(1, Ordering::Relaxed);
                self.pending
                    .lock()
                    .insert(handle, PendingStart { start_ts, tags });
                TimerToken::Pending(handle)
            }
            None => TimerToken::Started(start_ts),
        }
    }

    fn stop(&self, token: TimerToken, tags: Option<Tags>) -> Result<()> {
        let stop_ts = self.emitter.now_ms();
        let (start_ts, start_tags) = match token {
            TimerToken::Unset => {
                warn!("Timer '{}' stopped without a start token", self.name);
                return Err(MetricsError::MissingStartToken(self.name.to_string()));
            }
            TimerToken::Started(start_ts) => (start_ts, None),
            TimerToken::Pending(handle) => {
                let pending = self.pending.lock().remove(&handle).ok_or_else(|| {
                    warn!("Timer '{}' has no pending start {}", self.name, handle);
                    MetricsError::UnknownTimerToken {
                        name: self.name.to_string(),
                        handle,
                    }
                })?;
                (pending.start_ts, Some(pending.tags))
            }
        };

        let stop_tags = tags.filter(|t| !t.is_empty());
        let event_tags = if start_tags.is_none() && stop_tags.is_none() {
            self.tags.clone()
        } else {
            merge_tags(&[self.tags.as_deref(), start_tags.as_ref(), stop_tags.as_ref()])
        };

        let event = MetricEvent::new(self.name.clone(), Measurement::Timer { start_ts, stop_ts })
            .with_tags(event_tags);
        self.emitter.emit(&event);
        Ok(())
    }
}

/// Timer ignoring every tag it is given.
#[derive(Debug)]
pub struct NoTagTimer {
    emitter: Emitter,
    name: Arc<str>,
}

impl NoTagTimer {
    pub fn new(emitter: Emitter, name: Arc<str>) -> Self {
        Self { emitter, name }
    }
}

impl Timer for NoTagTimer {
    fn start(&self, _tags: Option<Tags>) -> TimerToken {
        TimerToken::Started(self.emitter.now_ms())
    }

    fn stop(&self, token: TimerToken, _tags: Option<Tags>) -> Result<()> {
        let start_ts = match token {
            TimerToken::Started(start_ts) => start_ts,
            TimerToken::Unset => {
                return Err(MetricsError::MissingStartToken(self.name.to_string()));
            }
            TimerToken::Pending(handle) => {
                return Err(MetricsError::UnknownTimerToken {
                    name: self.name.to_string(),
                    handle,
                });
            }
        };

        let stop_ts = self.emitter.now_ms();
        let event = MetricEvent::new(self.name.clone(), Measurement::Timer { start_ts, stop_ts });
        self.emitter.emit(&event);
        Ok(())
    }
}

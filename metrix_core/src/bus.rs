use crate::event::{EventKind, MetricEvent};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Callback invoked synchronously for every event of the kind it subscribed to.
pub type Handler = Arc<dyn Fn(&MetricEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscribers = Arc<Vec<(SubscriptionId, Handler)>>;

/// Synchronous publish/subscribe channel shared by a recorder and its scopes.
///
/// Each event kind has its own ordered subscriber list. `publish` returns only
/// after every subscriber registered at the time of the call has run, in
/// subscription order. Lists are copy-on-write, so a handler may subscribe or
/// unsubscribe without deadlocking; the change applies from the next event.
pub struct EventBus {
    subscribers: [RwLock<Subscribers>; 4],
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: std::array::from_fn(|_| RwLock::new(Arc::new(Vec::new()))),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&MetricEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut slot = self.subscribers[kind.index()].write();
        let mut list = Vec::with_capacity(slot.len() + 1);
        list.extend(slot.iter().cloned());
        list.push((id, Arc::new(handler) as Handler));
        *slot = Arc::new(list);

        debug!("Subscribed {:?} to {} events", id, kind);
        id
    }

    /// Removes a subscription from whichever kind it belongs to.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        for slot in &self.subscribers {
            let mut slot = slot.write();
            if slot.iter().any(|(existing, _)| *existing == id) {
                let list: Vec<_> = slot
                    .iter()
                    .filter(|(existing, _)| *existing != id)
                    .cloned()
                    .collect();
                *slot = Arc::new(list);
                debug!("Unsubscribed {:?}", id);
                return true;
            }
        }
        false
    }

    pub fn publish(&self, event: &MetricEvent) {
        let subscribers = self.subscribers[event.kind().index()].read().clone();
        trace!(
            "Dispatching {} event '{}' to {} subscribers",
            event.kind(),
            event.name,
            subscribers.len()
        );

        for (_, handler) in subscribers.iter() {
            handler(event);
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers[kind.index()].read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("EventBus");
        for kind in EventKind::ALL {
            s.field(kind.as_str(), &self.subscriber_count(kind));
        }
        s.finish()
    }
}

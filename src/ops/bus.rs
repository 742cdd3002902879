use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::model::snapshot::Snapshot;

pub type SubscriptionId = u64;

type Callback = Rc<dyn Fn(&Rc<Snapshot>)>;

#[derive(Default)]
struct BusInner {
    next_id: Cell<SubscriptionId>,
    subscribers: RefCell<Vec<(SubscriptionId, Callback)>>,
}

/// Synchronous fan-out of committed snapshots.
///
/// Subscribers are called in registration order. Unsubscribing from inside a
/// callback is allowed and takes effect immediately, including for the
/// delivery in progress; subscribers added during a delivery first hear the
/// next one. Clones share the same subscriber list.
#[derive(Clone, Default)]
pub struct ChangeBus {
    inner: Rc<BusInner>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&Rc<Snapshot>) + 'static) -> SubscriptionId {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .any(|(sid, _)| *sid == id)
    }

    /// Deliver `snapshot` to every subscriber. Returns how many were called.
    pub fn publish(&self, snapshot: &Rc<Snapshot>) -> usize {
        // No borrow is held while callbacks run
        let targets: Vec<(SubscriptionId, Callback)> = self.inner.subscribers.borrow().clone();
        let mut delivered = 0;
        for (id, callback) in targets {
            if !self.is_subscribed(id) {
                continue;
            }
            callback(snapshot);
            delivered += 1;
        }
        debug!(
            generation = snapshot.generation,
            subscribers = delivered,
            "snapshot published"
        );
        delivered
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

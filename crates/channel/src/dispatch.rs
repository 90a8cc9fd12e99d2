use crate::error::ChannelError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tradesync_protocol::{ChangeEvent, FilterSet, RawNotice};

/// Typed listener attached to a channel handle.
///
/// `on_event` receives insert/update events in registration order. Errors
/// (open failure, remote disconnect) arrive once via `on_error`, never through
/// the data callback.
pub trait ChannelObserver: Send + Sync {
    fn on_event(&self, event: &ChangeEvent);

    fn on_error(&self, error: &ChannelError) {
        let _ = error;
    }
}

/// Closure adapter for callers that only care about data events.
pub struct FnObserver<F> {
    callback: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Arc<Self> {
        Arc::new(Self { callback })
    }
}

impl<F> ChannelObserver for FnObserver<F>
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_event(&self, event: &ChangeEvent) {
        (self.callback)(event);
    }
}

/// Ordered set of observers sharing one channel handle.
///
/// Registration order is invocation order. The set does not buffer: a notice
/// arriving while no observers are registered is dropped.
pub(crate) struct ObserverSet {
    slots: Mutex<Vec<(u64, Arc<dyn ChannelObserver>)>>,
    next_id: AtomicU64,
}

impl ObserverSet {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn register(&self, observer: Arc<dyn ChannelObserver>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        match self.slots.lock() {
            Ok(mut slots) => slots.push((id, observer)),
            Err(_) => log::warn!("observer set lock poisoned during register"),
        }
        id
    }

    /// Remove a registration. Returns the remaining count, or `None` if the
    /// id was not present (already removed).
    pub(crate) fn remove(&self, id: u64) -> Option<usize> {
        let Ok(mut slots) = self.slots.lock() else {
            log::warn!("observer set lock poisoned during remove");
            return None;
        };
        let before = slots.len();
        slots.retain(|(slot_id, _)| *slot_id != id);
        (slots.len() < before).then_some(slots.len())
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.clear();
        }
    }

    /// Translate a raw notice and fan it out.
    ///
    /// Deletes are dropped (consumers reconcile removals via the pull path),
    /// as are payloads that do not satisfy the handle's filter set.
    pub(crate) fn dispatch(&self, notice: RawNotice, filters: &FilterSet) {
        if !filters.matches(&notice.payload) {
            return;
        }
        let Some(event) = notice.into_event() else {
            return;
        };

        // Snapshot outside the lock so a callback can unsubscribe freely.
        let observers: Vec<Arc<dyn ChannelObserver>> = match self.slots.lock() {
            Ok(slots) => slots.iter().map(|(_, obs)| obs.clone()).collect(),
            Err(_) => {
                log::warn!("observer set lock poisoned during dispatch");
                return;
            }
        };
        for observer in observers {
            observer.on_event(&event);
        }
    }

    /// Deliver an error once to every registered observer.
    pub(crate) fn fail_all(&self, error: &ChannelError) {
        let observers: Vec<Arc<dyn ChannelObserver>> = match self.slots.lock() {
            Ok(slots) => slots.iter().map(|(_, obs)| obs.clone()).collect(),
            Err(_) => return,
        };
        for observer in observers {
            observer.on_error(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tradesync_protocol::ChangeKind;

    struct Recorder {
        order: Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
        errors: AtomicUsize,
    }

    impl ChannelObserver for Recorder {
        fn on_event(&self, _event: &ChangeEvent) {
            self.order.lock().unwrap().push(self.tag);
        }

        fn on_error(&self, _error: &ChannelError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn recorder(order: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Arc<Recorder> {
        Arc::new(Recorder {
            order: order.clone(),
            tag,
            errors: AtomicUsize::new(0),
        })
    }

    #[test]
    fn dispatch_follows_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new();
        set.register(recorder(&order, "first"));
        set.register(recorder(&order, "second"));

        set.dispatch(
            RawNotice::new(ChangeKind::Insert, json!({"id": "a"})),
            &FilterSet::new(),
        );

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn deletes_are_not_forwarded() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new();
        set.register(recorder(&order, "only"));

        set.dispatch(
            RawNotice::new(ChangeKind::Delete, json!({"id": "a"})),
            &FilterSet::new(),
        );

        assert!(order.lock().unwrap().is_empty());
    }

    #[test]
    fn non_matching_payloads_are_dropped() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new();
        set.register(recorder(&order, "only"));

        let filters = FilterSet::new().with("material", "cement");
        set.dispatch(
            RawNotice::new(ChangeKind::Insert, json!({"material": "steel"})),
            &filters,
        );
        assert!(order.lock().unwrap().is_empty());

        set.dispatch(
            RawNotice::new(ChangeKind::Insert, json!({"material": "cement"})),
            &filters,
        );
        assert_eq!(order.lock().unwrap().len(), 1);
    }

    #[test]
    fn remove_reports_remaining_and_missing_ids() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new();
        let a = set.register(recorder(&order, "a"));
        let b = set.register(recorder(&order, "b"));

        assert_eq!(set.remove(a), Some(1));
        assert_eq!(set.remove(a), None);
        assert_eq!(set.remove(b), Some(0));
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn fail_all_reaches_every_observer_once() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new();
        let first = recorder(&order, "a");
        let second = recorder(&order, "b");
        set.register(first.clone());
        set.register(second.clone());

        set.fail_all(&ChannelError::OpenFailed("boom".into()));

        assert_eq!(first.errors.load(Ordering::SeqCst), 1);
        assert_eq!(second.errors.load(Ordering::SeqCst), 1);
    }
}

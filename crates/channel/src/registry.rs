use crate::dispatch::{ChannelObserver, ObserverSet};
use crate::error::ChannelError;
use crate::transport::{ChannelCloser, ChannelTransport, CloseOutcome};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, watch};
use tradesync_protocol::{Collection, FilterSet, RawNotice, SubscriptionKey};

/// Lifecycle of one channel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Connecting,
    Open,
    Closing,
    Closed,
}

struct HandleEntry {
    key: SubscriptionKey,
    filters: FilterSet,
    state: Mutex<HandleState>,
    observers: ObserverSet,
    shutdown: watch::Sender<bool>,
    closer: Mutex<Option<Box<dyn ChannelCloser>>>,
}

impl HandleEntry {
    fn new(key: SubscriptionKey, filters: FilterSet) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            key,
            filters,
            state: Mutex::new(HandleState::Connecting),
            observers: ObserverSet::new(),
            shutdown,
            closer: Mutex::new(None),
        }
    }

    fn state(&self) -> HandleState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(HandleState::Closed)
    }

    fn is_alive(&self) -> bool {
        matches!(self.state(), HandleState::Connecting | HandleState::Open)
    }
}

struct CloseRequest {
    key: SubscriptionKey,
    closer: Box<dyn ChannelCloser>,
}

struct RegistryInner {
    transport: Arc<dyn ChannelTransport>,
    handles: Mutex<HashMap<SubscriptionKey, Arc<HandleEntry>>>,
    close_tx: mpsc::UnboundedSender<CloseRequest>,
}

impl RegistryInner {
    /// Drop the map entry, but only if it still points at this handle. A
    /// successor handle may already occupy the key.
    fn remove_entry(&self, entry: &Arc<HandleEntry>) {
        let Ok(mut handles) = self.handles.lock() else {
            log::warn!("handle map lock poisoned during remove");
            return;
        };
        if handles
            .get(&entry.key)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
        {
            handles.remove(&entry.key);
        }
    }

    fn enqueue_close(&self, entry: &Arc<HandleEntry>) {
        let closer = match entry.closer.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(closer) = closer {
            let _ = self.close_tx.send(CloseRequest {
                key: entry.key.clone(),
                closer,
            });
        }
    }
}

/// Multiplexes push channels so equivalent filter sets share one transport
/// connection, and teardown is idempotent and race-safe.
///
/// Constructible per instance; tests build a fresh registry each, production
/// may install one process-wide via [`install_global`](crate::install_global).
#[derive(Clone)]
pub struct ChannelRegistry {
    inner: Arc<RegistryInner>,
}

impl ChannelRegistry {
    /// Build a registry over a transport. Spawns the janitor task that awaits
    /// transport closes off the caller's path, so this must run inside a
    /// tokio runtime.
    pub fn new(transport: Arc<dyn ChannelTransport>) -> Self {
        let (close_tx, mut close_rx) = mpsc::unbounded_channel::<CloseRequest>();

        tokio::spawn(async move {
            while let Some(req) = close_rx.recv().await {
                match req.closer.close().await {
                    CloseOutcome::Closed => {
                        log::debug!("channel {} closed", req.key);
                    }
                    CloseOutcome::AlreadyClosed => {
                        log::debug!("channel {} was already closed", req.key);
                    }
                    CloseOutcome::Failed(reason) => {
                        log::warn!("closing channel {} failed: {reason}", req.key);
                    }
                }
            }
        });

        Self {
            inner: Arc::new(RegistryInner {
                transport,
                handles: Mutex::new(HashMap::new()),
                close_tx,
            }),
        }
    }

    /// Subscribe an observer to the filtered change stream for a collection.
    ///
    /// Filter sets canonicalize into a subscription key; at most one transport
    /// channel is opened per key. If a handle for the key is already
    /// connecting or open, the observer joins it (fan-out) without a second
    /// transport open.
    ///
    /// Never panics and never returns an error: if the transport open fails,
    /// every observer registered on the handle hears about it once via
    /// `on_error`, and the returned subscription is inert.
    pub async fn subscribe(
        &self,
        collection: &Collection,
        filters: FilterSet,
        observer: Arc<dyn ChannelObserver>,
    ) -> Subscription {
        let key = SubscriptionKey::new(collection, &filters);

        let (entry, observer_id, opened_here) = {
            let Ok(mut handles) = self.inner.handles.lock() else {
                log::warn!("handle map lock poisoned during subscribe");
                let entry = Arc::new(HandleEntry::new(key, filters));
                observer.on_error(&ChannelError::Other("registry unavailable".into()));
                return Subscription::inert(entry);
            };
            match handles.get(&key) {
                Some(existing) if existing.is_alive() => {
                    let id = existing.observers.register(observer);
                    (existing.clone(), id, false)
                }
                _ => {
                    let entry = Arc::new(HandleEntry::new(key.clone(), filters.clone()));
                    let id = entry.observers.register(observer);
                    handles.insert(key, entry.clone());
                    (entry, id, true)
                }
            }
        };

        if opened_here {
            match self.inner.transport.open(collection, &filters).await {
                Ok(conn) => {
                    if let Ok(mut slot) = entry.closer.lock() {
                        *slot = Some(conn.closer);
                    }
                    // Everyone may have unsubscribed while we were connecting.
                    let start_pump = match entry.state.lock() {
                        Ok(mut state) => {
                            if *state == HandleState::Closing {
                                false
                            } else {
                                *state = HandleState::Open;
                                true
                            }
                        }
                        Err(_) => false,
                    };
                    if start_pump {
                        spawn_pump(
                            Arc::downgrade(&self.inner),
                            entry.clone(),
                            conn.notices,
                        );
                    } else {
                        self.inner.enqueue_close(&entry);
                    }
                }
                Err(err) => {
                    let error = ChannelError::OpenFailed(err.to_string());
                    log::warn!("opening channel {} failed: {error}", entry.key);
                    if let Ok(mut state) = entry.state.lock() {
                        *state = HandleState::Closed;
                    }
                    self.inner.remove_entry(&entry);
                    entry.observers.fail_all(&error);
                }
            }
        }

        Subscription {
            inner: Arc::downgrade(&self.inner),
            entry,
            id: observer_id,
            done: AtomicBool::new(false),
        }
    }

    /// Tear down every handle. Used at full shutdown.
    pub fn unsubscribe_all(&self) {
        let entries: Vec<Arc<HandleEntry>> = {
            let Ok(mut handles) = self.inner.handles.lock() else {
                log::warn!("handle map lock poisoned during unsubscribe_all");
                return;
            };
            handles.drain().map(|(_, entry)| entry).collect()
        };

        for entry in entries {
            let previous = match entry.state.lock() {
                Ok(mut state) => {
                    let previous = *state;
                    if matches!(previous, HandleState::Connecting | HandleState::Open) {
                        *state = HandleState::Closing;
                    }
                    previous
                }
                Err(_) => continue,
            };
            entry.observers.clear();
            if previous == HandleState::Open {
                let _ = entry.shutdown.send(true);
                self.inner.enqueue_close(&entry);
            }
            // Connecting handles are closed by their opener once the
            // transport settles.
        }
    }

    /// Subscription keys with a live (connecting or open) handle.
    pub fn list_active(&self) -> Vec<SubscriptionKey> {
        match self.inner.handles.lock() {
            Ok(handles) => handles
                .iter()
                .filter(|(_, entry)| entry.is_alive())
                .map(|(key, _)| key.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn is_open(&self, key: &SubscriptionKey) -> bool {
        match self.inner.handles.lock() {
            Ok(handles) => handles
                .get(key)
                .is_some_and(|entry| entry.state() == HandleState::Open),
            Err(_) => false,
        }
    }

    /// Lifecycle state of the handle for a key, if one exists.
    pub fn handle_state(&self, key: &SubscriptionKey) -> Option<HandleState> {
        match self.inner.handles.lock() {
            Ok(handles) => handles.get(key).map(|entry| entry.state()),
            Err(_) => None,
        }
    }
}

/// Guard for one observer registration.
///
/// `unsubscribe` is idempotent and safe to call at any time, any number of
/// times, from any task, including after the transport already closed on its
/// own. Dropping the guard unsubscribes too.
pub struct Subscription {
    inner: Weak<RegistryInner>,
    entry: Arc<HandleEntry>,
    id: u64,
    done: AtomicBool,
}

impl Subscription {
    fn inert(entry: Arc<HandleEntry>) -> Self {
        Self {
            inner: Weak::new(),
            entry,
            id: 0,
            done: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn key(&self) -> &SubscriptionKey {
        &self.entry.key
    }

    pub fn unsubscribe(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        release(&inner, &self.entry, self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Remove one registration; tear the handle down when it was the last.
fn release(inner: &RegistryInner, entry: &Arc<HandleEntry>, id: u64) {
    let Some(remaining) = entry.observers.remove(id) else {
        return;
    };
    if remaining > 0 {
        return;
    }

    let previous = match entry.state.lock() {
        Ok(mut state) => {
            let previous = *state;
            match previous {
                HandleState::Connecting | HandleState::Open => {
                    *state = HandleState::Closing;
                }
                HandleState::Closing | HandleState::Closed => {}
            }
            previous
        }
        Err(_) => {
            log::warn!("handle state lock poisoned during release");
            return;
        }
    };

    match previous {
        // Already torn down, e.g. by an out-of-band transport close.
        HandleState::Closing | HandleState::Closed => {}
        // The opener observes the Closing state and closes the connection
        // itself once the transport settles.
        HandleState::Connecting => {
            inner.remove_entry(entry);
        }
        HandleState::Open => {
            inner.remove_entry(entry);
            let _ = entry.shutdown.send(true);
            inner.enqueue_close(entry);
        }
    }
}

/// Per-handle pump: translates raw notices into typed events and fans them
/// out until shutdown or remote close.
fn spawn_pump(
    inner: Weak<RegistryInner>,
    entry: Arc<HandleEntry>,
    mut notices: mpsc::Receiver<RawNotice>,
) {
    let mut shutdown = entry.shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                notice = notices.recv() => {
                    match notice {
                        Some(notice) => entry.observers.dispatch(notice, &entry.filters),
                        None => {
                            handle_remote_close(&inner, &entry);
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });
}

/// The transport dropped the stream without an unsubscribe. Mark the handle
/// closed, clear the bookkeeping, and tell observers once. No automatic
/// reconnection: that is a policy for a layer above the registry.
fn handle_remote_close(inner: &Weak<RegistryInner>, entry: &Arc<HandleEntry>) {
    let was_open = match entry.state.lock() {
        Ok(mut state) => {
            if *state == HandleState::Open {
                *state = HandleState::Closed;
                true
            } else {
                false
            }
        }
        Err(_) => false,
    };
    if !was_open {
        return;
    }

    log::debug!("channel {} closed by remote", entry.key);
    if let Some(inner) = inner.upgrade() {
        inner.remove_entry(entry);
    }
    if let Ok(mut slot) = entry.closer.lock() {
        slot.take();
    }
    entry
        .observers
        .fail_all(&ChannelError::Closed("transport closed by remote".into()));
}

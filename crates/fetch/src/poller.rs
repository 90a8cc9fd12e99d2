use crate::client::decode_envelope;
use crate::duration_from_env_ms;
use crate::error::{FetchError, Result};
use crate::transport::{Request, RequestTransport};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PollConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(interval) = duration_from_env_ms("TRADESYNC_POLL_INTERVAL_MS") {
            config.interval = interval;
        }
        if let Some(timeout) = duration_from_env_ms("TRADESYNC_POLL_TIMEOUT_MS") {
            config.timeout = timeout;
        }
        config
    }
}

/// Latest known state of a polled resource.
///
/// `is_connected` reflects whether the most recent attempt reached the
/// server; a failed cycle flips it off without discarding `data`.
#[derive(Debug, Clone)]
pub struct PollState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub is_connected: bool,
    pub last_updated: Option<SystemTime>,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
            is_connected: false,
            last_updated: None,
        }
    }
}

/// Periodic fallback refresh for data that also arrives over push channels.
///
/// The first cycle runs immediately on start; later cycles fire on the
/// configured interval. Stopping is idempotent and dropping the handle stops
/// the worker.
pub struct Poller<T> {
    state_rx: watch::Receiver<PollState<T>>,
    shutdown: watch::Sender<bool>,
}

impl<T> Poller<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn start(
        transport: Arc<dyn RequestTransport>,
        request: Request,
        config: PollConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(PollState::default());
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(poll_loop(transport, request, config, state_tx, shutdown_rx));
        Self { state_rx, shutdown }
    }

    #[must_use]
    pub fn state(&self) -> PollState<T> {
        self.state_rx.borrow().clone()
    }

    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<PollState<T>> {
        self.state_rx.clone()
    }

    /// Stops the worker. Safe to call more than once.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn poll_loop<T>(
    transport: Arc<dyn RequestTransport>,
    request: Request,
    config: PollConfig,
    state_tx: watch::Sender<PollState<T>>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                poll_once(&*transport, &request, config.timeout, &state_tx).await;
            }
        }
    }
}

async fn poll_once<T>(
    transport: &dyn RequestTransport,
    request: &Request,
    timeout: Duration,
    state_tx: &watch::Sender<PollState<T>>,
) where
    T: DeserializeOwned + Clone,
{
    let outcome = match tokio::time::timeout(timeout, transport.request(request.clone())).await {
        Ok(settled) => settled,
        Err(_) => Err(FetchError::Timeout(timeout)),
    };
    let result: Result<T> = outcome.and_then(decode_envelope);

    match result {
        Ok(data) => {
            state_tx.send_modify(|state| {
                state.data = Some(data);
                state.loading = false;
                state.error = None;
                state.is_connected = true;
                state.last_updated = Some(SystemTime::now());
            });
        }
        Err(err) => {
            log::warn!("poll {} failed: {err}", request.endpoint);
            state_tx.send_modify(|state| {
                state.loading = false;
                state.error = Some(err);
                state.is_connected = false;
            });
        }
    }
}

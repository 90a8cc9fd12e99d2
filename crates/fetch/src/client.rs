use crate::cancel::CancelToken;
use crate::duration_from_env_ms;
use crate::error::{FetchError, Result};
use crate::transport::{Request, RequestTransport, Response};
use lru::LruCache;
use serde::de::DeserializeOwned;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::watch;
use tradesync_protocol::ApiEnvelope;

#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    /// Hard deadline for one attempt. A timeout is reported distinctly from
    /// transport and application errors.
    pub timeout: Duration,
    /// How long a cached response stays fresh. Zero disables caching.
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 32,
        }
    }
}

impl FetchConfig {
    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(timeout) = duration_from_env_ms("TRADESYNC_FETCH_TIMEOUT_MS") {
            config.timeout = timeout;
        }
        config
    }
}

/// Observable state of one logical resource slot.
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub last_fetched: Option<SystemTime>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            last_fetched: None,
        }
    }
}

struct CacheSlot<T> {
    value: T,
    stored_at: Instant,
}

/// Pull path for one logical resource.
///
/// Every `fetch` supersedes the previous in-flight request: the prior
/// cancellation token is triggered before the new request starts, and a
/// generation counter guarantees a superseded request can never write the
/// result slot of the request that replaced it.
///
/// Failures leave the previous `data` in place (stale-while-error); only a
/// successful fetch replaces it.
pub struct ResourceFetcher<T> {
    transport: Arc<dyn RequestTransport>,
    request: Mutex<Request>,
    config: FetchConfig,
    state_tx: watch::Sender<FetchState<T>>,
    generation: AtomicU64,
    inflight: Mutex<Option<CancelToken>>,
    cache: Mutex<LruCache<String, CacheSlot<T>>>,
}

impl<T> ResourceFetcher<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(transport: Arc<dyn RequestTransport>, request: Request, config: FetchConfig) -> Self {
        let (state_tx, _) = watch::channel(FetchState::default());
        let capacity =
            NonZeroUsize::new(config.cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            transport,
            request: Mutex::new(request),
            config,
            state_tx,
            generation: AtomicU64::new(0),
            inflight: Mutex::new(None),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> FetchState<T> {
        self.state_tx.subscribe().borrow().clone()
    }

    /// Stream of state snapshots, for callers that render reactively.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<FetchState<T>> {
        self.state_tx.subscribe()
    }

    /// Point the fetcher at a different endpoint. The next fetch supersedes
    /// anything in flight for the old one.
    pub fn set_endpoint(&self, endpoint: impl Into<String>) {
        if let Ok(mut request) = self.request.lock() {
            request.endpoint = endpoint.into();
        }
    }

    /// Fetch, serving from the response cache when fresh.
    pub async fn fetch(&self) -> Result<T> {
        self.run(false, None).await
    }

    /// Fetch with a one-off deadline instead of the configured one.
    pub async fn fetch_with_timeout(&self, timeout: Duration) -> Result<T> {
        self.run(false, Some(timeout)).await
    }

    /// Re-run the request, bypassing the cache.
    pub async fn refetch(&self) -> Result<T> {
        self.run(true, None).await
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    async fn run(&self, bypass_cache: bool, timeout: Option<Duration>) -> Result<T> {
        let timeout = timeout.unwrap_or(self.config.timeout);
        let request = match self.request.lock() {
            Ok(request) => request.clone(),
            Err(_) => return Err(FetchError::Cancelled),
        };
        let endpoint = request.endpoint.clone();

        // Supersede: trigger the previous token before this request starts.
        // The generation bump happens under the same lock that `publish`
        // takes, so a superseded request can never write after its successor
        // has claimed the slot.
        let token = CancelToken::new();
        let generation = {
            let Ok(mut inflight) = self.inflight.lock() else {
                return Err(FetchError::Cancelled);
            };
            if let Some(previous) = inflight.replace(token.clone()) {
                previous.cancel();
            }
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        if !bypass_cache {
            if let Some(hit) = self.cache_lookup(&endpoint) {
                if !self.publish(generation, |state| {
                    state.data = Some(hit.clone());
                    state.loading = false;
                    state.error = None;
                }) {
                    return Err(FetchError::Cancelled);
                }
                return Ok(hit);
            }
        }

        self.publish(generation, |state| {
            state.loading = true;
            state.error = None;
        });

        let outcome = tokio::select! {
            settled = tokio::time::timeout(timeout, self.transport.request(request)) => {
                match settled {
                    Ok(inner) => inner,
                    Err(_) => {
                        token.cancel();
                        Err(FetchError::Timeout(timeout))
                    }
                }
            }
            () = token.cancelled() => Err(FetchError::Cancelled),
        };

        let result = outcome.and_then(decode_envelope::<T>);

        match result {
            Ok(data) => {
                // Superseded requests never touch the slot, or the cache, of
                // their successor.
                if !self.publish(generation, |state| {
                    state.data = Some(data.clone());
                    state.loading = false;
                    state.error = None;
                    state.last_fetched = Some(SystemTime::now());
                }) {
                    return Err(FetchError::Cancelled);
                }
                self.cache_store(&endpoint, &data);
                Ok(data)
            }
            Err(err) => {
                if !self.publish(generation, |state| {
                    state.loading = false;
                    state.error = Some(err.clone());
                }) {
                    return Err(FetchError::Cancelled);
                }
                log::warn!("fetch {endpoint} failed: {err}");
                Err(err)
            }
        }
    }

    /// Write to the state slot iff this request is still the current
    /// generation. The comparison and the write happen under the inflight
    /// lock, the lock a successor must take to bump the generation, so the
    /// check cannot go stale between the compare and the write.
    fn publish(&self, generation: u64, apply: impl FnOnce(&mut FetchState<T>)) -> bool {
        let Ok(_inflight) = self.inflight.lock() else {
            return false;
        };
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        self.state_tx.send_modify(apply);
        true
    }

    fn cache_lookup(&self, endpoint: &str) -> Option<T> {
        if self.config.cache_ttl.is_zero() {
            return None;
        }
        let Ok(mut cache) = self.cache.lock() else {
            return None;
        };
        match cache.get(endpoint) {
            Some(slot) if slot.stored_at.elapsed() < self.config.cache_ttl => {
                Some(slot.value.clone())
            }
            Some(_) => {
                cache.pop(endpoint);
                None
            }
            None => None,
        }
    }

    fn cache_store(&self, endpoint: &str, value: &T) {
        if self.config.cache_ttl.is_zero() {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                endpoint.to_string(),
                CacheSlot {
                    value: value.clone(),
                    stored_at: Instant::now(),
                },
            );
        }
    }
}

/// Decode a transport response into envelope data, distinguishing HTTP-level
/// failures from application-level ones.
pub(crate) fn decode_envelope<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.is_success() {
        let message = response
            .body
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("request failed")
            .to_string();
        return Err(FetchError::Http {
            status: response.status,
            message,
        });
    }

    let envelope: ApiEnvelope<T> =
        ApiEnvelope::from_value(response.body).map_err(|e| FetchError::Decode(e.to_string()))?;
    if !envelope.success {
        return Err(FetchError::Application(
            envelope.message.unwrap_or_else(|| "request failed".to_string()),
        ));
    }
    Ok(envelope.data)
}

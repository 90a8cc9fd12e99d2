use crate::client::decode_envelope;
use crate::error::{FetchError, Result};
use crate::transport::{Request, RequestTransport};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Outcome of the most recent write.
#[derive(Debug, Clone)]
pub struct MutationState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl<T> Default for MutationState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

/// Write path for a logical endpoint.
///
/// Unlike reads, mutations carry no deadline unless one is set explicitly: a
/// slow write must not be abandoned halfway by a client-side timer.
///
/// A failed mutation is reported twice on purpose: recorded in the observable
/// state for rendering, and returned to the caller so the call site can react
/// inline.
pub struct Mutation<T> {
    transport: Arc<dyn RequestTransport>,
    timeout: Option<Duration>,
    state_tx: watch::Sender<MutationState<T>>,
}

impl<T> Mutation<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(transport: Arc<dyn RequestTransport>) -> Self {
        let (state_tx, _) = watch::channel(MutationState::default());
        Self {
            transport,
            timeout: None,
            state_tx,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn state(&self) -> MutationState<T> {
        self.state_tx.subscribe().borrow().clone()
    }

    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<MutationState<T>> {
        self.state_tx.subscribe()
    }

    /// Clears any recorded result or error.
    pub fn reset(&self) {
        let _ = self.state_tx.send(MutationState::default());
    }

    pub async fn mutate(&self, request: Request) -> Result<T> {
        let endpoint = request.endpoint.clone();
        self.state_tx.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let outcome = match self.timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.transport.request(request)).await {
                    Ok(settled) => settled,
                    Err(_) => Err(FetchError::Timeout(timeout)),
                }
            }
            None => self.transport.request(request).await,
        };
        let result = outcome.and_then(decode_envelope::<T>);

        match result {
            Ok(data) => {
                self.state_tx.send_modify(|state| {
                    state.data = Some(data.clone());
                    state.loading = false;
                    state.error = None;
                });
                Ok(data)
            }
            Err(err) => {
                log::warn!("mutation {endpoint} failed: {err}");
                self.state_tx.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(err.clone());
                });
                Err(err)
            }
        }
    }
}

//! Pull-side data access: one-shot fetches, periodic polling, and writes.
//!
//! The pieces layer cleanly:
//!
//! ```text
//!   ResourceFetcher ──┐
//!   Poller ───────────┼──> RequestTransport ──> remote store
//!   Mutation ─────────┘
//! ```
//!
//! [`ResourceFetcher`] owns the read path for one logical resource: a
//! response cache, a hard timeout, and supersede-on-refetch cancellation so
//! a stale response can never overwrite a newer one. [`Poller`] is the
//! fallback refresh loop for data that normally arrives over push channels,
//! and [`Mutation`] is the write path.
//!
//! All three publish their state through `tokio::sync::watch`, so callers
//! can either await a call's result directly or observe snapshots as they
//! change.

mod cancel;
mod client;
mod error;
mod http;
mod mutation;
mod poller;
mod transport;

pub use cancel::CancelToken;
pub use client::{FetchConfig, FetchState, ResourceFetcher};
pub use error::{FetchError, Result};
pub use http::HttpTransport;
pub use mutation::{Mutation, MutationState};
pub use poller::{PollConfig, PollState, Poller};
pub use transport::{Method, Request, RequestTransport, Response};

use std::time::Duration;

pub(crate) fn duration_from_env_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

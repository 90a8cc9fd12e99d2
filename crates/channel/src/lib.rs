//! # Tradesync Channel
//!
//! Push side of the data-access core: a registry that multiplexes filtered
//! change streams so equivalent subscriptions share one transport channel,
//! and a dispatcher that fans typed events out to observers.
//!
//! ## Flow
//!
//! ```text
//! subscribe(collection, filters, observer)
//!     │
//!     ├──> SubscriptionKey (canonical)
//!     │      └─> existing handle?  ──> fan-out, no new channel
//!     │
//!     └──> ChannelTransport::open
//!            └─> pump task: RawNotice ─> ChangeEvent ─> observers
//! ```
//!
//! Teardown is the hard part: the `unsubscribe` guard is idempotent, safe
//! under races with remote disconnects, and never surfaces teardown noise to
//! the caller. Close outcomes are typed (`CloseOutcome`), so the registry
//! never inspects error strings to tell an expected race from a real failure.

mod dispatch;
mod error;
mod registry;
mod transport;

pub use dispatch::{ChannelObserver, FnObserver};
pub use error::{ChannelError, Result};
pub use registry::{ChannelRegistry, HandleState, Subscription};
pub use transport::{ChannelCloser, ChannelConn, ChannelTransport, CloseOutcome};

use once_cell::sync::OnceCell;

static GLOBAL_REGISTRY: OnceCell<ChannelRegistry> = OnceCell::new();

/// Install a process-wide registry. Returns `false` if one was already
/// installed. Tests should construct their own [`ChannelRegistry`] instead.
pub fn install_global(registry: ChannelRegistry) -> bool {
    GLOBAL_REGISTRY.set(registry).is_ok()
}

/// The process-wide registry, if one was installed.
pub fn global() -> Option<&'static ChannelRegistry> {
    GLOBAL_REGISTRY.get()
}

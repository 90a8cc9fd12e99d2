//! Debounced search over the trade catalog, with persisted recent queries.
//!
//! [`SearchEngine`] turns a rapidly-changing query string into at most one
//! evaluation per idle window. [`evaluate`] is the pure search pass (match,
//! filter, sort, paginate) and can be called directly; the engine wraps it
//! in a worker task so callers only ever send commands and read snapshots.
//! [`RecentSearches`] keeps the bounded on-disk history and
//! [`suggestions`] derives completions without touching the engine.

mod engine;
mod error;
mod evaluate;
mod history;
mod suggest;
mod types;

pub use engine::{SearchConfig, SearchEngine, SearchSnapshot};
pub use error::{Result, SearchError};
pub use evaluate::{evaluate, Evaluation};
pub use history::{RecentSearches, DEFAULT_HISTORY_CAP};
pub use suggest::suggestions;
pub use types::{
    DateRange, FilterPatch, OptionsPatch, ResultKind, SearchFilters, SearchHit, SearchOptions,
    SortBy, SortOrder, DEFAULT_LIMIT,
};

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

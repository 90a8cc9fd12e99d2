use crate::error::{Result, SearchError};
use crate::evaluate::evaluate;
use crate::history::{RecentSearches, DEFAULT_HISTORY_CAP};
use crate::types::{FilterPatch, OptionsPatch, SearchFilters, SearchHit, SearchOptions};
use crate::{duration_from_env_ms, suggest};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Idle window a query must survive before it is evaluated.
    pub debounce: Duration,
    pub history_cap: usize,
    /// Overrides the per-user default history location.
    pub history_path: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            history_cap: DEFAULT_HISTORY_CAP,
            history_path: None,
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(debounce) = duration_from_env_ms("TRADESYNC_SEARCH_DEBOUNCE_MS") {
            config.debounce = debounce;
        }
        config
    }
}

/// Observable state of the engine after the most recent evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSnapshot {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub total_results: usize,
    pub loading: bool,
    pub error: Option<SearchError>,
    /// Number of evaluation passes run so far.
    pub evaluations: u64,
}

impl SearchSnapshot {
    fn initial() -> Self {
        Self {
            query: String::new(),
            results: Vec::new(),
            total_results: 0,
            loading: false,
            error: None,
            evaluations: 0,
        }
    }
}

enum Command {
    UpdateQuery(String),
    UpdateFilters(FilterPatch),
    UpdateOptions(OptionsPatch),
    LoadMore,
    Reset,
    Shutdown,
}

/// Debounced search over an in-memory catalog.
///
/// A worker task owns all query/filter/pagination state; handles send it
/// commands and read snapshots through a `watch` channel. Query updates are
/// debounced so a burst of keystrokes costs one evaluation, run against the
/// last value observed in the idle window. Filter, option, and pagination
/// changes evaluate immediately with the settled query.
#[derive(Clone)]
pub struct SearchEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    command_tx: mpsc::Sender<Command>,
    snapshot_tx: watch::Sender<SearchSnapshot>,
    history: RecentSearches,
}

impl SearchEngine {
    #[must_use]
    pub fn start(catalog: Vec<SearchHit>, config: SearchConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (snapshot_tx, _) = watch::channel(SearchSnapshot::initial());

        let history_path = config
            .history_path
            .clone()
            .unwrap_or_else(RecentSearches::default_path);
        let history = RecentSearches::new(history_path, config.history_cap);

        spawn_search_loop(catalog, config.debounce, command_rx, snapshot_tx.clone());

        Self {
            inner: Arc::new(EngineInner {
                command_tx,
                snapshot_tx,
                history,
            }),
        }
    }

    /// Records the new raw query and restarts the settle timer; pagination
    /// resets to the first page.
    pub async fn update_query(&self, query: impl Into<String>) -> Result<()> {
        self.send(Command::UpdateQuery(query.into())).await
    }

    /// [`update_query`](Self::update_query) plus a history entry.
    pub async fn search(&self, query: impl Into<String>) -> Result<()> {
        let query = query.into();
        self.inner.history.record(&query);
        self.send(Command::UpdateQuery(query)).await
    }

    pub async fn update_filters(&self, patch: FilterPatch) -> Result<()> {
        self.send(Command::UpdateFilters(patch)).await
    }

    pub async fn update_options(&self, patch: OptionsPatch) -> Result<()> {
        self.send(Command::UpdateOptions(patch)).await
    }

    /// Advances to the next page of the current query.
    pub async fn load_more(&self) -> Result<()> {
        self.send(Command::LoadMore).await
    }

    /// Clears query, filters, options, and results. History is untouched.
    pub async fn reset(&self) -> Result<()> {
        self.send(Command::Reset).await
    }

    #[must_use]
    pub fn snapshot(&self) -> SearchSnapshot {
        self.inner.snapshot_tx.subscribe().borrow().clone()
    }

    #[must_use]
    pub fn snapshot_stream(&self) -> watch::Receiver<SearchSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    #[must_use]
    pub fn recent_searches(&self) -> Vec<String> {
        self.inner.history.load()
    }

    pub fn clear_recent_searches(&self) {
        self.inner.history.clear();
    }

    /// Synchronous completions; see [`suggest::suggestions`].
    #[must_use]
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        suggest::suggestions(query)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.inner
            .command_tx
            .send(command)
            .await
            .map_err(|_| SearchError::Stopped)
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(Command::Shutdown);
        }
    }
}

fn spawn_search_loop(
    catalog: Vec<SearchHit>,
    debounce: Duration,
    mut command_rx: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<SearchSnapshot>,
) {
    tokio::spawn(async move {
        // `query` holds the settled text; a keystroke burst lives in
        // `pending_query` until its idle window elapses, so filter and
        // pagination changes never flush it early.
        let mut query = String::new();
        let mut pending_query: Option<String> = None;
        let mut filters = SearchFilters::default();
        let mut options = SearchOptions::default();
        let mut evaluations: u64 = 0;
        let mut deadline: Option<time::Instant> = None;

        loop {
            tokio::select! {
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(Command::UpdateQuery(next)) => {
                            options.offset = 0;
                            deadline = Some(time::Instant::now() + debounce);
                            snapshot_tx.send_modify(|snap| {
                                snap.query = next.clone();
                                snap.loading = true;
                            });
                            pending_query = Some(next);
                        }
                        Some(Command::UpdateFilters(patch)) => {
                            patch.apply(&mut filters);
                            options.offset = 0;
                            run_evaluation(
                                &catalog, &query, &filters, &options,
                                &mut evaluations, deadline.is_some(), &snapshot_tx,
                            );
                        }
                        Some(Command::UpdateOptions(patch)) => {
                            patch.apply(&mut options);
                            options.offset = 0;
                            run_evaluation(
                                &catalog, &query, &filters, &options,
                                &mut evaluations, deadline.is_some(), &snapshot_tx,
                            );
                        }
                        Some(Command::LoadMore) => {
                            options.offset = options.offset.saturating_add(options.limit);
                            run_evaluation(
                                &catalog, &query, &filters, &options,
                                &mut evaluations, deadline.is_some(), &snapshot_tx,
                            );
                        }
                        Some(Command::Reset) => {
                            query.clear();
                            pending_query = None;
                            filters = SearchFilters::default();
                            options = SearchOptions::default();
                            deadline = None;
                            snapshot_tx.send_modify(|snap| {
                                snap.query.clear();
                                snap.results.clear();
                                snap.total_results = 0;
                                snap.loading = false;
                                snap.error = None;
                            });
                        }
                        Some(Command::Shutdown) | None => break,
                    }
                }
                () = async {
                    if let Some(at) = deadline {
                        time::sleep_until(at).await;
                    }
                }, if deadline.is_some() => {
                    deadline = None;
                    if let Some(settled) = pending_query.take() {
                        query = settled;
                    }
                    run_evaluation(
                        &catalog, &query, &filters, &options,
                        &mut evaluations, false, &snapshot_tx,
                    );
                }
            }
        }
    });
}

fn run_evaluation(
    catalog: &[SearchHit],
    query: &str,
    filters: &SearchFilters,
    options: &SearchOptions,
    evaluations: &mut u64,
    still_pending: bool,
    snapshot_tx: &watch::Sender<SearchSnapshot>,
) {
    *evaluations += 1;
    let count = *evaluations;
    match evaluate(catalog, query, filters, options) {
        Ok(eval) => {
            snapshot_tx.send_modify(|snap| {
                snap.results = eval.hits;
                snap.total_results = eval.total;
                snap.loading = still_pending;
                snap.error = None;
                snap.evaluations = count;
            });
        }
        Err(err) => {
            log::warn!("search evaluation failed: {err}");
            snapshot_tx.send_modify(|snap| {
                snap.results.clear();
                snap.total_results = 0;
                snap.loading = still_pending;
                snap.error = Some(err);
                snap.evaluations = count;
            });
        }
    }
}

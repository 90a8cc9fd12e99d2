use std::path::{Path, PathBuf};

pub const DEFAULT_HISTORY_CAP: usize = 10;

/// Bounded, persisted list of recent search strings, most recent first.
///
/// Storage is best-effort: a missing or malformed file reads as an empty
/// list and write failures are logged, never surfaced.
pub struct RecentSearches {
    path: PathBuf,
    cap: usize,
}

impl RecentSearches {
    pub fn new(path: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            path: path.into(),
            cap: cap.max(1),
        }
    }

    /// `<user data dir>/tradesync/recent_searches.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tradesync")
            .join("recent_searches.json")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn load(&self) -> Vec<String> {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                log::debug!(
                    "ignoring malformed search history at {}: {err}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    /// Front-inserts `query`, dropping any earlier occurrence and anything
    /// past the cap. Blank queries are ignored.
    pub fn record(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }

        let mut entries = self.load();
        entries.retain(|entry| entry != query);
        entries.insert(0, query.to_string());
        entries.truncate(self.cap);

        self.store(&entries);
    }

    pub fn clear(&self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "failed to clear search history at {}: {err}",
                    self.path.display()
                );
            }
        }
    }

    fn store(&self, entries: &[String]) {
        if let Some(parent) = self.path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                log::warn!("failed to create {}: {err}", parent.display());
                return;
            }
        }
        let json = match serde_json::to_string(entries) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("failed to encode search history: {err}");
                return;
            }
        };
        if let Err(err) = std::fs::write(&self.path, json) {
            log::warn!(
                "failed to persist search history to {}: {err}",
                self.path.display()
            );
        }
    }
}

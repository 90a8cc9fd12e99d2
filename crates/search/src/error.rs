use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// A date range whose bounds are empty or inverted. Evaluation clears
    /// the result set and reports this; the engine stays usable.
    #[error("invalid date range: {start}..{end}")]
    InvalidDateRange { start: String, end: String },

    /// The engine worker is gone; commands can no longer be delivered.
    #[error("search engine stopped")]
    Stopped,
}

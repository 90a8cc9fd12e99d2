use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The configured deadline elapsed before the remote call settled.
    /// Distinct from a transport failure so callers can render it as such.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The request was superseded or its owner went away.
    #[error("request cancelled")]
    Cancelled,

    /// The remote call never completed (connection refused, reset, DNS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport worked but the server answered with a failure status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 2xx at the HTTP level, but the response envelope flagged a failure.
    #[error("application error: {0}")]
    Application(String),

    /// The response body did not match the expected envelope shape.
    #[error("invalid response body: {0}")]
    Decode(String),
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChannelError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("failed to open channel: {0}")]
    OpenFailed(String),

    #[error("channel closed: {0}")]
    Closed(String),

    #[error("{0}")]
    Other(String),
}

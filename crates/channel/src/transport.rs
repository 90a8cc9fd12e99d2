use crate::error::ChannelError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tradesync_protocol::{Collection, FilterSet, RawNotice};

/// Result of closing a transport channel.
///
/// Teardown races (the remote end or the socket layer closed first) are a
/// normal part of channel life, so they get their own variant instead of an
/// error string the registry would have to pattern-match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The channel was open and is now closed.
    Closed,
    /// The channel was already closing, closed, or gone when asked.
    AlreadyClosed,
    /// The close failed for a reason other than a teardown race.
    Failed(String),
}

/// Owned closer for one open channel. Consumed on close.
#[async_trait]
pub trait ChannelCloser: Send {
    async fn close(self: Box<Self>) -> CloseOutcome;
}

/// An open push channel: a stream of raw notices plus its closer.
///
/// The sender side lives in the transport; dropping it (remote disconnect)
/// ends the stream.
pub struct ChannelConn {
    pub notices: mpsc::Receiver<RawNotice>,
    pub closer: Box<dyn ChannelCloser>,
}

/// Outbound seam to the remote store's push side.
///
/// The registry is the only caller; nothing else may hold a transport channel
/// that outlives its handle.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Open a filtered change stream for a collection.
    async fn open(
        &self,
        collection: &Collection,
        filters: &FilterSet,
    ) -> std::result::Result<ChannelConn, ChannelError>;
}

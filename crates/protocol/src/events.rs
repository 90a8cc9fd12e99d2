use serde::{Deserialize, Serialize};

/// Operation kind carried by a transport-level change notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Raw change notice as delivered by the push transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNotice {
    pub kind: ChangeKind,
    pub payload: serde_json::Value,
}

impl RawNotice {
    pub fn new(kind: ChangeKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }

    /// Translate into a typed domain event.
    ///
    /// Deletes return `None`: data callbacks never see removals, consumers
    /// reconcile deletions through the pull path.
    #[must_use]
    pub fn into_event(self) -> Option<ChangeEvent> {
        match self.kind {
            ChangeKind::Insert => Some(ChangeEvent::Inserted(self.payload)),
            ChangeKind::Update => Some(ChangeEvent::Updated(self.payload)),
            ChangeKind::Delete => None,
        }
    }
}

/// Typed domain event fanned out to channel observers.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Inserted(serde_json::Value),
    Updated(serde_json::Value),
}

impl ChangeEvent {
    #[must_use]
    pub fn payload(&self) -> &serde_json::Value {
        match self {
            Self::Inserted(payload) | Self::Updated(payload) => payload,
        }
    }
}

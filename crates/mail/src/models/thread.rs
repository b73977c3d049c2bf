//! Thread model representing a Gmail thread (conversation)

use serde::{Deserialize, Serialize};

use super::MessageId;

/// Unique identifier for a thread (Gmail thread ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A thread as returned by a list operation: the thread ID plus the IDs of
/// the messages it contains, in conversation order.
///
/// The messages themselves travel separately (see
/// [`Action::AddMessages`](crate::dispatch::Action)), so list consumers can
/// render incrementally without holding full bodies per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    /// Gmail thread ID
    pub id: ThreadId,
    /// IDs of the messages in this thread, oldest first
    pub message_ids: Vec<MessageId>,
}

impl ThreadSummary {
    pub fn new(id: ThreadId, message_ids: Vec<MessageId>) -> Self {
        Self { id, message_ids }
    }
}

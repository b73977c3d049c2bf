//! Label model representing a Gmail label/folder

use serde::{Deserialize, Serialize};

/// Unique identifier for a label (Gmail label ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelId(pub String);

impl LabelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Well-known Gmail system labels
    pub const INBOX: &'static str = "INBOX";
    pub const SENT: &'static str = "SENT";
    pub const DRAFTS: &'static str = "DRAFT";
    pub const TRASH: &'static str = "TRASH";
    pub const SPAM: &'static str = "SPAM";
    pub const STARRED: &'static str = "STARRED";
    pub const IMPORTANT: &'static str = "IMPORTANT";
    pub const UNREAD: &'static str = "UNREAD";
}

impl From<String> for LabelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LabelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for LabelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A label delta applied by a modify call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelChange {
    /// Labels to add
    pub add_label_ids: Vec<LabelId>,
    /// Labels to remove
    pub remove_label_ids: Vec<LabelId>,
}

impl LabelChange {
    pub fn new(add_label_ids: Vec<LabelId>, remove_label_ids: Vec<LabelId>) -> Self {
        Self {
            add_label_ids,
            remove_label_ids,
        }
    }

    /// A delta that adds a single label
    pub fn add(label: impl Into<LabelId>) -> Self {
        Self {
            add_label_ids: vec![label.into()],
            remove_label_ids: Vec::new(),
        }
    }

    /// A delta that removes a single label
    pub fn remove(label: impl Into<LabelId>) -> Self {
        Self {
            add_label_ids: Vec::new(),
            remove_label_ids: vec![label.into()],
        }
    }
}

/// A mail label (folder)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    /// Label ID (e.g., "INBOX", "SENT", "Label_123")
    pub id: LabelId,
    /// Display name
    pub name: String,
    /// Whether this is a system label
    pub is_system: bool,
    /// Number of messages with this label
    pub message_count: u32,
    /// Number of unread messages
    pub unread_count: u32,
}

impl Label {
    /// Create a new label
    pub fn new(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_system: false,
            message_count: 0,
            unread_count: 0,
        }
    }

    /// Create a system label
    pub fn system(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_system: true,
            message_count: 0,
            unread_count: 0,
        }
    }

    /// Builder method to set message count
    pub fn with_message_count(mut self, count: u32) -> Self {
        self.message_count = count;
        self
    }

    /// Builder method to set unread count
    pub fn with_unread_count(mut self, count: u32) -> Self {
        self.unread_count = count;
        self
    }
}

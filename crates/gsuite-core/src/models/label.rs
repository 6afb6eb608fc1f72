//! Label data structures

use serde::{Deserialize, Serialize};

/// Label as returned by `users.labels.list` / `users.labels.create`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,

    /// "system" or "user"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_list_visibility: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_list_visibility: Option<String>,
}

/// Compact label listing returned to tool callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub label_type: String,
}

impl From<Label> for LabelSummary {
    fn from(label: Label) -> Self {
        Self {
            id: label.id,
            name: label.name,
            label_type: label.label_type.unwrap_or_else(|| "user".to_string()),
        }
    }
}

/// Well-known system label identifiers
pub mod system {
    pub const INBOX: &str = "INBOX";
    pub const UNREAD: &str = "UNREAD";
}

//! Result records for mutating operations

use serde::{Deserialize, Serialize};

/// Outcome of `send_email`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    Success {
        message_id: String,
        to: String,
        subject: String,
    },
    Error {
        error_message: String,
    },
}

/// Outcome of `create_label` / `delete_label`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LabelOutcome {
    Success {
        label_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
    Error {
        error_message: String,
    },
}

/// Summary of a batch operation over independent message ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub status: String,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub failed_ids: Vec<String>,
}

impl BatchSummary {
    /// Build a completed summary from the ids that failed
    pub fn completed(total: usize, failed_ids: Vec<String>) -> Self {
        Self {
            status: "completed".to_string(),
            total,
            success: total - failed_ids.len(),
            failed: failed_ids.len(),
            failed_ids,
        }
    }
}

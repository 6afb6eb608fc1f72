//! Attachment data structures

use serde::{Deserialize, Serialize};

/// An attachment found on a message, fetched later by `attachment_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    #[serde(rename = "partId")]
    pub part_id: String,

    pub filename: String,

    #[serde(rename = "mimeType")]
    pub mime_type: String,

    #[serde(rename = "attachmentId")]
    pub attachment_id: String,
}

/// Attachment content from `users.messages.attachments.get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Base64url-encoded content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// One entry of a bulk attachment save request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSaveRequest {
    pub message_id: String,
    pub attachment_id: String,
    pub filename: String,
}

/// Per-item result of a bulk attachment save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSaveResult {
    pub message_id: String,
    pub attachment_id: String,
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

//! Gmail message data structures

use serde::{Deserialize, Serialize};

/// A single message header as returned by the Gmail API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Body of a MIME part: either inline data or a reference to an attachment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    /// Base64url-encoded inline content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Attachment identifier, fetched separately
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A node in the MIME tree of a message payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default)]
    pub headers: Vec<Header>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<PartBody>,

    /// Child parts. `None` and an empty list are distinct: only multipart
    /// payloads carry the field at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<MessagePart>>,
}

impl MessagePart {
    /// MIME type, or "" when absent
    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or("")
    }

    /// True for any `multipart/*` container, ignoring case
    pub fn is_multipart(&self) -> bool {
        self.mime_type()
            .get(..10)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("multipart/"))
    }

    /// Inline base64url data, if the body carries any
    pub fn inline_data(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.data.as_deref())
    }

    /// Attachment identifier, if the body references one
    pub fn attachment_id(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.attachment_id.as_deref())
    }

    /// Child parts, empty for leaf parts
    pub fn children(&self) -> &[MessagePart] {
        self.parts.as_deref().unwrap_or(&[])
    }
}

/// A message exactly as returned by `users.messages.get` (format=full)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: Option<String>,
    pub thread_id: Option<String>,
    pub history_id: Option<String>,
    pub internal_date: Option<String>,
    pub size_estimate: Option<u64>,
    pub label_ids: Option<Vec<String>>,
    pub snippet: Option<String>,
    pub payload: Option<MessagePart>,
}

/// Flat view of a Gmail message, built by [`crate::gmail::decode_message`]
///
/// Field names follow the keys tool callers see in JSON output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedMessage {
    // === Identity ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    #[serde(rename = "historyId", skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,

    #[serde(rename = "internalDate", skip_serializing_if = "Option::is_none")]
    pub internal_date: Option<String>,

    #[serde(rename = "sizeEstimate", skip_serializing_if = "Option::is_none")]
    pub size_estimate: Option<u64>,

    #[serde(rename = "labelIds", default)]
    pub label_ids: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    // === Headers ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// RFC 5322 Message-ID header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_to: Option<String>,

    // === Content ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Message reference from `users.messages.list`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Draft reference from `users.drafts.list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageRef>,
}

/// A decoded draft, tagged with the draft identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSummary {
    pub draft_id: String,

    #[serde(flatten)]
    pub message: ParsedMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_message_deserializes_gmail_shape() {
        let raw: RawMessage = serde_json::from_value(serde_json::json!({
            "id": "18c1",
            "threadId": "18c0",
            "labelIds": ["INBOX", "UNREAD"],
            "sizeEstimate": 2048,
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [{"name": "Subject", "value": "Hi"}],
                "parts": [
                    {"partId": "0", "mimeType": "text/plain", "body": {"data": "aGk", "size": 2}},
                    {"partId": "1", "mimeType": "application/pdf", "filename": "a.pdf",
                     "body": {"attachmentId": "ANGj", "size": 1000}}
                ]
            }
        }))
        .unwrap();

        let payload = raw.payload.unwrap();
        assert!(payload.is_multipart());
        assert!(!payload.children()[0].is_multipart());
        assert_eq!(payload.children().len(), 2);
        assert_eq!(payload.children()[0].inline_data(), Some("aGk"));
        assert_eq!(payload.children()[1].attachment_id(), Some("ANGj"));
        assert_eq!(raw.size_estimate, Some(2048));
    }

    #[test]
    fn test_is_multipart_ignores_case() {
        let part = |mime: &str| MessagePart {
            mime_type: Some(mime.to_string()),
            ..Default::default()
        };
        assert!(part("MULTIPART/mixed").is_multipart());
        assert!(part("multipart/related").is_multipart());
        assert!(!part("text/plain").is_multipart());
        assert!(!part("multipart").is_multipart());
        assert!(!MessagePart::default().is_multipart());
    }

    #[test]
    fn test_parsed_message_serializes_with_tool_keys() {
        let msg = ParsedMessage {
            id: Some("m1".to_string()),
            thread_id: Some("t1".to_string()),
            message_id: Some("<abc@mail>".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["threadId"], "t1");
        assert_eq!(value["message_id"], "<abc@mail>");
        assert_eq!(value["labelIds"], serde_json::json!([]));
        assert!(value.get("body").is_none());
        assert!(value.get("subject").is_none());
    }

    #[test]
    fn test_draft_summary_flattens_message() {
        let draft = DraftSummary {
            draft_id: "r-1".to_string(),
            message: ParsedMessage {
                subject: Some("Plan".to_string()),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["draft_id"], "r-1");
        assert_eq!(value["subject"], "Plan");
    }
}

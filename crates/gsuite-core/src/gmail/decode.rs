//! Decoding of Gmail API messages into flat records
//!
//! The Gmail API returns messages as a tree of MIME parts with base64url
//! bodies. This module flattens that tree into a [`ParsedMessage`], picks a
//! readable body out of it, and lists the attachments that can be fetched
//! separately.

use std::collections::BTreeMap;

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::models::{AttachmentDescriptor, Header, MessagePart, ParsedMessage, RawMessage};

/// Key used for the attachment of a single-part message
const SINGLE_PART_KEY: &str = "0";

/// Interpret a JSON message object from the Gmail API
pub fn parse_raw_message(raw: &Value) -> Result<RawMessage> {
    RawMessage::deserialize(raw).map_err(|e| Error::Decode(e.to_string()))
}

/// Decode a JSON message object, returning `None` if its shape is unusable
pub fn decode(raw: &Value, include_body: bool) -> Option<ParsedMessage> {
    match parse_raw_message(raw) {
        Ok(message) => Some(decode_message(&message, include_body)),
        Err(e) => {
            error!("Error parsing message: {}", e);
            None
        }
    }
}

/// Flatten a message into metadata, header fields and (optionally) a body
pub fn decode_message(raw: &RawMessage, include_body: bool) -> ParsedMessage {
    let mut parsed = ParsedMessage {
        id: raw.id.clone(),
        thread_id: raw.thread_id.clone(),
        history_id: raw.history_id.clone(),
        internal_date: raw.internal_date.clone(),
        size_estimate: raw.size_estimate,
        label_ids: raw.label_ids.clone().unwrap_or_default(),
        snippet: raw.snippet.clone(),
        ..Default::default()
    };

    let empty = MessagePart::default();
    let payload = raw.payload.as_ref().unwrap_or(&empty);

    // Later duplicates overwrite earlier ones
    for header in &payload.headers {
        apply_header(&mut parsed, header);
    }

    if include_body {
        parsed.body = extract_body(payload).filter(|body| !body.is_empty());
        parsed.mime_type = payload.mime_type.clone();
    }

    parsed
}

fn apply_header(parsed: &mut ParsedMessage, header: &Header) {
    let value = Some(header.value.clone());
    match header.name.to_ascii_lowercase().as_str() {
        "subject" => parsed.subject = value,
        "from" => parsed.from = value,
        "to" => parsed.to = value,
        "date" => parsed.date = value,
        "cc" => parsed.cc = value,
        "bcc" => parsed.bcc = value,
        "message-id" => parsed.message_id = value,
        "in-reply-to" => parsed.in_reply_to = value,
        "references" => parsed.references = value,
        "delivered-to" => parsed.delivered_to = value,
        _ => {}
    }
}

/// Pick a readable body out of a MIME tree.
///
/// Preference order: the part itself when it is text, a direct
/// `text/plain` child, the first non-empty nested multipart, then whatever
/// inline data the first child carries. Decode failures are logged and
/// reported as no body for the part being examined; an enclosing multipart
/// still tries its remaining steps.
pub fn extract_body(part: &MessagePart) -> Option<String> {
    let mime_type = part.mime_type();

    if is_mime(mime_type, "text/plain") || is_mime(mime_type, "text/html") {
        if let Some(data) = non_empty(part.inline_data()) {
            return decode_or_log(data);
        }
    }

    if !part.is_multipart() {
        return None;
    }

    let children = part.children();

    for child in children {
        if is_mime(child.mime_type(), "text/plain") {
            if let Some(data) = non_empty(child.inline_data()) {
                return decode_or_log(data);
            }
        }
    }

    for child in children.iter().filter(|c| c.is_multipart()) {
        if let Some(nested) = extract_body(child).filter(|body| !body.is_empty()) {
            return Some(nested);
        }
    }

    if let Some(data) = children.first().and_then(|c| c.inline_data()) {
        debug!(
            "No text part found, falling back to first child ({})",
            children[0].mime_type()
        );
        return decode_or_log(data);
    }

    None
}

fn decode_or_log(data: &str) -> Option<String> {
    match decode_base64url_text(data) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Error extracting body: {}", e);
            None
        }
    }
}

/// List attachments on the top level of a message, keyed by part id.
///
/// Nested multiparts are not searched. A message without any `parts` is
/// checked for an attachment on its own body instead.
pub fn collect_attachments(raw: &RawMessage) -> Result<BTreeMap<String, AttachmentDescriptor>> {
    let mut attachments = BTreeMap::new();

    let Some(payload) = raw.payload.as_ref() else {
        return Ok(attachments);
    };

    match payload.parts.as_deref() {
        Some(parts) => {
            for part in parts {
                let Some(attachment_id) = part.attachment_id() else {
                    continue;
                };
                let part_id = part.part_id.clone().ok_or_else(|| {
                    Error::Decode(format!("attachment {} has no partId", attachment_id))
                })?;
                attachments.insert(
                    part_id.clone(),
                    AttachmentDescriptor {
                        part_id,
                        filename: part.filename.clone().unwrap_or_default(),
                        mime_type: part.mime_type().to_string(),
                        attachment_id: attachment_id.to_string(),
                    },
                );
            }
        }
        None => {
            debug!(
                "Email {} has no parts in payload (single part message)",
                raw.id.as_deref().unwrap_or("?")
            );
            if let Some(attachment_id) = payload.attachment_id() {
                attachments.insert(
                    SINGLE_PART_KEY.to_string(),
                    AttachmentDescriptor {
                        part_id: SINGLE_PART_KEY.to_string(),
                        filename: payload
                            .filename
                            .clone()
                            .unwrap_or_else(|| "attachment".to_string()),
                        mime_type: payload
                            .mime_type
                            .clone()
                            .unwrap_or_else(|| "application/octet-stream".to_string()),
                        attachment_id: attachment_id.to_string(),
                    },
                );
            }
        }
    }

    Ok(attachments)
}

/// Decode Gmail's URL-safe base64, with or without padding
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .map_err(Error::from)
}

fn decode_base64url_text(data: &str) -> Result<String> {
    let bytes = decode_base64url(data)?;
    String::from_utf8(bytes).map_err(|e| Error::Decode(format!("body is not UTF-8: {}", e)))
}

fn is_mime(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected)
}

fn non_empty(data: Option<&str>) -> Option<&str> {
    data.filter(|d| !d.is_empty())
}

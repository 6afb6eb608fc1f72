//! Per-user mailbox operations
//!
//! Remote failures are logged and degrade to `None`, empty collections,
//! `false` or an error-tagged outcome. Only validation errors propagate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::decode::{
    collect_attachments, decode, decode_base64url, decode_message, parse_raw_message,
};
use super::encode::OutboundMessage;
use super::transport::MailTransport;
use crate::error::Result;
use crate::models::{
    system, AttachmentData, AttachmentDescriptor, AttachmentSaveRequest, AttachmentSaveResult,
    BatchSummary, DraftSummary, LabelOutcome, LabelSummary, ParsedMessage, SendOutcome,
};

/// Upper bound on `maxResults` accepted by `users.messages.list`
pub const MAX_RESULTS_LIMIT: u32 = 500;

/// Default visibility for new labels in the label list
pub const DEFAULT_LABEL_VISIBILITY: &str = "labelShow";

const UNREAD_QUERY: &str = "is:unread";
const ARCHIVED_QUERY: &str = "-in:inbox -in:trash";

/// One entry of a `bulk_get_emails` response
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BulkEmail {
    Found {
        id: String,
        email: ParsedMessage,
        attachments: BTreeMap<String, AttachmentDescriptor>,
    },
    Failed {
        id: String,
        error: String,
    },
}

/// Mailbox operations for one user
pub struct GmailService {
    transport: Arc<dyn MailTransport>,
    attachments_dir: PathBuf,
}

impl GmailService {
    /// Create a service over `transport`; relative attachment paths resolve under `attachments_dir`
    pub fn new(transport: Arc<dyn MailTransport>, attachments_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            attachments_dir: attachments_dir.into(),
        }
    }

    /// Search messages and decode their headers (no bodies)
    pub async fn query_emails(&self, query: Option<&str>, max_results: u32) -> Vec<ParsedMessage> {
        let max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        let query = query.unwrap_or("");
        debug!("Querying messages: {:?} (max {})", query, max_results);

        let refs = match self.transport.list_messages(query, max_results).await {
            Ok(refs) => refs,
            Err(e) => {
                error!("Failed to list messages for query {:?}: {}", query, e);
                return Vec::new();
            }
        };

        let mut messages = Vec::with_capacity(refs.len());
        for r in refs {
            match self.transport.get_message(&r.id).await {
                Ok(raw) => match decode(&raw, false) {
                    Some(parsed) => messages.push(parsed),
                    None => warn!("Skipping undecodable message {}", r.id),
                },
                Err(e) => warn!("Failed to fetch message {}: {}", r.id, e),
            }
        }
        messages
    }

    /// Fetch one message with its body and top-level attachments.
    ///
    /// Any failure yields `(None, {})`.
    pub async fn get_email_with_attachments(
        &self,
        id: &str,
    ) -> (Option<ParsedMessage>, BTreeMap<String, AttachmentDescriptor>) {
        match self.fetch_with_attachments(id).await {
            Ok((parsed, attachments)) => (Some(parsed), attachments),
            Err(e) => {
                error!("Failed to get message {}: {}", id, e);
                (None, BTreeMap::new())
            }
        }
    }

    async fn fetch_with_attachments(
        &self,
        id: &str,
    ) -> Result<(ParsedMessage, BTreeMap<String, AttachmentDescriptor>)> {
        let raw = parse_raw_message(&self.transport.get_message(id).await?)?;
        let attachments = collect_attachments(&raw)?;
        Ok((decode_message(&raw, true), attachments))
    }

    /// Create a draft. Returns the created draft resource, or `None` on failure.
    pub async fn create_draft(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        cc: &[String],
    ) -> Option<Value> {
        let result = async {
            let encoded = OutboundMessage::new(to, subject, body).with_cc(cc).encode()?;
            self.transport.create_draft(&encoded).await
        }
        .await;

        match result {
            Ok(draft) => {
                info!("Created draft to {}", to);
                Some(draft)
            }
            Err(e) => {
                error!("Failed to create draft to {}: {}", to, e);
                None
            }
        }
    }

    pub async fn delete_draft(&self, id: &str) -> bool {
        self.report("delete draft", id, self.transport.delete_draft(id).await)
    }

    /// Reply to `original`, either sending immediately or saving as a draft.
    ///
    /// An original without a sender is rejected before any remote call.
    /// Transport failures yield `Ok(None)`.
    pub async fn reply(
        &self,
        original: &ParsedMessage,
        reply_body: &str,
        send: bool,
        cc: &[String],
    ) -> Result<Option<Value>> {
        let encoded = OutboundMessage::reply_to(original, reply_body, cc)?.encode()?;
        let original_id = original.id.as_deref().unwrap_or("");

        let result = if send {
            self.transport.send_message(&encoded).await
        } else {
            self.transport.create_draft(&encoded).await
        };

        match result {
            Ok(value) => {
                info!(
                    "Reply to {} {}",
                    original_id,
                    if send { "sent" } else { "saved as draft" }
                );
                Ok(Some(value))
            }
            Err(e) => {
                error!("Failed to reply to {}: {}", original_id, e);
                Ok(None)
            }
        }
    }

    pub async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Option<AttachmentData> {
        match self.transport.get_attachment(message_id, attachment_id).await {
            Ok(data) => Some(data),
            Err(e) => {
                error!(
                    "Failed to get attachment {} of message {}: {}",
                    attachment_id, message_id, e
                );
                None
            }
        }
    }

    /// Send a new message
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        cc: &[String],
        bcc: &[String],
    ) -> SendOutcome {
        let result = async {
            let encoded = OutboundMessage::new(to, subject, body)
                .with_cc(cc)
                .with_bcc(bcc)
                .encode()?;
            self.transport.send_message(&encoded).await
        }
        .await;

        match result {
            Ok(sent) => {
                let message_id = sent["id"].as_str().unwrap_or_default().to_string();
                info!("Sent message {} to {}", message_id, to);
                SendOutcome::Success {
                    message_id,
                    to: to.to_string(),
                    subject: subject.to_string(),
                }
            }
            Err(e) => {
                error!("Failed to send message to {}: {}", to, e);
                SendOutcome::Error {
                    error_message: e.to_string(),
                }
            }
        }
    }

    /// List drafts with their decoded messages
    pub async fn list_drafts(&self, max_results: u32) -> Vec<DraftSummary> {
        let refs = match self.transport.list_drafts(max_results).await {
            Ok(refs) => refs,
            Err(e) => {
                error!("Failed to list drafts: {}", e);
                return Vec::new();
            }
        };

        let mut drafts = Vec::with_capacity(refs.len());
        for r in refs {
            let message = match self.transport.get_draft(&r.id).await {
                Ok(draft) => decode(&draft["message"], true),
                Err(e) => {
                    warn!("Failed to fetch draft {}: {}", r.id, e);
                    continue;
                }
            };
            match message {
                Some(message) => drafts.push(DraftSummary {
                    draft_id: r.id,
                    message,
                }),
                None => warn!("Skipping undecodable draft {}", r.id),
            }
        }
        drafts
    }

    pub async fn get_unread_emails(&self, max_results: u32) -> Vec<ParsedMessage> {
        self.query_with_bodies(UNREAD_QUERY, max_results).await
    }

    pub async fn list_archived_emails(&self, max_results: u32) -> Vec<ParsedMessage> {
        self.query_with_bodies(ARCHIVED_QUERY, max_results).await
    }

    async fn query_with_bodies(&self, query: &str, max_results: u32) -> Vec<ParsedMessage> {
        let max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        let refs = match self.transport.list_messages(query, max_results).await {
            Ok(refs) => refs,
            Err(e) => {
                error!("Failed to list messages for query {:?}: {}", query, e);
                return Vec::new();
            }
        };

        let mut messages = Vec::with_capacity(refs.len());
        for r in refs {
            match self.transport.get_message(&r.id).await {
                Ok(raw) => messages.extend(decode(&raw, true)),
                Err(e) => warn!("Failed to fetch message {}: {}", r.id, e),
            }
        }
        messages
    }

    pub async fn mark_email_read(&self, id: &str) -> bool {
        let result = self
            .transport
            .modify_labels(id, &[], &[system::UNREAD.to_string()])
            .await;
        self.report("mark read", id, result)
    }

    pub async fn trash_email(&self, id: &str) -> bool {
        self.report("trash", id, self.transport.trash_message(id).await)
    }

    pub async fn list_labels(&self) -> Vec<LabelSummary> {
        match self.transport.list_labels().await {
            Ok(labels) => labels.into_iter().map(LabelSummary::from).collect(),
            Err(e) => {
                error!("Failed to list labels: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn create_label(&self, name: &str, visibility: Option<&str>) -> LabelOutcome {
        let visibility = visibility.unwrap_or(DEFAULT_LABEL_VISIBILITY);
        match self.transport.create_label(name, visibility).await {
            Ok(label) => {
                info!("Created label {} ({})", label.name, label.id);
                LabelOutcome::Success {
                    label_id: label.id,
                    name: Some(label.name),
                    action: None,
                }
            }
            Err(e) => {
                error!("Failed to create label {}: {}", name, e);
                LabelOutcome::Error {
                    error_message: e.to_string(),
                }
            }
        }
    }

    pub async fn delete_label(&self, id: &str) -> LabelOutcome {
        match self.transport.delete_label(id).await {
            Ok(()) => {
                info!("Deleted label {}", id);
                LabelOutcome::Success {
                    label_id: id.to_string(),
                    name: None,
                    action: Some("deleted".to_string()),
                }
            }
            Err(e) => {
                error!("Failed to delete label {}: {}", id, e);
                LabelOutcome::Error {
                    error_message: e.to_string(),
                }
            }
        }
    }

    pub async fn apply_label(&self, id: &str, label_id: &str) -> bool {
        let result = self
            .transport
            .modify_labels(id, &[label_id.to_string()], &[])
            .await;
        self.report("apply label to", id, result)
    }

    pub async fn remove_label(&self, id: &str, label_id: &str) -> bool {
        let result = self
            .transport
            .modify_labels(id, &[], &[label_id.to_string()])
            .await;
        self.report("remove label from", id, result)
    }

    /// Archive by removing the INBOX label
    pub async fn archive_email(&self, id: &str) -> bool {
        let result = self
            .transport
            .modify_labels(id, &[], &[system::INBOX.to_string()])
            .await;
        self.report("archive", id, result)
    }

    pub async fn restore_email_to_inbox(&self, id: &str) -> bool {
        let result = self
            .transport
            .modify_labels(id, &[system::INBOX.to_string()], &[])
            .await;
        self.report("restore", id, result)
    }

    /// Archive each id independently, collecting the failures
    pub async fn batch_archive_emails(&self, ids: &[String]) -> BatchSummary {
        let mut failed_ids = Vec::new();
        for id in ids {
            if !self.archive_email(id).await {
                failed_ids.push(id.clone());
            }
        }
        let summary = BatchSummary::completed(ids.len(), failed_ids);
        info!(
            "Batch archive: {}/{} succeeded",
            summary.success, summary.total
        );
        summary
    }

    pub async fn bulk_get_emails(&self, ids: &[String]) -> Vec<BulkEmail> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            match self.fetch_with_attachments(id).await {
                Ok((email, attachments)) => results.push(BulkEmail::Found {
                    id: id.clone(),
                    email,
                    attachments,
                }),
                Err(e) => {
                    warn!("Failed to get message {}: {}", id, e);
                    results.push(BulkEmail::Failed {
                        id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        results
    }

    /// Download attachments and write them to disk
    pub async fn bulk_save_attachments(
        &self,
        requests: &[AttachmentSaveRequest],
    ) -> Vec<AttachmentSaveResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = match self.save_attachment(request).await {
                Ok((path, size)) => AttachmentSaveResult {
                    message_id: request.message_id.clone(),
                    attachment_id: request.attachment_id.clone(),
                    status: "success".to_string(),
                    path: Some(path.display().to_string()),
                    size: Some(size),
                    error_message: None,
                },
                Err(e) => {
                    warn!(
                        "Failed to save attachment {} of {}: {}",
                        request.attachment_id, request.message_id, e
                    );
                    AttachmentSaveResult {
                        message_id: request.message_id.clone(),
                        attachment_id: request.attachment_id.clone(),
                        status: "error".to_string(),
                        path: None,
                        size: None,
                        error_message: Some(e.to_string()),
                    }
                }
            };
            results.push(result);
        }
        results
    }

    async fn save_attachment(&self, request: &AttachmentSaveRequest) -> Result<(PathBuf, u64)> {
        let attachment = self
            .transport
            .get_attachment(&request.message_id, &request.attachment_id)
            .await?;
        let bytes = decode_base64url(attachment.data.as_deref().unwrap_or(""))?;

        let path = self.resolve_path(&request.filename);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!("Saved {} bytes to {:?}", bytes.len(), path);
        Ok((path, bytes.len() as u64))
    }

    fn resolve_path(&self, filename: &str) -> PathBuf {
        let path = Path::new(filename);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.attachments_dir.join(path)
        }
    }

    fn report(&self, action: &str, id: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => {
                info!("Succeeded to {} message {}", action, id);
                true
            }
            Err(e) => {
                error!("Failed to {} message {}: {}", action, id, e);
                false
            }
        }
    }
}

//! Remote mail transport abstraction

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::encode::EncodedMessage;
use crate::error::Result;
use crate::models::{AttachmentData, DraftRef, Label, MessageRef};

/// Request/response calls against a user's mailbox.
///
/// Messages and drafts come back as raw JSON so that decoding stays in
/// one place ([`super::decode`]).
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// List message references matching a Gmail search query
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>>;

    /// Fetch a full message
    async fn get_message(&self, id: &str) -> Result<Value>;

    /// Send a message immediately
    async fn send_message(&self, message: &EncodedMessage) -> Result<Value>;

    /// Persist a message as a draft
    async fn create_draft(&self, message: &EncodedMessage) -> Result<Value>;

    async fn list_drafts(&self, max_results: u32) -> Result<Vec<DraftRef>>;

    /// Fetch a draft, including its full message
    async fn get_draft(&self, id: &str) -> Result<Value>;

    async fn delete_draft(&self, id: &str) -> Result<()>;

    /// Add and remove labels on a message
    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()>;

    /// Move a message to the trash
    async fn trash_message(&self, id: &str) -> Result<()>;

    async fn list_labels(&self) -> Result<Vec<Label>>;

    async fn create_label(&self, name: &str, visibility: &str) -> Result<Label>;

    async fn delete_label(&self, id: &str) -> Result<()>;

    async fn get_attachment(&self, message_id: &str, attachment_id: &str)
        -> Result<AttachmentData>;
}

/// Hands out a transport bound to one account
pub trait TransportFactory: Send + Sync {
    fn for_account(&self, account: &str) -> Arc<dyn MailTransport>;
}

//! In-memory mail transport for tests

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::encode::EncodedMessage;
use super::transport::{MailTransport, TransportFactory};
use crate::error::{Error, Result};
use crate::models::{AttachmentData, DraftRef, Label, MessageRef};

#[derive(Default)]
struct State {
    messages: Vec<(String, Value)>,
    drafts: Vec<(String, Value)>,
    labels: Vec<Label>,
    attachments: HashMap<(String, String), AttachmentData>,
    failing: HashSet<String>,
    calls: Vec<String>,
    sent: Vec<EncodedMessage>,
    next_id: u32,
}

/// Records every call and fails any call whose id was marked with [`FakeTransport::fail_on`]
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<State>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_message(&self, raw: Value) {
        let id = raw["id"].as_str().unwrap_or_default().to_string();
        self.state.lock().messages.push((id, raw));
    }

    pub fn add_draft(&self, draft_id: &str, message: Value) {
        self.state
            .lock()
            .drafts
            .push((draft_id.to_string(), message));
    }

    pub fn add_label(&self, id: &str, name: &str, label_type: &str) {
        self.state.lock().labels.push(Label {
            id: id.to_string(),
            name: name.to_string(),
            label_type: Some(label_type.to_string()),
            label_list_visibility: None,
            message_list_visibility: None,
        });
    }

    pub fn add_attachment(&self, message_id: &str, attachment_id: &str, data: &str) {
        self.state.lock().attachments.insert(
            (message_id.to_string(), attachment_id.to_string()),
            AttachmentData {
                size: Some(data.len() as u64),
                data: Some(data.to_string()),
            },
        );
    }

    /// Make every call naming `key` fail. Use `"*"` to fail all calls.
    pub fn fail_on(&self, key: &str) {
        self.state.lock().failing.insert(key.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn sent(&self) -> Vec<EncodedMessage> {
        self.state.lock().sent.clone()
    }

    fn record(&self, call: String, key: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.failing.contains(key) || state.failing.contains("*") {
            return Err(Error::GmailApi {
                status: 500,
                body: format!("injected failure for {}", key),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MailTransport for FakeTransport {
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>> {
        self.record(format!("list_messages {} {}", query, max_results), "list")?;
        let state = self.state.lock();
        Ok(state
            .messages
            .iter()
            .take(max_results as usize)
            .map(|(id, raw)| MessageRef {
                id: id.clone(),
                thread_id: raw["threadId"].as_str().map(String::from),
            })
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<Value> {
        self.record(format!("get_message {}", id), id)?;
        let state = self.state.lock();
        state
            .messages
            .iter()
            .find(|(message_id, _)| message_id == id)
            .map(|(_, raw)| raw.clone())
            .ok_or_else(|| Error::GmailApi {
                status: 404,
                body: "Not Found".to_string(),
            })
    }

    async fn send_message(&self, message: &EncodedMessage) -> Result<Value> {
        self.record("send_message".to_string(), "send")?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("sent-{}", state.next_id);
        state.sent.push(message.clone());
        Ok(json!({ "id": id, "threadId": message.thread_id }))
    }

    async fn create_draft(&self, message: &EncodedMessage) -> Result<Value> {
        self.record("create_draft".to_string(), "draft")?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("draft-{}", state.next_id);
        state.sent.push(message.clone());
        Ok(json!({ "id": id, "message": { "id": format!("m-{}", id) } }))
    }

    async fn list_drafts(&self, max_results: u32) -> Result<Vec<DraftRef>> {
        self.record(format!("list_drafts {}", max_results), "list_drafts")?;
        let state = self.state.lock();
        Ok(state
            .drafts
            .iter()
            .take(max_results as usize)
            .map(|(id, _)| DraftRef {
                id: id.clone(),
                message: None,
            })
            .collect())
    }

    async fn get_draft(&self, id: &str) -> Result<Value> {
        self.record(format!("get_draft {}", id), id)?;
        let state = self.state.lock();
        state
            .drafts
            .iter()
            .find(|(draft_id, _)| draft_id == id)
            .map(|(draft_id, message)| json!({ "id": draft_id, "message": message }))
            .ok_or_else(|| Error::GmailApi {
                status: 404,
                body: "Not Found".to_string(),
            })
    }

    async fn delete_draft(&self, id: &str) -> Result<()> {
        self.record(format!("delete_draft {}", id), id)
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        self.record(
            format!("modify_labels {} +{:?} -{:?}", id, add, remove),
            id,
        )
    }

    async fn trash_message(&self, id: &str) -> Result<()> {
        self.record(format!("trash_message {}", id), id)
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        self.record("list_labels".to_string(), "labels")?;
        Ok(self.state.lock().labels.clone())
    }

    async fn create_label(&self, name: &str, visibility: &str) -> Result<Label> {
        self.record(format!("create_label {} {}", name, visibility), name)?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let label = Label {
            id: format!("Label_{}", state.next_id),
            name: name.to_string(),
            label_type: Some("user".to_string()),
            label_list_visibility: Some(visibility.to_string()),
            message_list_visibility: Some("show".to_string()),
        };
        state.labels.push(label.clone());
        Ok(label)
    }

    async fn delete_label(&self, id: &str) -> Result<()> {
        self.record(format!("delete_label {}", id), id)
    }

    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentData> {
        self.record(
            format!("get_attachment {} {}", message_id, attachment_id),
            attachment_id,
        )?;
        let state = self.state.lock();
        state
            .attachments
            .get(&(message_id.to_string(), attachment_id.to_string()))
            .cloned()
            .ok_or_else(|| Error::GmailApi {
                status: 404,
                body: "Not Found".to_string(),
            })
    }
}

/// Serves the same fake to every account
pub struct FakeFactory(pub Arc<FakeTransport>);

impl TransportFactory for FakeFactory {
    fn for_account(&self, _account: &str) -> Arc<dyn MailTransport> {
        self.0.clone()
    }
}

/// A minimal full-format message with a plain-text body
pub fn text_message(id: &str, subject: &str, body: &str) -> Value {
    use base64::{engine::general_purpose::URL_SAFE, Engine};

    json!({
        "id": id,
        "threadId": format!("t-{}", id),
        "labelIds": ["INBOX", "UNREAD"],
        "snippet": body,
        "payload": {
            "mimeType": "text/plain",
            "headers": [
                {"name": "From", "value": "Ann <ann@example.com>"},
                {"name": "To", "value": "me@example.com"},
                {"name": "Subject", "value": subject},
                {"name": "Date", "value": "Mon, 1 Jan 2024 10:00:00 +0000"}
            ],
            "body": {"data": URL_SAFE.encode(body), "size": body.len()}
        }
    })
}

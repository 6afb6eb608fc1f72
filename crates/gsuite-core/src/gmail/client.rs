//! Gmail REST API client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::encode::EncodedMessage;
use super::transport::{MailTransport, TransportFactory};
use crate::config::GmailConfig;
use crate::error::{Error, Result};
use crate::models::{AttachmentData, DraftRef, Label, MessageRef};
use crate::oauth::OAuthManager;

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct ListDraftsResponse {
    #[serde(default)]
    drafts: Vec<DraftRef>,
}

#[derive(Debug, Deserialize)]
struct ListLabelsResponse {
    #[serde(default)]
    labels: Vec<Label>,
}

/// Gmail API client for a single account.
///
/// A valid access token is requested from the [`OAuthManager`] before each
/// call, so expired tokens are refreshed transparently.
pub struct GmailClient {
    client: Client,
    base_url: String,
    account: String,
    oauth: Arc<OAuthManager>,
}

impl GmailClient {
    /// Create a client for `account` against `base_url`
    pub fn new(
        client: Client,
        base_url: &str,
        account: impl Into<String>,
        oauth: Arc<OAuthManager>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account: account.into(),
            oauth,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn token(&self) -> Result<String> {
        self.oauth.get_valid_token(&self.account).await
    }

    /// Map non-2xx responses to `Error::GmailApi`
    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::GmailApi { status, body })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        debug!("GET {} {:?}", path, query);
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(self.token().await?)
            .query(query)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        debug!("POST {}", path);
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(self.token().await?)
            .json(body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        debug!("DELETE {}", path);
        let response = self
            .client
            .delete(self.url(path))
            .bearer_auth(self.token().await?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl MailTransport for GmailClient {
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>> {
        let value = self
            .get_json(
                "messages",
                &[("q", query.to_string()), ("maxResults", max_results.to_string())],
            )
            .await?;
        let list: ListMessagesResponse = serde_json::from_value(value)?;
        Ok(list.messages)
    }

    async fn get_message(&self, id: &str) -> Result<Value> {
        self.get_json(
            &format!("messages/{}", urlencoding::encode(id)),
            &[("format", "full".to_string())],
        )
        .await
    }

    async fn send_message(&self, message: &EncodedMessage) -> Result<Value> {
        self.post_json("messages/send", &serde_json::to_value(message)?)
            .await
    }

    async fn create_draft(&self, message: &EncodedMessage) -> Result<Value> {
        self.post_json("drafts", &serde_json::json!({ "message": message }))
            .await
    }

    async fn list_drafts(&self, max_results: u32) -> Result<Vec<DraftRef>> {
        let value = self
            .get_json("drafts", &[("maxResults", max_results.to_string())])
            .await?;
        let list: ListDraftsResponse = serde_json::from_value(value)?;
        Ok(list.drafts)
    }

    async fn get_draft(&self, id: &str) -> Result<Value> {
        self.get_json(
            &format!("drafts/{}", urlencoding::encode(id)),
            &[("format", "full".to_string())],
        )
        .await
    }

    async fn delete_draft(&self, id: &str) -> Result<()> {
        self.delete(&format!("drafts/{}", urlencoding::encode(id)))
            .await
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        let mut body = serde_json::Map::new();
        if !add.is_empty() {
            body.insert("addLabelIds".to_string(), serde_json::json!(add));
        }
        if !remove.is_empty() {
            body.insert("removeLabelIds".to_string(), serde_json::json!(remove));
        }
        self.post_json(
            &format!("messages/{}/modify", urlencoding::encode(id)),
            &Value::Object(body),
        )
        .await?;
        Ok(())
    }

    async fn trash_message(&self, id: &str) -> Result<()> {
        self.post_json(
            &format!("messages/{}/trash", urlencoding::encode(id)),
            &serde_json::json!({}),
        )
        .await?;
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        let value = self.get_json("labels", &[]).await?;
        let list: ListLabelsResponse = serde_json::from_value(value)?;
        Ok(list.labels)
    }

    async fn create_label(&self, name: &str, visibility: &str) -> Result<Label> {
        let value = self
            .post_json(
                "labels",
                &serde_json::json!({
                    "name": name,
                    "labelListVisibility": visibility,
                    "messageListVisibility": "show"
                }),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn delete_label(&self, id: &str) -> Result<()> {
        self.delete(&format!("labels/{}", urlencoding::encode(id)))
            .await
    }

    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentData> {
        let value = self
            .get_json(
                &format!(
                    "messages/{}/attachments/{}",
                    urlencoding::encode(message_id),
                    urlencoding::encode(attachment_id)
                ),
                &[],
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Builds [`GmailClient`]s that share one HTTP connection pool
pub struct GmailClientFactory {
    client: Client,
    base_url: String,
    oauth: Arc<OAuthManager>,
}

impl GmailClientFactory {
    /// Create a factory from the `[gmail]` config section
    pub fn new(config: &GmailConfig, oauth: Arc<OAuthManager>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            oauth,
        })
    }
}

impl TransportFactory for GmailClientFactory {
    fn for_account(&self, account: &str) -> Arc<dyn MailTransport> {
        Arc::new(GmailClient::new(
            self.client.clone(),
            &self.base_url,
            account,
            self.oauth.clone(),
        ))
    }
}

//! MCP tool implementations

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::protocol::{ToolDefinition, ToolResult};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gmail::{GmailService, TransportFactory};
use crate::models::AttachmentSaveRequest;
use crate::oauth::OAuthManager;

/// Argument naming the account a tool call acts for
pub const USER_ID_ARG: &str = "__user_id__";

const DEFAULT_DRAFT_LIMIT: u32 = 50;

/// Build a tool definition whose schema requires `__user_id__`
fn tool(
    name: &str,
    description: &str,
    accounts: &str,
    mut properties: Value,
    required: &[&str],
) -> ToolDefinition {
    if let Some(props) = properties.as_object_mut() {
        props.insert(
            USER_ID_ARG.to_string(),
            json!({
                "type": "string",
                "description": format!("The EMAIL of the Google account. Available accounts: {}", accounts)
            }),
        );
    }
    let mut required_args = vec![USER_ID_ARG];
    required_args.extend_from_slice(required);

    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required_args
        }),
    }
}

/// Get all tool definitions
pub fn get_tool_definitions(config: &Config) -> Vec<ToolDefinition> {
    let accounts = config.account_list();
    let accounts = accounts.as_str();
    let email_id = json!({"email_id": {"type": "string", "description": "Email ID"}});

    vec![
        // Reading
        tool(
            "query_emails",
            "Search emails with a Gmail search query. Returns headers and snippets without bodies.",
            accounts,
            json!({
                "query": {
                    "type": "string",
                    "description": "Gmail search query (e.g. 'from:alice is:unread newer_than:7d')"
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 500,
                    "description": "Maximum number of emails to return"
                }
            }),
            &[],
        ),
        tool(
            "get_email_by_id",
            "Get the full content of an email by ID, including body and attachment list",
            accounts,
            email_id.clone(),
            &["email_id"],
        ),
        tool(
            "bulk_get_emails",
            "Get multiple emails by their IDs",
            accounts,
            json!({
                "message_ids": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "List of message IDs to retrieve"
                }
            }),
            &["message_ids"],
        ),
        tool(
            "get_unread_emails",
            "List unread emails with their bodies",
            accounts,
            json!({"max_results": {"type": "integer", "default": 100}}),
            &[],
        ),
        tool(
            "list_archived_emails",
            "List emails that are neither in the inbox nor in the trash",
            accounts,
            json!({"max_results": {"type": "integer", "default": 100}}),
            &[],
        ),
        // Attachments
        tool(
            "get_attachment",
            "Download an email attachment as base64url data",
            accounts,
            json!({
                "message_id": {"type": "string", "description": "Message ID containing the attachment"},
                "attachment_id": {"type": "string", "description": "Attachment ID to download"}
            }),
            &["message_id", "attachment_id"],
        ),
        tool(
            "bulk_save_attachments",
            "Save multiple attachments to disk. Relative filenames are resolved under the attachments directory.",
            accounts,
            json!({
                "attachments": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "message_id": {"type": "string"},
                            "attachment_id": {"type": "string"},
                            "filename": {"type": "string"}
                        },
                        "required": ["message_id", "attachment_id", "filename"]
                    },
                    "description": "List of attachments to save"
                }
            }),
            &["attachments"],
        ),
        // Composing
        tool(
            "send_email",
            "Send a plain-text email",
            accounts,
            json!({
                "to": {"type": "string", "description": "Recipient email address"},
                "subject": {"type": "string", "description": "Email subject"},
                "body": {"type": "string", "description": "Email body content"},
                "cc": {"type": "array", "items": {"type": "string"}, "description": "CC recipients"},
                "bcc": {"type": "array", "items": {"type": "string"}, "description": "BCC recipients"}
            }),
            &["to", "subject", "body"],
        ),
        tool(
            "create_draft",
            "Create a draft email",
            accounts,
            json!({
                "to": {"type": "string", "description": "Recipient email address"},
                "subject": {"type": "string", "description": "Email subject"},
                "body": {"type": "string", "description": "Email body content"},
                "cc": {"type": "array", "items": {"type": "string"}, "description": "CC recipients"}
            }),
            &["to", "subject", "body"],
        ),
        tool(
            "list_drafts",
            "List draft emails",
            accounts,
            json!({"max_results": {"type": "integer", "default": 50}}),
            &[],
        ),
        tool(
            "delete_draft",
            "Delete a draft email",
            accounts,
            json!({"draft_id": {"type": "string", "description": "Draft ID to delete"}}),
            &["draft_id"],
        ),
        tool(
            "reply_email",
            "Reply to an email, quoting the original. Sends directly or saves as a draft.",
            accounts,
            json!({
                "original_message_id": {"type": "string", "description": "ID of the email being replied to"},
                "body": {"type": "string", "description": "Reply body content"},
                "send_directly": {
                    "type": "boolean",
                    "default": false,
                    "description": "Send immediately instead of saving as a draft"
                },
                "cc": {"type": "array", "items": {"type": "string"}, "description": "CC recipients"}
            }),
            &["original_message_id", "body"],
        ),
        // Organizing
        tool(
            "mark_email_read",
            "Mark an email as read",
            accounts,
            email_id.clone(),
            &["email_id"],
        ),
        tool(
            "trash_email",
            "Move an email to the trash",
            accounts,
            email_id.clone(),
            &["email_id"],
        ),
        tool(
            "archive_email",
            "Archive an email (remove it from the inbox)",
            accounts,
            email_id.clone(),
            &["email_id"],
        ),
        tool(
            "batch_archive_emails",
            "Archive several emails, reporting the ones that failed",
            accounts,
            json!({
                "email_ids": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Email IDs to archive"
                }
            }),
            &["email_ids"],
        ),
        tool(
            "restore_email_to_inbox",
            "Move an archived email back to the inbox",
            accounts,
            email_id.clone(),
            &["email_id"],
        ),
        // Labels
        tool("list_labels", "List all labels", accounts, json!({}), &[]),
        tool(
            "create_label",
            "Create a new label",
            accounts,
            json!({
                "name": {"type": "string", "description": "Label name"},
                "visibility": {
                    "type": "string",
                    "enum": ["labelShow", "labelShowIfUnread", "labelHide"],
                    "default": "labelShow"
                }
            }),
            &["name"],
        ),
        tool(
            "delete_label",
            "Delete a label",
            accounts,
            json!({"label_id": {"type": "string", "description": "Label ID to delete"}}),
            &["label_id"],
        ),
        tool(
            "apply_label",
            "Apply a label to an email",
            accounts,
            json!({
                "email_id": {"type": "string", "description": "Email ID"},
                "label_id": {"type": "string", "description": "Label ID to apply"}
            }),
            &["email_id", "label_id"],
        ),
        tool(
            "remove_label",
            "Remove a label from an email",
            accounts,
            json!({
                "email_id": {"type": "string", "description": "Email ID"},
                "label_id": {"type": "string", "description": "Label ID to remove"}
            }),
            &["email_id", "label_id"],
        ),
    ]
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args[key]
        .as_str()
        .ok_or_else(|| Error::InvalidRequest(format!("Missing {}", key)))
}

fn string_list(args: &Value, key: &str) -> Result<Vec<String>> {
    match &args[key] {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(String::from)
                    .ok_or_else(|| Error::InvalidRequest(format!("{} must contain strings", key)))
            })
            .collect(),
        // A single address is accepted in place of a list
        Value::String(s) => Ok(vec![s.clone()]),
        _ => Err(Error::InvalidRequest(format!("{} must be an array", key))),
    }
}

fn max_results(args: &Value, default: u32) -> u32 {
    args["max_results"]
        .as_u64()
        .map(|n| n.min(u32::MAX as u64) as u32)
        .unwrap_or(default)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Tool execution handler
pub struct ToolHandler {
    config: Arc<Config>,
    oauth: Arc<OAuthManager>,
    transports: Arc<dyn TransportFactory>,
}

impl ToolHandler {
    /// Create a new tool handler
    pub fn new(
        config: Arc<Config>,
        oauth: Arc<OAuthManager>,
        transports: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            config,
            oauth,
            transports,
        }
    }

    /// Check the caller's account and credentials, then run the tool
    pub async fn execute(&self, name: &str, args: &Value) -> Result<Value> {
        debug!("Executing tool: {} with args: {:?}", name, args);

        if !args.is_object() {
            return Err(Error::InvalidRequest(
                "arguments must be an object".to_string(),
            ));
        }
        let user_id = args[USER_ID_ARG].as_str().ok_or_else(|| {
            Error::InvalidRequest(format!("{} argument is missing", USER_ID_ARG))
        })?;
        // Tokens and transports are keyed by the configured spelling
        let user_id = self
            .config
            .account(user_id)
            .map(|account| account.email.as_str())
            .ok_or_else(|| Error::AccountNotFound(user_id.to_string()))?;

        // Refreshes and persists the token when it is close to expiry
        self.oauth.get_valid_token(user_id).await?;

        let service = GmailService::new(
            self.transports.for_account(user_id),
            self.config.attachments_dir(),
        );

        let result = match name {
            "query_emails" => self.query_emails(&service, args).await,
            "get_email_by_id" => self.get_email_by_id(&service, args).await,
            "bulk_get_emails" => {
                let ids = string_list(args, "message_ids")?;
                to_value(&service.bulk_get_emails(&ids).await)
            }
            "get_unread_emails" => {
                let limit = max_results(args, self.config.gmail.default_max_results);
                to_value(&service.get_unread_emails(limit).await)
            }
            "list_archived_emails" => {
                let limit = max_results(args, self.config.gmail.default_max_results);
                to_value(&service.list_archived_emails(limit).await)
            }
            "get_attachment" => self.get_attachment(&service, args).await,
            "bulk_save_attachments" => self.bulk_save_attachments(&service, args).await,
            "send_email" => self.send_email(&service, args).await,
            "create_draft" => self.create_draft(&service, args).await,
            "list_drafts" => {
                let limit = max_results(args, DEFAULT_DRAFT_LIMIT);
                to_value(&service.list_drafts(limit).await)
            }
            "delete_draft" => {
                let draft_id = required_str(args, "draft_id")?;
                let success = service.delete_draft(draft_id).await;
                Ok(json!({"success": success, "draft_id": draft_id}))
            }
            "reply_email" => self.reply_email(&service, args).await,
            "mark_email_read" => {
                let id = required_str(args, "email_id")?;
                Ok(json!({"success": service.mark_email_read(id).await, "email_id": id}))
            }
            "trash_email" => {
                let id = required_str(args, "email_id")?;
                Ok(json!({"success": service.trash_email(id).await, "email_id": id}))
            }
            "archive_email" => {
                let id = required_str(args, "email_id")?;
                Ok(json!({"success": service.archive_email(id).await, "email_id": id}))
            }
            "batch_archive_emails" => {
                let ids = string_list(args, "email_ids")?;
                to_value(&service.batch_archive_emails(&ids).await)
            }
            "restore_email_to_inbox" => {
                let id = required_str(args, "email_id")?;
                Ok(json!({"success": service.restore_email_to_inbox(id).await, "email_id": id}))
            }
            "list_labels" => to_value(&service.list_labels().await),
            "create_label" => {
                let name = required_str(args, "name")?;
                to_value(&service.create_label(name, args["visibility"].as_str()).await)
            }
            "delete_label" => {
                let label_id = required_str(args, "label_id")?;
                to_value(&service.delete_label(label_id).await)
            }
            "apply_label" => {
                let id = required_str(args, "email_id")?;
                let label_id = required_str(args, "label_id")?;
                let success = service.apply_label(id, label_id).await;
                Ok(json!({"success": success, "email_id": id, "label_id": label_id}))
            }
            "remove_label" => {
                let id = required_str(args, "email_id")?;
                let label_id = required_str(args, "label_id")?;
                let success = service.remove_label(id, label_id).await;
                Ok(json!({"success": success, "email_id": id, "label_id": label_id}))
            }
            _ => Err(Error::ToolNotFound(name.to_string())),
        }?;

        Ok(serde_json::to_value(ToolResult::json(&result))?)
    }

    async fn query_emails(&self, service: &GmailService, args: &Value) -> Result<Value> {
        let limit = max_results(args, self.config.gmail.default_max_results);
        let emails = service.query_emails(args["query"].as_str(), limit).await;
        info!("query_emails returned {} emails", emails.len());
        to_value(&emails)
    }

    async fn get_email_by_id(&self, service: &GmailService, args: &Value) -> Result<Value> {
        let email_id = required_str(args, "email_id")?;
        match service.get_email_with_attachments(email_id).await {
            (Some(email), attachments) => Ok(json!({
                "email": email,
                "attachments": attachments
            })),
            (None, _) => Err(Error::Other(format!(
                "Failed to retrieve email with ID: {}",
                email_id
            ))),
        }
    }

    async fn get_attachment(&self, service: &GmailService, args: &Value) -> Result<Value> {
        let message_id = required_str(args, "message_id")?;
        let attachment_id = required_str(args, "attachment_id")?;
        let attachment = service
            .get_attachment(message_id, attachment_id)
            .await
            .ok_or_else(|| {
                Error::Other(format!(
                    "Failed to retrieve attachment {} of message {}",
                    attachment_id, message_id
                ))
            })?;
        to_value(&attachment)
    }

    async fn bulk_save_attachments(&self, service: &GmailService, args: &Value) -> Result<Value> {
        let requests: Vec<AttachmentSaveRequest> =
            serde_json::from_value(args["attachments"].clone()).map_err(|e| {
                Error::InvalidRequest(format!("Invalid attachments list: {}", e))
            })?;
        to_value(&service.bulk_save_attachments(&requests).await)
    }

    async fn send_email(&self, service: &GmailService, args: &Value) -> Result<Value> {
        let to = required_str(args, "to")?;
        let subject = required_str(args, "subject")?;
        let body = required_str(args, "body")?;
        let cc = string_list(args, "cc")?;
        let bcc = string_list(args, "bcc")?;
        to_value(&service.send_email(to, subject, body, &cc, &bcc).await)
    }

    async fn create_draft(&self, service: &GmailService, args: &Value) -> Result<Value> {
        let to = required_str(args, "to")?;
        let subject = required_str(args, "subject")?;
        let body = required_str(args, "body")?;
        let cc = string_list(args, "cc")?;
        service
            .create_draft(to, subject, body, &cc)
            .await
            .ok_or_else(|| Error::Other(format!("Failed to create draft to {}", to)))
    }

    async fn reply_email(&self, service: &GmailService, args: &Value) -> Result<Value> {
        let original_id = required_str(args, "original_message_id")?;
        let body = required_str(args, "body")?;
        let send = args["send_directly"].as_bool().unwrap_or(false);
        let cc = string_list(args, "cc")?;

        let (original, _) = service.get_email_with_attachments(original_id).await;
        let original = original.ok_or_else(|| {
            Error::Other(format!(
                "Failed to retrieve original email with ID: {}",
                original_id
            ))
        })?;

        service
            .reply(&original, body, send, &cc)
            .await?
            .ok_or_else(|| {
                Error::Other(format!(
                    "Failed to {} reply to {}",
                    if send { "send" } else { "draft" },
                    original_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use crate::gmail::testing::{text_message, FakeFactory, FakeTransport};
    use crate::oauth::GoogleOAuthConfig;
    use crate::token_provider::{FileTokenProvider, OAuthTokens, TokenProvider};
    use std::collections::HashSet;

    const USER: &str = "ann@example.com";

    struct Fixture {
        handler: ToolHandler,
        fake: Arc<FakeTransport>,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.data_dir = dir.path().to_path_buf();
        config.tokens.dir = dir.path().join("tokens");
        for email in [USER, "bob@example.com"] {
            config.accounts.push(AccountConfig {
                email: email.to_string(),
                account_type: "personal".to_string(),
                extra_info: String::new(),
            });
        }

        let provider = Arc::new(FileTokenProvider::new(config.tokens.dir.clone()));
        provider
            .store_tokens(
                USER,
                &OAuthTokens {
                    access_token: "ya29.token".to_string(),
                    refresh_token: "1//refresh".to_string(),
                    expires_at: chrono::Utc::now().timestamp() + 3600,
                    scopes: vec![],
                },
            )
            .await
            .unwrap();
        let oauth = Arc::new(OAuthManager::new(
            GoogleOAuthConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "http://localhost:4100/code".to_string(),
                redirect_port: 4100,
            },
            provider,
        ));

        let fake = FakeTransport::new();
        let handler = ToolHandler::new(
            Arc::new(config),
            oauth,
            Arc::new(FakeFactory(fake.clone())),
        );
        Fixture {
            handler,
            fake,
            _dir: dir,
        }
    }

    fn result_json(result: &Value) -> Value {
        let text = result["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_tool_definitions() {
        let mut config = Config::default();
        config.accounts.push(AccountConfig {
            email: USER.to_string(),
            account_type: "work".to_string(),
            extra_info: String::new(),
        });
        let tools = get_tool_definitions(&config);
        assert_eq!(tools.len(), 22);

        let names: HashSet<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), tools.len());
        for required in [
            "query_emails",
            "get_email_by_id",
            "create_draft",
            "delete_draft",
            "reply_email",
            "get_attachment",
            "bulk_get_emails",
            "bulk_save_attachments",
        ] {
            assert!(names.contains(required), "missing {}", required);
        }

        for t in &tools {
            assert_eq!(t.input_schema["required"][0], USER_ID_ARG);
            let description = t.input_schema["properties"][USER_ID_ARG]["description"]
                .as_str()
                .unwrap();
            assert!(description.ends_with(USER));
        }
    }

    #[tokio::test]
    async fn test_missing_user_id() {
        let f = fixture().await;
        let err = f
            .handler
            .execute("query_emails", &json!({"query": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = f.handler.execute("query_emails", &json!("x")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(f.fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_account_is_rejected() {
        let f = fixture().await;
        let err = f
            .handler
            .execute("list_labels", &json!({"__user_id__": "eve@example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
        assert_eq!(err.mcp_code(), "ACCOUNT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_account_without_credentials() {
        let f = fixture().await;
        let err = f
            .handler
            .execute("list_labels", &json!({"__user_id__": "bob@example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoCredentials { .. }));
        assert!(err.action_hint().is_some());
        assert!(f.fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_account_match_ignores_case() {
        let f = fixture().await;
        let result = f
            .handler
            .execute("list_labels", &json!({"__user_id__": "Ann@Example.COM"}))
            .await
            .unwrap();
        assert!(result_json(&result).is_array());
        assert_eq!(f.fake.calls(), vec!["list_labels".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let f = fixture().await;
        let err = f
            .handler
            .execute("list_calendars", &json!({"__user_id__": USER}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_query_emails_tool() {
        let f = fixture().await;
        f.fake.add_message(text_message("m1", "Invoice", "Please pay"));

        let result = f
            .handler
            .execute(
                "query_emails",
                &json!({"__user_id__": USER, "query": "invoice", "max_results": 5}),
            )
            .await
            .unwrap();
        let emails = result_json(&result);
        assert_eq!(emails[0]["subject"], "Invoice");
        assert_eq!(emails[0]["threadId"], "t-m1");
        assert!(emails[0].get("body").is_none());
        assert_eq!(f.fake.calls()[0], "list_messages invoice 5");
    }

    #[tokio::test]
    async fn test_get_email_by_id_tool() {
        let f = fixture().await;
        f.fake.add_message(text_message("m1", "Invoice", "Please pay"));

        let result = f
            .handler
            .execute("get_email_by_id", &json!({"__user_id__": USER, "email_id": "m1"}))
            .await
            .unwrap();
        let value = result_json(&result);
        assert_eq!(value["email"]["body"], "Please pay");
        assert_eq!(value["attachments"], json!({}));

        let err = f
            .handler
            .execute("get_email_by_id", &json!({"__user_id__": USER, "email_id": "zz"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("zz"));
    }

    #[tokio::test]
    async fn test_reply_email_tool() {
        let f = fixture().await;
        f.fake.add_message(text_message("m1", "Invoice", "Please pay"));

        let result = f
            .handler
            .execute(
                "reply_email",
                &json!({
                    "__user_id__": USER,
                    "original_message_id": "m1",
                    "body": "Paid.",
                    "send_directly": true
                }),
            )
            .await
            .unwrap();
        assert!(result_json(&result)["id"].is_string());

        let sent = f.fake.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].thread_id.as_deref(), Some("t-m1"));
        let mime = String::from_utf8(crate::gmail::decode_base64url(&sent[0].raw).unwrap()).unwrap();
        assert!(mime.contains("Subject: Re: Invoice"));
        assert!(mime.contains("In-Reply-To: m1\r\n"));
    }

    #[tokio::test]
    async fn test_reply_to_missing_original_fails() {
        let f = fixture().await;
        let err = f
            .handler
            .execute(
                "reply_email",
                &json!({"__user_id__": USER, "original_message_id": "nope", "body": "hi"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));
        assert!(f.fake.sent().is_empty());
    }

    #[tokio::test]
    async fn test_batch_archive_tool() {
        let f = fixture().await;
        f.fake.fail_on("b");

        let result = f
            .handler
            .execute(
                "batch_archive_emails",
                &json!({"__user_id__": USER, "email_ids": ["a", "b", "c"]}),
            )
            .await
            .unwrap();
        assert_eq!(
            result_json(&result),
            json!({
                "status": "completed",
                "total": 3,
                "success": 2,
                "failed": 1,
                "failed_ids": ["b"]
            })
        );
    }

    #[tokio::test]
    async fn test_send_email_tool_accepts_single_cc() {
        let f = fixture().await;
        let result = f
            .handler
            .execute(
                "send_email",
                &json!({
                    "__user_id__": USER,
                    "to": "bob@example.com",
                    "subject": "Hi",
                    "body": "Hello",
                    "cc": "carol@example.com"
                }),
            )
            .await
            .unwrap();
        let value = result_json(&result);
        assert_eq!(value["status"], "success");
        assert_eq!(value["to"], "bob@example.com");

        let err = f
            .handler
            .execute(
                "send_email",
                &json!({"__user_id__": USER, "to": "bob@example.com", "subject": "Hi"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_boolean_tools_report_success() {
        let f = fixture().await;
        f.fake.fail_on("bad");

        let ok = f
            .handler
            .execute("trash_email", &json!({"__user_id__": USER, "email_id": "m1"}))
            .await
            .unwrap();
        assert_eq!(result_json(&ok), json!({"success": true, "email_id": "m1"}));

        let failed = f
            .handler
            .execute("archive_email", &json!({"__user_id__": USER, "email_id": "bad"}))
            .await
            .unwrap();
        assert_eq!(result_json(&failed)["success"], false);
    }

    #[tokio::test]
    async fn test_bulk_save_attachments_rejects_malformed_list() {
        let f = fixture().await;
        let err = f
            .handler
            .execute(
                "bulk_save_attachments",
                &json!({"__user_id__": USER, "attachments": [{"message_id": "m1"}]}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}

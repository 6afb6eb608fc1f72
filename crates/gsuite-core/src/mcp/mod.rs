//! MCP (Model Context Protocol) server implementation
//!
//! Provides a line-delimited JSON-RPC interface over stdio.

mod protocol;
mod tools;

pub use protocol::*;
pub use tools::*;

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gmail::TransportFactory;
use crate::oauth::OAuthManager;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP Server for Gmail
pub struct McpServer {
    config: Arc<Config>,
    tools: ToolHandler,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(
        config: Arc<Config>,
        oauth: Arc<OAuthManager>,
        transports: Arc<dyn TransportFactory>,
    ) -> Self {
        let tools = ToolHandler::new(config.clone(), oauth, transports);
        Self { config, tools }
    }

    /// Run the MCP server on stdio
    pub async fn run(&self) -> Result<()> {
        info!("Starting MCP server on stdio");
        self.run_with(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve requests read line by line from `reader` until EOF
    pub async fn run_with<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;

            if n == 0 {
                debug!("Received EOF, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!("Received request: {}", trimmed);

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.handle_request(&request).await,
                Err(e) => {
                    warn!("Unparseable request: {}", e);
                    Some(JsonRpcResponse::failure(
                        None,
                        JsonRpcError {
                            code: PARSE_ERROR,
                            message: format!("Parse error: {}", e),
                            data: None,
                        },
                    ))
                }
            };

            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                debug!("Sending response: {}", response_json);
                writer.write_all(response_json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle a JSON-RPC request; notifications yield no response
    pub async fn handle_request(&self, request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        let start = std::time::Instant::now();
        let method = &request.method;

        let request_desc = if method == "tools/call" {
            let tool_name = request
                .params
                .as_ref()
                .and_then(|p| p["name"].as_str())
                .unwrap_or("unknown");
            format!("tools/call:{}", tool_name)
        } else {
            method.clone()
        };

        info!("→ {}", request_desc);

        let result = match method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "notifications/initialized" | "initialized" => Ok(Value::Null),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": get_tool_definitions(&self.config) })),
            "tools/call" => self.handle_tools_call(&request.params).await,
            _ => Err(Error::McpProtocol(format!("Unknown method: {}", method))),
        };

        let elapsed_ms = start.elapsed().as_millis();

        let response = match result {
            Ok(value) => {
                if elapsed_ms > 1000 {
                    warn!("← {} OK ({}ms) SLOW", request_desc, elapsed_ms);
                } else {
                    info!("← {} OK ({}ms)", request_desc, elapsed_ms);
                }
                JsonRpcResponse::success(request.id.clone(), value)
            }
            Err(e) => {
                error!("← {} ERROR ({}ms): {}", request_desc, elapsed_ms, e);
                JsonRpcResponse::failure(
                    request.id.clone(),
                    JsonRpcError {
                        code: SERVER_ERROR,
                        message: e.to_string(),
                        data: Some(json!({
                            "code": e.mcp_code(),
                            "action": e.action_hint()
                        })),
                    },
                )
            }
        };

        if request.is_notification() {
            None
        } else {
            Some(response)
        }
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": crate::APP_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {}
            }
        })
    }

    async fn handle_tools_call(&self, params: &Option<Value>) -> Result<Value> {
        let params = params
            .as_ref()
            .ok_or_else(|| Error::InvalidRequest("Missing params".to_string()))?;

        let name = params["name"]
            .as_str()
            .ok_or_else(|| Error::InvalidRequest("Missing tool name".to_string()))?;

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        self.tools.execute(name, &arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::testing::{FakeFactory, FakeTransport};
    use crate::oauth::GoogleOAuthConfig;
    use crate::token_provider::FileTokenProvider;

    fn server(dir: &std::path::Path) -> McpServer {
        let mut config = Config::default();
        config.tokens.dir = dir.to_path_buf();
        config.accounts.push(crate::config::AccountConfig {
            email: "ann@example.com".to_string(),
            account_type: "personal".to_string(),
            extra_info: String::new(),
        });
        let oauth = Arc::new(OAuthManager::new(
            GoogleOAuthConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "http://localhost:4100/code".to_string(),
                redirect_port: 4100,
            },
            Arc::new(FileTokenProvider::new(dir)),
        ));
        McpServer::new(
            Arc::new(config),
            oauth,
            Arc::new(FakeFactory(FakeTransport::new())),
        )
    }

    async fn exchange(input: &str) -> Vec<Value> {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());
        let mut output = Vec::new();
        server
            .run_with(input.as_bytes(), &mut output)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let responses = exchange(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n"
        ))
        .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "gsuite-mcp");
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let responses = exchange("{not json\n").await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert!(responses[0]["id"].is_null());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let responses =
            exchange("{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"method\":\"tools/list\"}\n").await;
        let tools = responses[0]["result"]["tools"].as_array().unwrap();
        assert!(tools.iter().any(|t| t["name"] == "reply_email"));
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_tool_error_carries_code_and_action() {
        let responses = exchange(concat!(
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"list_labels","arguments":{"__user_id__":"ann@example.com"}}}"#,
            "\n"
        ))
        .await;

        let error = &responses[0]["error"];
        assert_eq!(error["code"], SERVER_ERROR);
        assert_eq!(error["data"]["code"], "NO_CREDENTIALS");
        assert!(error["data"]["action"].as_str().unwrap().contains("gsuite auth"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let responses =
            exchange("{\"jsonrpc\":\"2.0\",\"id\":4,\"method\":\"resources/list\"}\n").await;
        assert_eq!(responses[0]["error"]["data"]["code"], "PROTOCOL_ERROR");
        assert!(responses[0].get("result").is_none());
    }
}

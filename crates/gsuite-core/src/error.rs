//! Error types for gsuite-mcp

use thiserror::Error;

/// Result type alias using gsuite-mcp's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gsuite-mcp
#[derive(Error, Debug)]
pub enum Error {
    // Authentication errors
    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("No OAuth2 credentials stored for {account}")]
    NoCredentials { account: String },

    #[error("Token expired for account {account}")]
    TokenExpired { account: String },

    #[error("Token refresh failed for account {account}: {reason}")]
    TokenRefreshFailed { account: String, reason: String },

    #[error("Token storage error: {0}")]
    Token(String),

    // Account errors
    #[error("Account for email {0} is not configured")]
    AccountNotFound(String),

    // Remote API errors
    #[error("Gmail API error {status}: {body}")]
    GmailApi { status: u16, body: String },

    // Message errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Message decode error: {0}")]
    Decode(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    // MCP errors
    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Returns true if this error indicates the user needs to re-authenticate
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Error::NoCredentials { .. }
                | Error::TokenExpired { .. }
                | Error::TokenRefreshFailed { .. }
        )
    }

    /// Returns an error code suitable for MCP error responses
    pub fn mcp_code(&self) -> &'static str {
        match self {
            Error::NoCredentials { .. } => "NO_CREDENTIALS",
            Error::TokenExpired { .. } | Error::TokenRefreshFailed { .. } => "AUTH_EXPIRED",
            Error::OAuth(_) | Error::Token(_) => "AUTH_ERROR",
            Error::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Error::GmailApi { .. } | Error::Http(_) => "GMAIL_API_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::InvalidRequest(_) => "INVALID_REQUEST",
            Error::ToolNotFound(_) => "TOOL_NOT_FOUND",
            Error::McpProtocol(_) => "PROTOCOL_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Returns a user-friendly action message for recoverable errors
    pub fn action_hint(&self) -> Option<&'static str> {
        match self {
            Error::NoCredentials { .. }
            | Error::TokenExpired { .. }
            | Error::TokenRefreshFailed { .. } => {
                Some("Run `gsuite auth <email>` to authorize the account")
            }
            Error::AccountNotFound(_) => Some("Add the account to [[accounts]] in config.toml"),
            _ => None,
        }
    }
}

//! gsuite-mcp core library
//!
//! Gmail access for Model Context Protocol clients: MIME decoding and
//! encoding, the Gmail REST transport, OAuth token handling and the MCP
//! tool server.

pub mod config;
pub mod error;
pub mod gmail;
pub mod mcp;
pub mod models;
pub mod oauth;
pub mod token_provider;

pub use config::Config;
pub use error::{Error, Result};
pub use models::*;

/// Application name for config paths
pub const APP_NAME: &str = "gsuite-mcp";

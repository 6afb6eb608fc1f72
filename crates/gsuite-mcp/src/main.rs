//! gsuite-mcp server
//!
//! Spawned by an MCP client; exposes Gmail tools over stdio JSON-RPC.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use gsuite_core::config::Config;
use gsuite_core::gmail::GmailClientFactory;
use gsuite_core::mcp::McpServer;
use gsuite_core::oauth::{GoogleOAuthConfig, OAuthManager};
use gsuite_core::token_provider::create_token_provider;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config first to get log path
    let config = Arc::new(Config::load()?);

    // stdout carries the protocol, so logs go to a file
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "mcp.log");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(file_layer.with_filter(filter))
        .init();

    info!("gsuite-mcp server starting");

    let token_provider = create_token_provider(&config);
    for account in &config.accounts {
        if token_provider.has_tokens(&account.email).await? {
            info!("Credentials found for {}", account.email);
        } else {
            warn!(
                "No credentials for {}; run `gsuite auth {}`",
                account.email, account.email
            );
        }
    }
    for stored in token_provider.list_accounts().await? {
        if config.account(&stored).is_none() {
            debug!("Ignoring stored tokens for unconfigured account {}", stored);
        }
    }

    let oauth_config = GoogleOAuthConfig::from_config(&config.oauth)?;
    let oauth = Arc::new(OAuthManager::new(oauth_config, token_provider));
    let transports = Arc::new(GmailClientFactory::new(&config.gmail, oauth.clone())?);

    let server = McpServer::new(config, oauth, transports);
    server.run().await?;

    info!("gsuite-mcp server stopped");
    Ok(())
}

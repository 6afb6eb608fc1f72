//! gsuite CLI
//!
//! Account authorization and offline message inspection for gsuite-mcp.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use gsuite_core::config::{AccountConfig, Config};
use gsuite_core::gmail::{collect_attachments, decode_message, parse_raw_message};
use gsuite_core::oauth::{GoogleOAuthConfig, OAuthManager};
use gsuite_core::token_provider::{create_token_provider, OAuthTokens};
use gsuite_core::{AttachmentDescriptor, ParsedMessage};

const AUTH_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "gsuite")]
#[command(about = "Manage accounts for the gsuite-mcp Gmail server")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $GSUITE_MCP_CONFIG or ~/.config/gsuite-mcp/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Human-readable output instead of JSON
    #[arg(long, global = true)]
    human: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize an account through the browser and store its tokens.
    #[command(long_about = "Authorize a Google account via OAuth.

This command will:
  1. Open your browser on Google's consent page
  2. Wait for the redirect on http://localhost:<oauth.redirect_port>/code
  3. Exchange the code and store tokens under tokens.dir

PREREQUISITES:
  Either a client secrets file at oauth.client_secrets_file, or:
    export GSUITE_CLIENT_ID=\"your-client-id\"
    export GSUITE_CLIENT_SECRET=\"your-secret\"

EXAMPLES:
  gsuite auth jane@example.com")]
    Auth {
        /// Email address of the account to authorize
        email: String,
    },
    /// List configured accounts and whether tokens are stored for them.
    /// Returns JSON array with: email, account_type, extra_info, has_tokens, expires_at, expired.
    Accounts,
    /// Decode a Gmail API message (format=full JSON) from a file.
    #[command(long_about = "Decode a Gmail API message resource saved as JSON.

Prints the flattened message and its attachment descriptors. No network
access or credentials are needed.

EXAMPLES:
  gsuite decode message.json
  gsuite decode message.json --body")]
    Decode {
        /// Path to the message JSON
        file: PathBuf,
        /// Include the decoded body
        #[arg(long)]
        body: bool,
    },
}

/// Account entry for JSON output
#[derive(Serialize)]
struct AccountStatus {
    email: String,
    account_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    extra_info: String,
    has_tokens: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
    /// Access token already past expiry; the server refreshes it on next use
    expired: bool,
}

/// Output of `decode`
#[derive(Serialize)]
struct DecodedFile {
    email: ParsedMessage,
    attachments: std::collections::BTreeMap<String, AttachmentDescriptor>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Auth { email } => {
            let config = load_config(&config_path)?;
            auth(&config, &config_path, &email, cli.human).await
        }
        Commands::Accounts => {
            let config = load_config(&config_path)?;
            accounts(&config, cli.human).await
        }
        Commands::Decode { file, body } => {
            init_logging("warn");
            decode_file(&file, body, cli.human)
        }
    }
}

/// Load the config and start logging at its level
fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_from(path)?;
    init_logging(&config.general.log_level);
    debug!("Using config {:?}", path);
    Ok(config)
}

// stdout carries command output, so logs go to stderr
fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn auth(config: &Config, config_path: &Path, email: &str, human: bool) -> Result<()> {
    if config.account(email).is_none() {
        warn!("{} is not listed in [[accounts]]; tools will reject it until added", email);
    }

    let oauth_config = GoogleOAuthConfig::from_config(&config.oauth).context(
        "OAuth client not configured (set GSUITE_CLIENT_ID/GSUITE_CLIENT_SECRET or oauth.client_secrets_file)",
    )?;
    let token_provider = create_token_provider(config);
    let oauth = OAuthManager::new(oauth_config, token_provider.clone());

    let state = uuid::Uuid::new_v4().to_string();
    let auth_url = oauth.authorization_url(&state, Some(email));

    if human {
        println!("\n🔐 Opening browser for Google authentication...\n");
        println!("If the browser doesn't open, visit this URL:\n{}\n", auth_url);
    }
    if let Err(e) = open::that(&auth_url) {
        warn!("Failed to open browser: {}", e);
        if !human {
            eprintln!("Open this URL to continue: {}", auth_url);
        }
    }

    let code = oauth.wait_for_code(&state, AUTH_TIMEOUT).await?;
    if human {
        println!("✅ Received authorization code, exchanging for tokens...\n");
    }

    let (tokens, user_info) = oauth.exchange_code(&code).await?;
    if !user_info.email.eq_ignore_ascii_case(email) {
        warn!(
            "Authorized as {} rather than {}; storing tokens for {}",
            user_info.email, email, user_info.email
        );
    }
    token_provider.store_tokens(&user_info.email, &tokens).await?;

    if human {
        println!("🎉 Authorized {}", user_info.email);
        if config.account(&user_info.email).is_none() {
            println!(
                "\nAdd it to {:?} to make it available to tools:\n\n[[accounts]]\nemail = \"{}\"",
                config_path, user_info.email
            );
        }
    } else {
        println!(
            "{}",
            serde_json::json!({
                "success": true,
                "account": user_info.email,
                "configured": config.account(&user_info.email).is_some()
            })
        );
    }
    Ok(())
}

async fn accounts(config: &Config, human: bool) -> Result<()> {
    let token_provider = create_token_provider(config);
    let mut statuses = Vec::with_capacity(config.accounts.len());
    for account in &config.accounts {
        let tokens = token_provider.get_tokens(&account.email).await?;
        statuses.push(account_status(account, tokens.as_ref()));
    }

    if human {
        if statuses.is_empty() {
            println!("No accounts configured.");
            println!("\nAdd one to config.toml:\n\n[[accounts]]\nemail = \"you@example.com\"");
            return Ok(());
        }
        println!("\n📧 Accounts:\n");
        for status in &statuses {
            let icon = if status.has_tokens { "✓" } else { "⚠" };
            println!("{} {} ({})", icon, status.email, status.account_type);
            if !status.extra_info.is_empty() {
                println!("  {}", status.extra_info);
            }
            match &status.expires_at {
                Some(expiry) if status.expired => {
                    println!("  Access token expired {} (refreshed on next use)", expiry)
                }
                Some(expiry) => println!("  Access token expires: {}", expiry),
                None => println!("  No tokens; run `gsuite auth {}`", status.email),
            }
            println!();
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    }
    Ok(())
}

fn account_status(account: &AccountConfig, tokens: Option<&OAuthTokens>) -> AccountStatus {
    AccountStatus {
        email: account.email.clone(),
        account_type: account.account_type.clone(),
        extra_info: account.extra_info.clone(),
        has_tokens: tokens.is_some(),
        expires_at: tokens.and_then(format_expiry),
        expired: tokens.map_or(false, OAuthTokens::is_definitely_expired),
    }
}

fn format_expiry(tokens: &OAuthTokens) -> Option<String> {
    Utc.timestamp_opt(tokens.expires_at, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
}

fn decode_file(path: &Path, include_body: bool, human: bool) -> Result<()> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let raw: serde_json::Value = serde_json::from_str(&contents)?;
    let decoded = decode_value(&raw, include_body)?;

    if human {
        let email = &decoded.email;
        println!("From:    {}", email.from.as_deref().unwrap_or(""));
        println!("To:      {}", email.to.as_deref().unwrap_or(""));
        println!("Subject: {}", email.subject.as_deref().unwrap_or(""));
        println!("Date:    {}", email.date.as_deref().unwrap_or(""));
        for (id, attachment) in &decoded.attachments {
            println!(
                "📎 {} ({}) [part {}, attachment {}]",
                attachment.filename, attachment.mime_type, id, attachment.attachment_id
            );
        }
        if let Some(body) = &email.body {
            println!("\n{}", body);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&decoded)?);
    }
    Ok(())
}

fn decode_value(raw: &serde_json::Value, include_body: bool) -> Result<DecodedFile> {
    let message = parse_raw_message(raw)?;
    Ok(DecodedFile {
        email: decode_message(&message, include_body),
        attachments: collect_attachments(&message)?,
    })
}

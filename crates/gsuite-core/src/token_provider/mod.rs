//! OAuth token storage
//!
//! Tokens live behind the [`TokenProvider`] trait so that the OAuth manager
//! and tool handlers can be exercised against any backing store. The
//! default store keeps one JSON file per account.
//!
//! ```toml
//! [tokens]
//! dir = "~/.config/gsuite-mcp/tokens"
//! ```

mod file;

pub use file::FileTokenProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};

/// Seconds before expiry at which a token is already treated as expired
const EXPIRY_GRACE_SECS: i64 = 300;

/// OAuth tokens for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// Access token for API calls
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    pub refresh_token: String,

    /// Token expiry timestamp (Unix seconds)
    pub expires_at: i64,

    /// Granted scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OAuthTokens {
    /// Check if the access token is expired or will expire soon
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.expires_at < now + EXPIRY_GRACE_SECS
    }

    /// Check if the access token is definitely expired (no grace period)
    pub fn is_definitely_expired(&self) -> bool {
        self.expires_at < chrono::Utc::now().timestamp()
    }
}

/// Trait for OAuth token storage backends
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// concurrent tool calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get tokens for an account
    async fn get_tokens(&self, account_id: &str) -> Result<Option<OAuthTokens>>;

    /// Store tokens for an account
    async fn store_tokens(&self, account_id: &str, tokens: &OAuthTokens) -> Result<()>;

    /// Delete tokens for an account
    async fn delete_tokens(&self, account_id: &str) -> Result<()>;

    /// Update just the access token (after refresh)
    async fn update_access_token(
        &self,
        account_id: &str,
        access_token: &str,
        expires_at: i64,
    ) -> Result<()> {
        let mut tokens = self
            .get_tokens(account_id)
            .await?
            .ok_or_else(|| Error::Token("No existing tokens to update".to_string()))?;

        tokens.access_token = access_token.to_string();
        tokens.expires_at = expires_at;

        self.store_tokens(account_id, &tokens).await
    }

    /// Check if tokens exist for an account
    async fn has_tokens(&self, account_id: &str) -> Result<bool> {
        Ok(self.get_tokens(account_id).await?.is_some())
    }

    /// List all accounts with stored tokens
    async fn list_accounts(&self) -> Result<Vec<String>>;
}

/// Create the token provider described by the `[tokens]` section
pub fn create_token_provider(config: &Config) -> Arc<dyn TokenProvider> {
    Arc::new(FileTokenProvider::new(config.tokens.dir.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(expires_in: i64) -> OAuthTokens {
        OAuthTokens {
            access_token: "test".to_string(),
            refresh_token: "test".to_string(),
            expires_at: chrono::Utc::now().timestamp() + expires_in,
            scopes: vec![],
        }
    }

    #[test]
    fn test_oauth_tokens_expiry() {
        let fresh = tokens(3600);
        assert!(!fresh.is_expired());
        assert!(!fresh.is_definitely_expired());

        let expired = tokens(-100);
        assert!(expired.is_expired());
        assert!(expired.is_definitely_expired());

        // Within the grace window
        let expiring = tokens(60);
        assert!(expiring.is_expired());
        assert!(!expiring.is_definitely_expired());
    }

    #[tokio::test]
    async fn test_provider_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.tokens.dir = dir.path().to_path_buf();

        let provider = create_token_provider(&config);
        assert!(provider.list_accounts().await.unwrap().is_empty());

        provider
            .store_tokens("ann@example.com", &tokens(3600))
            .await
            .unwrap();
        provider
            .update_access_token("ann@example.com", "renewed", 42)
            .await
            .unwrap();

        let stored = provider.get_tokens("ann@example.com").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "renewed");
        assert_eq!(stored.expires_at, 42);
        assert!(provider.has_tokens("ann@example.com").await.unwrap());
    }
}

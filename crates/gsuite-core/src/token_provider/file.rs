//! File-based token provider
//!
//! Stores tokens in `{dir}/.oauth2.{email}.json`, with an in-memory cache in
//! front of the files.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::{OAuthTokens, TokenProvider};

const FILE_PREFIX: &str = ".oauth2.";
const FILE_SUFFIX: &str = ".json";

/// File-based token provider
pub struct FileTokenProvider {
    dir: PathBuf,
    cache: RwLock<HashMap<String, OAuthTokens>>,
}

impl FileTokenProvider {
    /// Create a provider storing tokens under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Path of the token file for an account
    pub fn token_path(&self, account_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", FILE_PREFIX, account_id, FILE_SUFFIX))
    }
}

#[async_trait]
impl TokenProvider for FileTokenProvider {
    async fn get_tokens(&self, account_id: &str) -> Result<Option<OAuthTokens>> {
        let cached = self.cache.read().get(account_id).cloned();
        if let Some(tokens) = cached {
            debug!("Retrieved OAuth tokens for {} from cache", account_id);
            return Ok(Some(tokens));
        }

        let path = self.token_path(account_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No tokens found for {}", account_id);
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Token(format!(
                    "Failed to read {:?}: {}",
                    path, e
                )))
            }
        };

        let tokens: OAuthTokens = serde_json::from_str(&contents)
            .map_err(|e| Error::Token(format!("Invalid token file {:?}: {}", path, e)))?;
        self.cache
            .write()
            .insert(account_id.to_string(), tokens.clone());

        debug!("Retrieved OAuth tokens for {} from {:?}", account_id, path);
        Ok(Some(tokens))
    }

    async fn store_tokens(&self, account_id: &str, tokens: &OAuthTokens) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.token_path(account_id);
        let data = serde_json::to_string_pretty(tokens)?;
        tokio::fs::write(&path, data).await?;

        self.cache
            .write()
            .insert(account_id.to_string(), tokens.clone());
        debug!("Stored OAuth tokens for {} at {:?}", account_id, path);
        Ok(())
    }

    async fn delete_tokens(&self, account_id: &str) -> Result<()> {
        self.cache.write().remove(account_id);

        match tokio::fs::remove_file(self.token_path(account_id)).await {
            Ok(()) => {
                info!("Deleted OAuth tokens for {}", account_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No tokens to delete for {}", account_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_accounts(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            debug!("Tokens directory does not exist: {:?}", self.dir);
            return Ok(vec![]);
        }

        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| Error::Token(format!("Failed to read tokens directory: {}", e)))?;

        let mut accounts: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_prefix(FILE_PREFIX)?
                    .strip_suffix(FILE_SUFFIX)
                    .map(String::from)
            })
            .collect();
        accounts.sort();

        debug!("Found {} accounts with stored tokens", accounts.len());
        Ok(accounts)
    }
}

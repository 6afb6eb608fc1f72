//! OAuth 2.0 flow for Google authentication

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::OAuthConfig;
use crate::error::{Error, Result};
use crate::token_provider::{OAuthTokens, TokenProvider};

/// Environment variables holding the OAuth client credentials
pub const CLIENT_ID_ENV: &str = "GSUITE_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "GSUITE_CLIENT_SECRET";

/// Required OAuth scopes
pub const OAUTH_SCOPES: &[&str] = &[
    "https://mail.google.com/",
    "https://www.googleapis.com/auth/userinfo.email",
    "openid",
];

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Path the loopback listener answers on
const CALLBACK_PATH: &str = "/code";

/// Google OAuth client configuration
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Loopback port for the authorization callback
    pub redirect_port: u16,
}

/// Google client secrets file, as downloaded from the Cloud Console
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
}

impl GoogleOAuthConfig {
    /// Resolve client credentials from the environment, then the secrets file
    pub fn from_config(config: &OAuthConfig) -> Result<Self> {
        let from_env = (
            std::env::var(CLIENT_ID_ENV).ok(),
            std::env::var(CLIENT_SECRET_ENV).ok(),
        );
        let (client_id, client_secret) = match from_env {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                let secrets = load_client_secrets(&config.client_secrets_file)?;
                (secrets.client_id, secrets.client_secret)
            }
        };

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri: format!("http://localhost:{}{}", config.redirect_port, CALLBACK_PATH),
            redirect_port: config.redirect_port,
        })
    }
}

fn load_client_secrets(path: &Path) -> Result<ClientSecrets> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "OAuth client not configured: set {} and {}, or provide {:?} ({})",
            CLIENT_ID_ENV, CLIENT_SECRET_ENV, path, e
        ))
    })?;
    let file: ClientSecretsFile = serde_json::from_str(&contents)?;
    file.installed.or(file.web).ok_or_else(|| {
        Error::Config(format!(
            "{:?} has neither an \"installed\" nor a \"web\" client",
            path
        ))
    })
}

/// Response from Google token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: String,
    pub scope: Option<String>,
}

/// User info from Google
#[derive(Debug, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

/// OAuth manager for handling Google authentication
pub struct OAuthManager {
    config: GoogleOAuthConfig,
    client: Client,
    token_provider: Arc<dyn TokenProvider>,
}

impl OAuthManager {
    pub fn new(config: GoogleOAuthConfig, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            config,
            client: Client::new(),
            token_provider,
        }
    }

    /// Generate the OAuth authorization URL
    pub fn authorization_url(&self, state: &str, login_hint: Option<&str>) -> String {
        let scopes = OAUTH_SCOPES.join(" ");
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}\
             &access_type=offline&prompt=consent&state={}",
            AUTH_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        );
        if let Some(hint) = login_hint {
            url.push_str("&login_hint=");
            url.push_str(&urlencoding::encode(hint));
        }
        url
    }

    /// Accept one request on the loopback redirect and return its authorization code
    pub async fn wait_for_code(&self, state: &str, timeout: Duration) -> Result<String> {
        let listener = TcpListener::bind(("127.0.0.1", self.config.redirect_port)).await?;
        info!(
            "Waiting for OAuth callback on http://localhost:{}",
            self.config.redirect_port
        );

        let callback = async {
            let (mut socket, _) = listener.accept().await?;
            let mut reader = BufReader::new(&mut socket);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).await?;

            let outcome = parse_callback(&request_line).and_then(|(code, received_state)| {
                if received_state == state {
                    Ok(code)
                } else {
                    Err(Error::OAuth("OAuth state mismatch".to_string()))
                }
            });

            let response = match &outcome {
                Ok(_) => {
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
                     <!DOCTYPE html><html><body style='font-family: sans-serif; padding: 40px; text-align: center;'>\
                     <h1>Authentication Successful!</h1><p>You can close this window.</p></body></html>"
                }
                Err(_) => {
                    "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
                     <h1>Authentication failed</h1>"
                }
            };
            socket.write_all(response.as_bytes()).await?;
            outcome
        };

        tokio::time::timeout(timeout, callback)
            .await
            .map_err(|_| Error::OAuth("No OAuth callback received before timeout".to_string()))?
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<(OAuthTokens, UserInfo)> {
        info!("Exchanging authorization code for tokens");

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed: {} - {}", status, body);
            return Err(Error::OAuth(format!(
                "Token exchange failed: {} - {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        debug!("Token exchange successful");

        let expires_at = chrono::Utc::now().timestamp() + token_response.expires_in;

        let tokens = OAuthTokens {
            access_token: token_response.access_token.clone(),
            refresh_token: token_response
                .refresh_token
                .ok_or_else(|| Error::OAuth("No refresh token in response".to_string()))?,
            expires_at,
            scopes: token_response
                .scope
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_else(|| OAUTH_SCOPES.iter().map(|s| s.to_string()).collect()),
        };

        let user_info = self.get_user_info(&token_response.access_token).await?;
        info!("Authenticated as {}", user_info.email);

        Ok((tokens, user_info))
    }

    /// Refresh an access token and persist the result
    pub async fn refresh_token(&self, account_id: &str) -> Result<OAuthTokens> {
        let current_tokens = self
            .token_provider
            .get_tokens(account_id)
            .await?
            .ok_or_else(|| Error::NoCredentials {
                account: account_id.to_string(),
            })?;

        debug!("Refreshing access token for {}", account_id);

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", current_tokens.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::TokenRefreshFailed {
                account: account_id.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token refresh failed for {}: {} - {}", account_id, status, body);
            return Err(Error::TokenRefreshFailed {
                account: account_id.to_string(),
                reason: format!("{} - {}", status, body),
            });
        }

        let token_response: TokenResponse = response.json().await?;
        let expires_at = chrono::Utc::now().timestamp() + token_response.expires_in;

        let rotated = token_response.refresh_token.is_some();
        let new_tokens = OAuthTokens {
            access_token: token_response.access_token,
            refresh_token: token_response
                .refresh_token
                .unwrap_or(current_tokens.refresh_token),
            expires_at,
            scopes: current_tokens.scopes,
        };

        // Google omits the refresh token unless it rotated it
        if rotated {
            self.token_provider
                .store_tokens(account_id, &new_tokens)
                .await?;
        } else {
            self.token_provider
                .update_access_token(account_id, &new_tokens.access_token, expires_at)
                .await?;
        }
        info!("Refreshed access token for {}", account_id);

        Ok(new_tokens)
    }

    /// Get user info from Google
    pub async fn get_user_info(&self, access_token: &str) -> Result<UserInfo> {
        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OAuth(format!(
                "Failed to get user info: {} - {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Get a valid access token, refreshing if necessary
    pub async fn get_valid_token(&self, account_id: &str) -> Result<String> {
        debug!("Getting valid token for {}", account_id);
        let tokens = self
            .token_provider
            .get_tokens(account_id)
            .await?
            .ok_or_else(|| Error::NoCredentials {
                account: account_id.to_string(),
            })?;

        if tokens.is_expired() {
            info!("Token expired for {}, refreshing...", account_id);
            let new_tokens = self.refresh_token(account_id).await?;
            Ok(new_tokens.access_token)
        } else {
            debug!("Token still valid for {}", account_id);
            Ok(tokens.access_token)
        }
    }

    /// Get the token provider
    pub fn token_provider(&self) -> &Arc<dyn TokenProvider> {
        &self.token_provider
    }
}

/// Parse the request line of the loopback callback into `(code, state)`
pub fn parse_callback(request_line: &str) -> Result<(String, String)> {
    let path = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| Error::OAuth("Invalid HTTP request".to_string()))?;

    let (route, query) = path.split_once('?').unwrap_or((path, ""));
    if route != CALLBACK_PATH {
        return Err(Error::OAuth(format!("Unexpected callback path: {}", route)));
    }

    let mut code = None;
    let mut state = None;
    let mut denied = None;

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => denied = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(reason) = denied {
        return Err(Error::OAuth(format!("Authorization denied: {}", reason)));
    }
    let code = code.ok_or_else(|| Error::OAuth("No authorization code in callback".to_string()))?;
    let state = state.ok_or_else(|| Error::OAuth("No state in callback".to_string()))?;

    Ok((code, state))
}

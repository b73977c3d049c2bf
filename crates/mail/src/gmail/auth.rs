//! Gmail OAuth2 authentication
//!
//! Implements OAuth2 authorization code flow for Gmail API authentication.
//! Uses a local HTTP server to receive the OAuth callback.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.
//!
//! Authorization runs in two modes: immediate mode accepts only stored
//! or refreshed credentials and fails otherwise, while interactive mode
//! may open a browser and walk the user through consent. API requests
//! themselves never prompt; they fail until an interactive sign-in has
//! happened.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::RwLock;

/// OAuth2 configuration and token management for Gmail
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    store: TokenStore,
}

/// Where tokens live between calls
enum TokenStore {
    File(PathBuf),
    Memory(RwLock<Option<StoredToken>>),
}

/// Stored token data
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: String,
}

impl GmailAuth {
    /// Gmail API OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Required scope for Gmail access (modify allows read + label changes)
    const GMAIL_MODIFY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.modify";

    /// Port range to try for local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// Tokens this close to expiry are treated as already expired
    const EXPIRY_MARGIN_SECS: i64 = 300;

    /// Create a new GmailAuth instance
    ///
    /// # Arguments
    /// * `client_id` - OAuth2 client ID from Google Cloud Console
    /// * `client_secret` - OAuth2 client secret from Google Cloud Console
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let token_path = Self::default_token_path()?;
        Ok(Self::with_token_path(client_id, client_secret, token_path))
    }

    /// Create an instance storing tokens at an explicit path
    pub fn with_token_path(client_id: String, client_secret: String, token_path: PathBuf) -> Self {
        Self {
            client_id,
            client_secret,
            store: TokenStore::File(token_path),
        }
    }

    /// Create an instance keeping tokens in memory only
    ///
    /// # Arguments
    /// * `token_json` - Optional serialized token to seed the store with
    pub fn with_token_data(
        client_id: String,
        client_secret: String,
        token_json: Option<String>,
    ) -> Result<Self> {
        let seed = match token_json {
            Some(json) => {
                Some(serde_json::from_str(&json).context("Invalid stored token data")?)
            }
            None => None,
        };

        Ok(Self {
            client_id,
            client_secret,
            store: TokenStore::Memory(RwLock::new(seed)),
        })
    }

    /// Get the default token storage path (~/.config/comet/gmail-tokens.json)
    fn default_token_path() -> Result<PathBuf> {
        config::config_path("gmail-tokens.json").context("Could not determine config directory")
    }

    /// Ensure the account is authorized
    ///
    /// # Arguments
    /// * `immediate` - When true, succeed only on stored or refreshed
    ///   credentials; when false, fall back to the interactive browser flow
    pub fn authorize(&self, immediate: bool) -> Result<()> {
        if let Ok(token) = self.load_token() {
            if Self::is_fresh(&token) {
                return Ok(());
            }

            if let Some(refresh_token) = token.refresh_token
                && let Ok(new_token) = self.refresh_access_token(&refresh_token)
            {
                self.save_token_response(&new_token)?;
                return Ok(());
            }
        }

        if immediate {
            anyhow::bail!("No usable stored credentials; interactive sign-in required");
        }

        let token = self.authorization_code_auth()?;
        self.save_token_response(&token)?;
        Ok(())
    }

    /// Get a valid access token for an API request
    ///
    /// Refreshes an expired token when possible but never starts the
    /// interactive flow; callers must have authorized beforehand.
    pub fn access_token(&self) -> Result<String> {
        let token = self
            .load_token()
            .context("Not signed in; authorize first")?;

        if Self::is_fresh(&token) {
            return Ok(token.access_token);
        }

        let refresh_token = token
            .refresh_token
            .context("Access token expired and no refresh token is stored")?;
        let new_token = self.refresh_access_token(&refresh_token)?;
        self.save_token_response(&new_token)?;
        Ok(new_token.access_token)
    }

    /// Check whether a stored token is still comfortably inside its lifetime
    fn is_fresh(token: &StoredToken) -> bool {
        if let Some(expires_at) = token.expires_at {
            let now = chrono::Utc::now().timestamp();
            return expires_at > now + Self::EXPIRY_MARGIN_SECS;
        }
        false
    }

    /// Perform authorization code flow authentication
    fn authorization_code_auth(&self) -> Result<TokenResponse> {
        // Step 1: Start local server to receive callback
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        // Step 2: Build authorization URL
        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(Self::GMAIL_MODIFY_SCOPE),
        );

        info!("Opening browser for Gmail authentication");

        // Open browser
        if let Err(e) = open::that(&auth_url) {
            warn!(
                "Failed to open browser: {}. Visit this URL manually: {}",
                e, auth_url
            );
        }

        // Step 3: Wait for callback with authorization code
        info!("Waiting for authorization callback on port {}", port);
        let code = self.wait_for_callback(listener)?;

        // Step 4: Exchange code for tokens
        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        info!("Gmail authentication successful");
        Ok(token)
    }

    /// Start a local TCP server on an available port
    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for OAuth callback and extract authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        // Parse the request to get the code
        // Format: GET /?code=AUTH_CODE&scope=... HTTP/1.1
        let code = Self::callback_param(&request_line, "code");

        // Check for error in callback
        let error = Self::callback_param(&request_line, "error");

        // Send response to browser
        let (status, body) = if code.is_some() {
            ("200 OK", "Authentication successful! You can close this window.")
        } else {
            ("400 Bad Request", "Authentication failed. Please try again.")
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        if let Some(err) = error {
            anyhow::bail!("OAuth error: {}", err);
        }

        code.context("No authorization code received")
    }

    /// Extract a query parameter from the callback request line
    fn callback_param(request_line: &str, name: &str) -> Option<String> {
        request_line
            .split_whitespace()
            .nth(1) // Get the path
            .and_then(|path| path.split('?').nth(1)) // Get query string
            .and_then(|query| {
                query.split('&').find_map(|param| {
                    let mut parts = param.split('=');
                    if parts.next() == Some(name) {
                        parts.next().map(|s| s.to_string())
                    } else {
                        None
                    }
                })
            })
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Preserve the refresh token if not returned
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }

    /// Load the stored token
    fn load_token(&self) -> Result<StoredToken> {
        match &self.store {
            TokenStore::File(path) => {
                let content = fs::read_to_string(path)?;
                let token: StoredToken = serde_json::from_str(&content)?;
                Ok(token)
            }
            TokenStore::Memory(slot) => {
                slot.read().unwrap().clone().context("No stored token")
            }
        }
    }

    /// Persist a token
    fn save_token(&self, stored: &StoredToken) -> Result<()> {
        match &self.store {
            TokenStore::File(path) => {
                // Ensure directory exists
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let content = serde_json::to_string_pretty(stored)?;
                fs::write(path, content)?;
            }
            TokenStore::Memory(slot) => {
                *slot.write().unwrap() = Some(stored.clone());
            }
        }
        Ok(())
    }

    /// Persist a token response from Google
    fn save_token_response(&self, token: &TokenResponse) -> Result<()> {
        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        };
        self.save_token(&stored)
    }

    /// Check if the user is already authenticated
    pub fn is_authenticated(&self) -> bool {
        if let Ok(token) = self.load_token() {
            if Self::is_fresh(&token) {
                return true;
            }
            // Try refresh
            if let Some(refresh_token) = token.refresh_token {
                return self.refresh_access_token(&refresh_token).is_ok();
            }
        }
        false
    }

    /// Clear stored tokens (logout)
    pub fn logout(&self) -> Result<()> {
        match &self.store {
            TokenStore::File(path) => {
                if path.exists() {
                    fs::remove_file(path)?;
                }
            }
            TokenStore::Memory(slot) => {
                *slot.write().unwrap() = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token_json(expires_in_secs: i64, refresh_token: Option<&str>) -> String {
        let expires_at = chrono::Utc::now().timestamp() + expires_in_secs;
        serde_json::to_string(&StoredToken {
            access_token: "at-123".to_string(),
            refresh_token: refresh_token.map(|s| s.to_string()),
            expires_at: Some(expires_at),
        })
        .unwrap()
    }

    fn make_memory_auth(token_json: Option<String>) -> GmailAuth {
        GmailAuth::with_token_data("test-id".to_string(), "test-secret".to_string(), token_json)
            .unwrap()
    }

    #[test]
    fn test_immediate_authorize_accepts_fresh_token() {
        let auth = make_memory_auth(Some(make_token_json(3600, None)));

        assert!(auth.authorize(true).is_ok());
        assert_eq!(auth.access_token().unwrap(), "at-123");
        assert!(auth.is_authenticated());
    }

    #[test]
    fn test_immediate_authorize_fails_without_credentials() {
        let auth = make_memory_auth(None);

        let err = auth.authorize(true).unwrap_err();
        assert!(err.to_string().contains("interactive sign-in required"));
    }

    #[test]
    fn test_immediate_authorize_fails_on_expired_token_without_refresh() {
        let auth = make_memory_auth(Some(make_token_json(-60, None)));

        assert!(auth.authorize(true).is_err());
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn test_access_token_rejects_token_inside_expiry_margin() {
        // Expires in one minute, inside the five minute margin
        let auth = make_memory_auth(Some(make_token_json(60, None)));

        assert!(auth.access_token().is_err());
    }

    #[test]
    fn test_access_token_requires_prior_sign_in() {
        let auth = make_memory_auth(None);

        let err = auth.access_token().unwrap_err();
        assert!(err.to_string().contains("Not signed in"));
    }

    #[test]
    fn test_logout_clears_memory_store() {
        let auth = make_memory_auth(Some(make_token_json(3600, None)));

        assert!(auth.authorize(true).is_ok());
        auth.logout().unwrap();
        assert!(auth.authorize(true).is_err());
    }

    #[test]
    fn test_file_store_round_trip_and_logout() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("tokens").join("gmail-tokens.json");

        let auth = GmailAuth::with_token_path(
            "test-id".to_string(),
            "test-secret".to_string(),
            token_path.clone(),
        );
        auth.save_token(&StoredToken {
            access_token: "at-disk".to_string(),
            refresh_token: None,
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
        })
        .unwrap();

        assert!(token_path.exists());
        assert_eq!(auth.access_token().unwrap(), "at-disk");

        auth.logout().unwrap();
        assert!(!token_path.exists());
        assert!(auth.access_token().is_err());
    }

    #[test]
    fn test_with_token_data_rejects_malformed_json() {
        let result = GmailAuth::with_token_data(
            "test-id".to_string(),
            "test-secret".to_string(),
            Some("not json".to_string()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_callback_param_extraction() {
        let line = "GET /?code=abc123&scope=email HTTP/1.1";
        assert_eq!(
            GmailAuth::callback_param(line, "code"),
            Some("abc123".to_string())
        );
        assert_eq!(GmailAuth::callback_param(line, "error"), None);

        let denied = "GET /?error=access_denied HTTP/1.1";
        assert_eq!(
            GmailAuth::callback_param(denied, "error"),
            Some("access_denied".to_string())
        );
    }
}

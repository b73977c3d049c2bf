//! OAuth client credential discovery
//!
//! Gmail access needs an OAuth client id and secret. They can come from
//! three places, checked in order:
//! 1. Values baked in at build time (release builds)
//! 2. A Google Cloud Console JSON file in the Comet config directory
//! 3. `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET` environment variables

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Filename of the credential file inside the Comet config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// OAuth client credentials for the Gmail API
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Top-level shape of a Google Cloud Console credential download.
/// Desktop clients carry an "installed" section, web clients a "web" one.
#[derive(Deserialize)]
struct CredentialFile {
    installed: Option<CredentialRecord>,
    web: Option<CredentialRecord>,
}

#[derive(Deserialize)]
struct CredentialRecord {
    client_id: String,
    client_secret: String,
}

impl CredentialFile {
    fn into_credentials(self) -> Result<GmailCredentials> {
        let record = self
            .installed
            .or(self.web)
            .context("Credentials file has neither an 'installed' nor a 'web' section")?;
        Ok(GmailCredentials {
            client_id: record.client_id,
            client_secret: record.client_secret,
        })
    }
}

impl GmailCredentials {
    /// Find credentials, preferring compile-time values, then the config
    /// file, then environment variables.
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }
        if config::config_exists(CREDENTIALS_FILE) {
            let file: CredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return file.into_credentials();
        }
        Self::from_env()
    }

    /// Credentials embedded at build time. Set `GOOGLE_CLIENT_ID` and
    /// `GOOGLE_CLIENT_SECRET` when invoking cargo to bake them in; empty
    /// values count as absent.
    pub fn from_compile_time() -> Option<Self> {
        match (
            option_env!("GOOGLE_CLIENT_ID"),
            option_env!("GOOGLE_CLIENT_SECRET"),
        ) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some(Self {
                client_id: id.to_string(),
                client_secret: secret.to_string(),
            }),
            _ => None,
        }
    }

    /// Read credentials from a JSON file at an explicit path
    pub fn from_file(path: &Path) -> Result<Self> {
        let file: CredentialFile = config::load_json_file(path)?;
        file.into_credentials()
    }

    /// Parse credentials from a JSON string in the Cloud Console format
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        file.into_credentials()
    }

    /// Read credentials from `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET`
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// Default location of the credential file inside the Comet config directory
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }

    /// Whether any of the three credential sources is present
    pub fn is_available() -> bool {
        Self::from_compile_time().is_some()
            || config::config_exists(CREDENTIALS_FILE)
            || (std::env::var("GMAIL_CLIENT_ID").is_ok()
                && std::env::var("GMAIL_CLIENT_SECRET").is_ok())
    }
}

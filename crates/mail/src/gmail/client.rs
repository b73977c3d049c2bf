//! Gmail API HTTP client
//!
//! Provides methods for listing, fetching and modifying mail via the
//! Gmail API. Uses synchronous HTTP (ureq) to be executor-agnostic;
//! the async layer runs these calls on blocking tasks. Multi-item
//! fetches go through the batch endpoint in a single round trip.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use super::api::{
    GmailMessage, GmailThread, ListLabelsResponse, ListMessagesResponse, ListThreadsResponse,
    ModifyThreadRequest, ProfileResponse,
};
use super::batch;
use super::GmailAuth;
use crate::models::{LabelChange, PageRequest, ThreadId};
use crate::transport::BatchResults;

/// Gmail API client
///
/// Cheap to clone; clones share the same auth state.
#[derive(Clone)]
pub struct GmailClient {
    auth: Arc<GmailAuth>,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Gmail batch endpoint
    const BATCH_URL: &'static str = "https://gmail.googleapis.com/batch/gmail/v1";

    /// Create a new Gmail client
    pub fn new(auth: GmailAuth) -> Self {
        Self {
            auth: Arc::new(auth),
        }
    }

    /// Run the OAuth flow
    ///
    /// # Arguments
    /// * `immediate` - When true, only stored or refreshed credentials
    ///   are acceptable; the flow fails rather than prompting the user
    pub fn authorize(&self, immediate: bool) -> Result<()> {
        self.auth.authorize(immediate)
    }

    /// Check if the client is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Fetch the profile of the authorized account
    pub fn get_profile(&self) -> Result<ProfileResponse> {
        let access_token = self.auth.access_token()?;

        let url = format!("{}/users/me/profile", Self::BASE_URL);

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send profile request")?;

        let profile: ProfileResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse profile response")?;

        Ok(profile)
    }

    /// List thread references from the user's mailbox
    ///
    /// # Arguments
    /// * `page` - Page size, optional search query and page token
    pub fn list_threads(&self, page: &PageRequest) -> Result<ListThreadsResponse> {
        let access_token = self.auth.access_token()?;
        let url = self.list_url("threads", page);

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list threads request")?;

        let listing: ListThreadsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list threads response")?;

        Ok(listing)
    }

    /// List message references from the user's mailbox
    ///
    /// # Arguments
    /// * `page` - Page size, optional search query and page token
    pub fn list_messages(&self, page: &PageRequest) -> Result<ListMessagesResponse> {
        let access_token = self.auth.access_token()?;
        let url = self.list_url("messages", page);

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list messages request")?;

        let listing: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        Ok(listing)
    }

    /// List all labels (folders) in the user's mailbox
    pub fn list_labels(&self) -> Result<ListLabelsResponse> {
        let access_token = self.auth.access_token()?;

        let url = format!("{}/users/me/labels", Self::BASE_URL);

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list labels request")?;

        let labels: ListLabelsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse labels response")?;

        Ok(labels)
    }

    /// Fetch full threads by ID, one outcome per requested ID
    pub fn get_threads_batch(&self, ids: &[String]) -> Result<BatchResults<GmailThread>> {
        self.get_batch("threads", ids)
    }

    /// Fetch full messages by ID, one outcome per requested ID
    pub fn get_messages_batch(&self, ids: &[String]) -> Result<BatchResults<GmailMessage>> {
        self.get_batch("messages", ids)
    }

    /// Add and remove labels on a thread
    ///
    /// Returns the modified thread as the server reports it.
    pub fn modify_thread(&self, id: &ThreadId, change: &LabelChange) -> Result<GmailThread> {
        let access_token = self.auth.access_token()?;

        let url = format!(
            "{}/users/me/threads/{}/modify",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );
        let request = ModifyThreadRequest {
            add_label_ids: change
                .add_label_ids
                .iter()
                .map(|label| label.as_str().to_string())
                .collect(),
            remove_label_ids: change
                .remove_label_ids
                .iter()
                .map(|label| label.as_str().to_string())
                .collect(),
        };

        let mut response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(&request)
            .context("Failed to send modify thread request")?;

        let thread: GmailThread = response
            .body_mut()
            .read_json()
            .context("Failed to parse modify thread response")?;

        Ok(thread)
    }

    fn list_url(&self, kind: &str, page: &PageRequest) -> String {
        // Gmail caps maxResults at 500
        let mut url = format!(
            "{}/users/me/{}?maxResults={}",
            Self::BASE_URL,
            kind,
            page.max_results.min(500)
        );

        if let Some(query) = &page.query
            && !query.is_empty()
        {
            url.push_str(&format!("&q={}", urlencoding::encode(query)));
        }
        if let Some(token) = &page.page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        url
    }

    fn get_batch<T: DeserializeOwned>(
        &self,
        kind: &str,
        ids: &[String],
    ) -> Result<BatchResults<T>> {
        if ids.is_empty() {
            return Ok(BatchResults::new());
        }

        // A lone ID does not warrant multipart framing
        if let [id] = ids {
            let mut results = BatchResults::new();
            results.insert(id.clone(), self.get_item(kind, id));
            return Ok(results);
        }

        let access_token = self.auth.access_token()?;
        let request = batch::build_batch_request(kind, ids);

        let mut response = ureq::post(Self::BATCH_URL)
            .header("Authorization", &format!("Bearer {}", access_token))
            .header(
                "Content-Type",
                &format!("multipart/mixed; boundary={}", request.boundary),
            )
            .send(request.body.as_bytes())
            .context("Failed to send batch request")?;

        let boundary = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .and_then(batch::extract_boundary)
            .context("Batch response missing multipart boundary")?;
        let body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read batch response")?;

        batch::parse_batch_response(&body, &boundary)
    }

    fn get_item<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<T> {
        let access_token = self.auth.access_token()?;

        let url = format!(
            "{}/users/me/{}/{}?format=full",
            Self::BASE_URL,
            kind,
            urlencoding::encode(id)
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .with_context(|| format!("Failed to fetch {} {}", kind, id))?;

        let item: T = response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse {} {}", kind, id))?;

        Ok(item)
    }
}

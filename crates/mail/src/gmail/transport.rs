//! Async transport backed by the Gmail REST client
//!
//! [`GmailClient`] is synchronous, so every call runs on a blocking
//! task; the client is cheap to clone and clones share auth state,
//! which keeps the handoff free of locks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;

use super::api::{
    GmailMessage, GmailThread, ListLabelsResponse, ListMessagesResponse, ListThreadsResponse,
};
use super::GmailClient;
use crate::models::{LabelChange, PageRequest, ThreadId};
use crate::transport::{BatchResults, MailTransport};

/// Production [`MailTransport`] speaking to the real Gmail API
pub struct GmailTransport {
    client: GmailClient,
}

impl GmailTransport {
    pub fn new(client: GmailClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MailTransport for GmailTransport {
    async fn authorize(&self, immediate: bool) -> Result<()> {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || client.authorize(immediate))
            .await
            .context("Authorize task failed")?
    }

    async fn load(&self) -> Result<()> {
        let client = self.client.clone();
        let profile = tokio::task::spawn_blocking(move || client.get_profile())
            .await
            .context("Profile task failed")??;

        debug!("Mailbox ready for {}", profile.email_address);
        Ok(())
    }

    async fn list_threads(&self, page: &PageRequest) -> Result<ListThreadsResponse> {
        let client = self.client.clone();
        let page = page.clone();
        tokio::task::spawn_blocking(move || client.list_threads(&page))
            .await
            .context("List threads task failed")?
    }

    async fn list_messages(&self, page: &PageRequest) -> Result<ListMessagesResponse> {
        let client = self.client.clone();
        let page = page.clone();
        tokio::task::spawn_blocking(move || client.list_messages(&page))
            .await
            .context("List messages task failed")?
    }

    async fn list_labels(&self) -> Result<ListLabelsResponse> {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || client.list_labels())
            .await
            .context("List labels task failed")?
    }

    async fn get_threads(&self, ids: &[String]) -> Result<BatchResults<GmailThread>> {
        let client = self.client.clone();
        let ids = ids.to_vec();
        tokio::task::spawn_blocking(move || client.get_threads_batch(&ids))
            .await
            .context("Thread batch task failed")?
    }

    async fn get_messages(&self, ids: &[String]) -> Result<BatchResults<GmailMessage>> {
        let client = self.client.clone();
        let ids = ids.to_vec();
        tokio::task::spawn_blocking(move || client.get_messages_batch(&ids))
            .await
            .context("Message batch task failed")?
    }

    async fn modify_thread(&self, id: &ThreadId, change: &LabelChange) -> Result<GmailThread> {
        let client = self.client.clone();
        let id = id.clone();
        let change = change.clone();
        tokio::task::spawn_blocking(move || client.modify_thread(&id, &change))
            .await
            .context("Modify thread task failed")?
    }
}

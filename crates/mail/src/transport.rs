//! Remote transport trait definitions

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::gmail::api::{
    GmailMessage, GmailThread, ListLabelsResponse, ListMessagesResponse, ListThreadsResponse,
};
use crate::models::{LabelChange, PageRequest, ThreadId};

/// Per-item results of a batched fetch, keyed by the requested item ID
///
/// An `Err` entry means that item's sub-request failed while the batch as a
/// whole went through. Items the server did not answer for are simply
/// absent from the map.
pub type BatchResults<P> = HashMap<String, Result<P>>;

/// Trait for the remote mailbox API
///
/// This trait abstracts over the wire client so the orchestration layer can
/// be tested against scripted transports. All calls may suspend; none of
/// them retry on their own.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Obtain authorization to call the mailbox API
    ///
    /// With `immediate` set, only previously granted credentials may be
    /// used (no user interaction). Without it, the user may be prompted.
    async fn authorize(&self, immediate: bool) -> Result<()>;

    /// Verify the mailbox API is reachable with the obtained authorization
    async fn load(&self) -> Result<()>;

    /// List thread references for one page
    async fn list_threads(&self, page: &PageRequest) -> Result<ListThreadsResponse>;

    /// List message references for one page
    async fn list_messages(&self, page: &PageRequest) -> Result<ListMessagesResponse>;

    /// List all labels in the mailbox
    async fn list_labels(&self) -> Result<ListLabelsResponse>;

    /// Fetch full threads by ID in a single batched call
    async fn get_threads(&self, ids: &[String]) -> Result<BatchResults<GmailThread>>;

    /// Fetch full messages by ID in a single batched call
    async fn get_messages(&self, ids: &[String]) -> Result<BatchResults<GmailMessage>>;

    /// Apply a label delta to a thread, returning the modified thread
    async fn modify_thread(&self, id: &ThreadId, change: &LabelChange) -> Result<GmailThread>;
}

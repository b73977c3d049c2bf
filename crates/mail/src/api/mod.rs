//! Mailbox API orchestration
//!
//! [`MailApi`] is the single entry point the UI talks to. It wires
//! together the readiness gate, the in-flight call tracker, the event hub
//! and the cache-aware batch fetcher, and exposes the operation catalog:
//! listing threads, messages and labels, and per-thread label mutations.
//!
//! Every operation follows the same shape: acquire a call guard (which
//! emits `start`), wait for the readiness gate, run the outer remote call,
//! resolve per-item payloads through the batch fetcher, translate, and
//! return. The guard emits `stop` and possibly `all_stopped` on the way
//! out, whether the operation succeeded or not.

mod events;
mod fetch;
mod gate;
mod tracker;

pub use events::{ApiEvent, EventHub, EventKind, Subscription};
pub use fetch::{BatchFetcher, ResolvedItem};
pub use gate::{ReadinessGate, ReadinessState};
pub use tracker::{CallGuard, CallId, CallIdSource, CallTracker, UuidIds};

use std::sync::Arc;

use log::{info, warn};

use crate::cache::{InMemoryCache, PayloadCache};
use crate::config::GmailCredentials;
use crate::dispatch::{Action, Dispatcher, NullDispatcher};
use crate::gmail::api::{GmailMessage, GmailThread};
use crate::gmail::{GmailAuth, GmailClient, GmailTransport};
use crate::models::{
    Label, LabelChange, LabelId, Message, PageRequest, PageResult, ThreadId, ThreadSummary,
};
use crate::translate;
use crate::transport::MailTransport;

/// Error indicating an API call failed
///
/// Deliberately opaque: callers get the failure signal, the log gets the
/// detail. Authorization problems are not reported this way; they surface
/// through `authorized` events instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mail API call failed")]
pub struct CallFailed;

fn call_failed(operation: &str, e: anyhow::Error) -> CallFailed {
    warn!("{} failed: {:#}", operation, e);
    CallFailed
}

/// Orchestrator for the remote mailbox API
///
/// Constructed once per process and shared behind an `Arc`; there is no
/// teardown. All methods take `&self` and may be called concurrently.
pub struct MailApi {
    transport: Arc<dyn MailTransport>,
    dispatcher: Arc<dyn Dispatcher>,
    events: Arc<EventHub>,
    gate: ReadinessGate,
    tracker: CallTracker,
    threads: BatchFetcher<GmailThread>,
    messages: BatchFetcher<GmailMessage>,
}

impl MailApi {
    /// Create an orchestrator with no dispatch bus attached
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self::with_dispatcher(transport, Arc::new(NullDispatcher))
    }

    /// Create an orchestrator that pushes translated messages to `dispatcher`
    pub fn with_dispatcher(
        transport: Arc<dyn MailTransport>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let events = Arc::new(EventHub::new());
        let gate = ReadinessGate::new(Arc::clone(&transport), Arc::clone(&events));
        let tracker = CallTracker::new(Arc::clone(&events));
        let message_cache: Arc<dyn PayloadCache<GmailMessage>> = Arc::new(InMemoryCache::new());

        Self {
            gate,
            tracker,
            threads: BatchFetcher::uncached(),
            messages: BatchFetcher::with_cache(message_cache),
            transport,
            dispatcher,
            events,
        }
    }

    /// Build an orchestrator talking to the real Gmail service
    ///
    /// Uses the given OAuth client and the default on-disk token store.
    pub fn from_credentials(credentials: &GmailCredentials) -> anyhow::Result<Self> {
        let auth = GmailAuth::new(
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
        )?;
        let client = GmailClient::new(auth);
        Ok(Self::new(Arc::new(GmailTransport::new(client))))
    }

    /// Start an interactive login
    ///
    /// The user may be prompted to grant access. The outcome arrives as an
    /// `authorized` event; the call itself never fails and is not tracked
    /// as an in-flight API call.
    pub async fn login(&self) {
        self.gate.authorize(false).await;
    }

    /// Attempt a silent login using previously granted credentials
    pub async fn silent_login(&self) {
        self.gate.authorize(true).await;
    }

    /// Attach a listener for one event kind
    pub fn subscribe(
        &self,
        kind: EventKind,
        callback: impl Fn(&ApiEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.events.subscribe(kind, callback)
    }

    /// Whether any tracked call is currently in flight
    pub fn is_in_progress(&self) -> bool {
        self.tracker.is_in_progress()
    }

    /// Where the readiness handshake currently stands
    pub fn readiness(&self) -> ReadinessState {
        self.gate.state()
    }

    /// List one page of threads
    ///
    /// Resolves with thread summaries in listing order. The full messages
    /// of every resolved thread flow to the dispatcher as a single
    /// [`Action::AddMessages`] before this call returns. Threads whose
    /// payload could not be resolved are dropped from the page.
    pub async fn list_threads(
        &self,
        page: PageRequest,
    ) -> Result<PageResult<ThreadSummary>, CallFailed> {
        let _call = self.tracker.begin();
        self.gate.when_ready().await;

        let listing = self
            .transport
            .list_threads(&page)
            .await
            .map_err(|e| call_failed("threads.list", e))?;

        let thread_ids: Vec<String> = listing
            .threads
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|t| t.id.clone())
            .collect();
        if thread_ids.is_empty() {
            return Ok(PageResult::empty());
        }

        let resolved = self
            .threads
            .resolve(&thread_ids, |missing| async move {
                self.transport.get_threads(&missing).await
            })
            .await;

        let mut all_messages = Vec::new();
        let mut items = Vec::with_capacity(resolved.len());
        for item in resolved {
            match item.payload {
                Some(thread) => {
                    let messages = translate::thread_messages(&thread);
                    items.push(ThreadSummary::new(
                        ThreadId::new(item.id),
                        messages.iter().map(|m| m.id.clone()).collect(),
                    ));
                    all_messages.extend(messages);
                }
                None => {
                    warn!("Dropping thread {} from listing, payload unresolved", item.id);
                }
            }
        }

        self.dispatcher.dispatch(Action::AddMessages(all_messages));

        Ok(PageResult {
            next_page_token: listing.next_page_token,
            result_size_estimate: listing.result_size_estimate.unwrap_or(0),
            items,
        })
    }

    /// List one page of messages
    ///
    /// Messages already fetched by an earlier call are served from the
    /// cache; only the rest are requested remotely, in one batched call.
    pub async fn list_messages(
        &self,
        page: PageRequest,
    ) -> Result<PageResult<Message>, CallFailed> {
        let _call = self.tracker.begin();
        self.gate.when_ready().await;

        let listing = self
            .transport
            .list_messages(&page)
            .await
            .map_err(|e| call_failed("messages.list", e))?;

        let message_ids: Vec<String> = listing
            .messages
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|m| m.id.clone())
            .collect();
        if message_ids.is_empty() {
            return Ok(PageResult::empty());
        }

        let resolved = self
            .messages
            .resolve(&message_ids, |missing| async move {
                self.transport.get_messages(&missing).await
            })
            .await;

        let mut items = Vec::with_capacity(resolved.len());
        for item in resolved {
            match item.payload {
                Some(raw) => items.push(translate::message(&raw)),
                None => {
                    warn!("Dropping message {} from listing, payload unresolved", item.id);
                }
            }
        }

        Ok(PageResult {
            next_page_token: listing.next_page_token,
            result_size_estimate: listing.result_size_estimate.unwrap_or(0),
            items,
        })
    }

    /// List all labels in the mailbox
    pub async fn list_labels(&self) -> Result<Vec<Label>, CallFailed> {
        let _call = self.tracker.begin();
        self.gate.when_ready().await;

        let listing = self
            .transport
            .list_labels()
            .await
            .map_err(|e| call_failed("labels.list", e))?;

        Ok(listing
            .labels
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(translate::label)
            .collect())
    }

    /// Mark a thread as read (remove the UNREAD label)
    pub async fn mark_thread_read(&self, id: &ThreadId) -> Result<GmailThread, CallFailed> {
        info!("Marking thread {} as read", id.as_str());
        self.modify_thread(id, LabelChange::remove(LabelId::UNREAD))
            .await
    }

    /// Mark a thread as unread (add the UNREAD label)
    pub async fn mark_thread_unread(&self, id: &ThreadId) -> Result<GmailThread, CallFailed> {
        info!("Marking thread {} as unread", id.as_str());
        self.modify_thread(id, LabelChange::add(LabelId::UNREAD))
            .await
    }

    /// Archive a thread (remove the INBOX label)
    pub async fn archive_thread(&self, id: &ThreadId) -> Result<GmailThread, CallFailed> {
        info!("Archiving thread {}", id.as_str());
        self.modify_thread(id, LabelChange::remove(LabelId::INBOX))
            .await
    }

    /// Star a thread (add the STARRED label)
    pub async fn star_thread(&self, id: &ThreadId) -> Result<GmailThread, CallFailed> {
        info!("Starring thread {}", id.as_str());
        self.modify_thread(id, LabelChange::add(LabelId::STARRED))
            .await
    }

    /// Unstar a thread (remove the STARRED label)
    pub async fn unstar_thread(&self, id: &ThreadId) -> Result<GmailThread, CallFailed> {
        info!("Unstarring thread {}", id.as_str());
        self.modify_thread(id, LabelChange::remove(LabelId::STARRED))
            .await
    }

    /// Apply a label delta to a thread, resolving with the raw response
    async fn modify_thread(
        &self,
        id: &ThreadId,
        change: LabelChange,
    ) -> Result<GmailThread, CallFailed> {
        let _call = self.tracker.begin();
        self.gate.when_ready().await;

        self.transport
            .modify_thread(id, &change)
            .await
            .map_err(|e| call_failed("threads.modify", e))
    }
}

//! Mail crate - async orchestration over the Gmail API
//!
//! This crate provides platform-independent mail functionality including:
//! - Domain models (ThreadSummary, Message, Label, EmailAddress)
//! - Gmail API client, OAuth authentication and batched fetching
//! - A readiness gate that queues calls until sign-in completes
//! - In-flight call tracking with start/stop/all_stopped events
//! - Cache-aware per-item fetch resolution
//! - An operation catalog: list threads/messages/labels, label mutations
//!
//! [`MailApi`] is the single entry point; everything else supports it.
//! The crate has zero UI dependencies and assumes nothing about the
//! embedding runtime beyond a Tokio reactor.

pub mod api;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod gmail;
pub mod models;
pub mod translate;
pub mod transport;

pub use api::{
    ApiEvent, BatchFetcher, CallFailed, CallGuard, CallId, CallIdSource, CallTracker, EventHub,
    EventKind, MailApi, ReadinessGate, ReadinessState, ResolvedItem, Subscription, UuidIds,
};
pub use cache::{InMemoryCache, PayloadCache};
pub use config::GmailCredentials;
pub use dispatch::{Action, Dispatcher, NullDispatcher};
pub use gmail::{api::ProfileResponse, GmailAuth, GmailClient, GmailTransport};
pub use models::{
    EmailAddress, Label, LabelChange, LabelId, Message, MessageId, PageRequest, PageResult,
    ThreadId, ThreadSummary,
};
pub use transport::{BatchResults, MailTransport};

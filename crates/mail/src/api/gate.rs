//! Readiness gating for API calls
//!
//! The remote API is unusable until a two-phase handshake completes:
//! authorization first, then a load probe confirming the API surface is
//! reachable. Calls arriving before that queue up and are released in
//! arrival order once the gate opens. The gate opens at most once per
//! process; later authorization attempts only re-emit events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::sync::oneshot;

use super::events::{ApiEvent, EventHub};
use crate::transport::MailTransport;

/// Where the handshake currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    /// No authorization obtained yet
    Unauthorized,
    /// An authorization attempt is in flight
    Authorizing,
    /// Authorized, but the load probe has not succeeded yet
    AuthorizedNotLoaded,
    /// Fully ready; calls pass through without queueing
    Ready,
}

struct GateState {
    state: ReadinessState,
    /// A handshake is running; further authorize calls are no-ops until it settles
    handshake_in_flight: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Gate that holds API calls until the readiness handshake completes
pub struct ReadinessGate {
    inner: Mutex<GateState>,
    transport: Arc<dyn MailTransport>,
    events: Arc<EventHub>,
}

impl ReadinessGate {
    pub fn new(transport: Arc<dyn MailTransport>, events: Arc<EventHub>) -> Self {
        Self {
            inner: Mutex::new(GateState {
                state: ReadinessState::Unauthorized,
                handshake_in_flight: false,
                waiters: VecDeque::new(),
            }),
            transport,
            events,
        }
    }

    /// Current handshake state
    pub fn state(&self) -> ReadinessState {
        self.inner.lock().unwrap().state
    }

    /// Number of calls currently queued behind the gate
    pub fn queued_calls(&self) -> usize {
        self.inner.lock().unwrap().waiters.len()
    }

    /// Wait until the gate is open
    ///
    /// Returns without suspending when the gate is already open. Otherwise
    /// the caller joins the queue and resumes when a successful handshake
    /// drains it; queue order is arrival order.
    pub async fn when_ready(&self) {
        let waiter = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == ReadinessState::Ready {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                inner.waiters.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = waiter {
            // Err only when the gate itself is dropped, i.e. at teardown
            let _ = rx.await;
        }
    }

    /// Run the authorization handshake
    ///
    /// With `immediate` set, authorization must succeed without user
    /// interaction (silent mode). The outcome is reported through
    /// `authorized` events; queued calls are released only on full
    /// success. A failed attempt leaves queued calls queued and does not
    /// retry on its own.
    pub async fn authorize(&self, immediate: bool) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.handshake_in_flight {
                return;
            }
            inner.handshake_in_flight = true;
            if inner.state == ReadinessState::Unauthorized {
                inner.state = ReadinessState::Authorizing;
            }
        }

        if let Err(e) = self.transport.authorize(immediate).await {
            warn!("Authorization failed (immediate={}): {:#}", immediate, e);
            {
                let mut inner = self.inner.lock().unwrap();
                if inner.state != ReadinessState::Ready {
                    inner.state = ReadinessState::Unauthorized;
                }
                inner.handshake_in_flight = false;
            }
            self.events.emit(ApiEvent::Authorized(false));
            return;
        }

        self.events.emit(ApiEvent::Authorized(true));
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != ReadinessState::Ready {
                inner.state = ReadinessState::AuthorizedNotLoaded;
            }
        }

        match self.transport.load().await {
            Ok(()) => {
                let waiters = {
                    let mut inner = self.inner.lock().unwrap();
                    inner.state = ReadinessState::Ready;
                    inner.handshake_in_flight = false;
                    std::mem::take(&mut inner.waiters)
                };
                debug!("Mail API ready, releasing {} queued calls", waiters.len());
                for waiter in waiters {
                    // A waiter may have been dropped by its caller; skip it
                    let _ = waiter.send(());
                }
            }
            Err(e) => {
                // Authorized but the API surface is unreachable. Queued
                // calls stay queued; a later authorize retries the probe.
                warn!("Mail API load probe failed: {:#}", e);
                let mut inner = self.inner.lock().unwrap();
                inner.handshake_in_flight = false;
            }
        }
    }
}

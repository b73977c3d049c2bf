//! Lifecycle event publication
//!
//! Subscribers attach per event kind and receive events synchronously on
//! the task that produced them. The returned handle detaches its listener
//! when [`Subscription::remove`] is called; dropping the handle without
//! calling it leaves the listener attached for the life of the hub.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::tracker::CallId;

/// Events published by the orchestration layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiEvent {
    /// A tracked call started; carries its identifier
    Start(CallId),
    /// A tracked call settled; carries its identifier
    Stop(CallId),
    /// The last in-flight tracked call settled
    AllStopped,
    /// An authorization attempt finished, successfully or not
    Authorized(bool),
}

impl ApiEvent {
    /// The kind channel this event is delivered on
    pub fn kind(&self) -> EventKind {
        match self {
            ApiEvent::Start(_) => EventKind::Start,
            ApiEvent::Stop(_) => EventKind::Stop,
            ApiEvent::AllStopped => EventKind::AllStopped,
            ApiEvent::Authorized(_) => EventKind::Authorized,
        }
    }
}

/// Event kinds a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Stop,
    AllStopped,
    Authorized,
}

type Listener = Arc<dyn Fn(&ApiEvent) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    kind: EventKind,
    callback: Listener,
}

/// Registry of event listeners
pub struct EventHub {
    listeners: Mutex<Vec<ListenerEntry>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Attach a listener for one event kind
    pub fn subscribe(
        self: &Arc<Self>,
        kind: EventKind,
        callback: impl Fn(&ApiEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().push(ListenerEntry {
            id,
            kind,
            callback: Arc::new(callback),
        });
        Subscription {
            hub: Arc::downgrade(self),
            id,
        }
    }

    /// Deliver an event to every listener subscribed to its kind
    ///
    /// Listeners are snapshotted before invocation, so a callback may
    /// subscribe or remove listeners without deadlocking; such changes
    /// take effect from the next emit.
    pub fn emit(&self, event: ApiEvent) {
        let kind = event.kind();
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.lock().unwrap();
            listeners
                .iter()
                .filter(|entry| entry.kind == kind)
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };

        for callback in snapshot {
            callback(&event);
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners.lock().unwrap().retain(|entry| entry.id != id);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for detaching a listener
pub struct Subscription {
    hub: Weak<EventHub>,
    id: u64,
}

impl Subscription {
    /// Detach the listener this handle was returned for
    pub fn remove(self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_hub() -> (Arc<EventHub>, Arc<AtomicUsize>) {
        (Arc::new(EventHub::new()), Arc::new(AtomicUsize::new(0)))
    }

    #[test]
    fn test_listener_receives_matching_kind_only() {
        let (hub, count) = counting_hub();
        let c = Arc::clone(&count);
        let _sub = hub.subscribe(EventKind::Start, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        hub.emit(ApiEvent::Start(CallId::new("a")));
        hub.emit(ApiEvent::Stop(CallId::new("a")));
        hub.emit(ApiEvent::AllStopped);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_carries_payload() {
        let hub = Arc::new(EventHub::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = hub.subscribe(EventKind::Authorized, move |event| {
            if let ApiEvent::Authorized(ok) = event {
                s.lock().unwrap().push(*ok);
            }
        });

        hub.emit(ApiEvent::Authorized(true));
        hub.emit(ApiEvent::Authorized(false));

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_remove_detaches_listener() {
        let (hub, count) = counting_hub();
        let c = Arc::clone(&count);
        let sub = hub.subscribe(EventKind::AllStopped, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        hub.emit(ApiEvent::AllStopped);
        sub.remove();
        hub.emit(ApiEvent::AllStopped);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_handle_keeps_listener_attached() {
        let (hub, count) = counting_hub();
        let c = Arc::clone(&count);
        let sub = hub.subscribe(EventKind::AllStopped, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        drop(sub);

        hub.emit(ApiEvent::AllStopped);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_affects_only_its_own_listener() {
        let (hub, count) = counting_hub();
        let c1 = Arc::clone(&count);
        let sub1 = hub.subscribe(EventKind::Stop, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&count);
        let _sub2 = hub.subscribe(EventKind::Stop, move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        sub1.remove();
        hub.emit(ApiEvent::Stop(CallId::new("a")));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_from_within_callback() {
        let (hub, count) = counting_hub();
        let hub_inner = Arc::clone(&hub);
        let c = Arc::clone(&count);
        let _sub = hub.subscribe(EventKind::AllStopped, move |_| {
            let c2 = Arc::clone(&c);
            // New listener attaches without deadlock and sees later emits only
            let _nested = hub_inner.subscribe(EventKind::AllStopped, move |_| {
                c2.fetch_add(1, Ordering::SeqCst);
            });
        });

        hub.emit(ApiEvent::AllStopped);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        hub.emit(ApiEvent::AllStopped);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

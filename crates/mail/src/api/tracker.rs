//! In-flight call bookkeeping
//!
//! Every tracked operation holds a [`CallGuard`] for its full duration.
//! Acquiring the guard assigns a fresh call identifier, records it in the
//! active set and emits `start`; dropping it removes the identifier and
//! emits `stop`, plus `all_stopped` when it was the last one in flight.
//! Drop runs on success, error and panic paths alike, so the active set
//! can never leak an identifier.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::events::{ApiEvent, EventHub};

/// Opaque identifier for one tracked call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for allocating call identifiers
///
/// Abstracted so tests can substitute a deterministic sequence.
pub trait CallIdSource: Send + Sync {
    fn next_id(&self) -> CallId;
}

/// Default identifier source backed by random UUIDs
pub struct UuidIds;

impl CallIdSource for UuidIds {
    fn next_id(&self) -> CallId {
        CallId::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Tracks which calls are currently in flight
///
/// Cheap to clone; clones share the same active set and event hub.
#[derive(Clone)]
pub struct CallTracker {
    active: Arc<Mutex<HashSet<CallId>>>,
    events: Arc<EventHub>,
    ids: Arc<dyn CallIdSource>,
}

impl CallTracker {
    pub fn new(events: Arc<EventHub>) -> Self {
        Self::with_id_source(events, Arc::new(UuidIds))
    }

    pub fn with_id_source(events: Arc<EventHub>, ids: Arc<dyn CallIdSource>) -> Self {
        Self {
            active: Arc::new(Mutex::new(HashSet::new())),
            events,
            ids,
        }
    }

    /// Start tracking a call
    ///
    /// The `start` event fires synchronously, before the caller does any
    /// other work.
    pub fn begin(&self) -> CallGuard {
        let id = self.ids.next_id();
        self.active.lock().unwrap().insert(id.clone());
        self.events.emit(ApiEvent::Start(id.clone()));
        CallGuard {
            tracker: self.clone(),
            id,
        }
    }

    /// Whether any tracked call is currently in flight
    pub fn is_in_progress(&self) -> bool {
        !self.active.lock().unwrap().is_empty()
    }

    /// Number of calls currently in flight
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    fn finish(&self, id: &CallId) {
        // The 1 -> 0 transition is decided while the lock is held; the
        // events fire after it is released so listeners can call back in.
        let became_idle = {
            let mut active = self.active.lock().unwrap();
            let removed = active.remove(id);
            removed && active.is_empty()
        };
        self.events.emit(ApiEvent::Stop(id.clone()));
        if became_idle {
            self.events.emit(ApiEvent::AllStopped);
        }
    }
}

/// Guard representing one in-flight call
pub struct CallGuard {
    tracker: CallTracker,
    id: CallId,
}

impl CallGuard {
    /// The identifier assigned to this call
    pub fn id(&self) -> &CallId {
        &self.id
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.tracker.finish(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::events::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic id source for asserting on identifiers
    struct SeqIds(AtomicUsize);

    impl SeqIds {
        fn new() -> Arc<Self> {
            Arc::new(Self(AtomicUsize::new(0)))
        }
    }

    impl CallIdSource for SeqIds {
        fn next_id(&self) -> CallId {
            CallId::new(format!("call-{}", self.0.fetch_add(1, Ordering::SeqCst)))
        }
    }

    fn recording_tracker() -> (CallTracker, Arc<Mutex<Vec<ApiEvent>>>) {
        let hub = Arc::new(EventHub::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Start, EventKind::Stop, EventKind::AllStopped] {
            let s = Arc::clone(&seen);
            let _sub = hub.subscribe(kind, move |event| {
                s.lock().unwrap().push(event.clone());
            });
        }
        (CallTracker::with_id_source(hub, SeqIds::new()), seen)
    }

    #[test]
    fn test_begin_emits_start_with_id() {
        let (tracker, seen) = recording_tracker();

        let guard = tracker.begin();
        assert_eq!(guard.id().as_str(), "call-0");
        assert!(tracker.is_in_progress());

        let events = seen.lock().unwrap();
        assert_eq!(events.as_slice(), &[ApiEvent::Start(CallId::new("call-0"))]);
    }

    #[test]
    fn test_drop_emits_stop_then_all_stopped() {
        let (tracker, seen) = recording_tracker();

        let guard = tracker.begin();
        drop(guard);

        assert!(!tracker.is_in_progress());
        let events = seen.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[
                ApiEvent::Start(CallId::new("call-0")),
                ApiEvent::Stop(CallId::new("call-0")),
                ApiEvent::AllStopped,
            ]
        );
    }

    #[test]
    fn test_all_stopped_only_on_last_settle() {
        let (tracker, seen) = recording_tracker();

        let first = tracker.begin();
        let second = tracker.begin();
        assert_eq!(tracker.active_count(), 2);

        drop(first);
        assert!(tracker.is_in_progress());
        {
            let events = seen.lock().unwrap();
            assert!(!events.contains(&ApiEvent::AllStopped));
        }

        drop(second);
        assert!(!tracker.is_in_progress());
        let events = seen.lock().unwrap();
        let all_stopped = events.iter().filter(|e| **e == ApiEvent::AllStopped).count();
        assert_eq!(all_stopped, 1);
    }

    #[test]
    fn test_concurrent_calls_get_distinct_ids() {
        let (tracker, _seen) = recording_tracker();

        let first = tracker.begin();
        let second = tracker.begin();

        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_guard_settles_on_panic() {
        let (tracker, seen) = recording_tracker();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = tracker.begin();
            panic!("operation blew up");
        }));
        assert!(result.is_err());

        assert!(!tracker.is_in_progress());
        let events = seen.lock().unwrap();
        assert!(events.contains(&ApiEvent::Stop(CallId::new("call-0"))));
        assert!(events.contains(&ApiEvent::AllStopped));
    }

    #[test]
    fn test_uuid_ids_are_unique() {
        let ids = UuidIds;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}

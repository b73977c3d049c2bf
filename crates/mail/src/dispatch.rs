//! Dispatch bus for pushing translated entities to the application store
//!
//! Thread listings resolve with summaries only; the full messages flow to
//! the store through this side channel so the UI layer can index them
//! before the listing result is consumed.

use crate::models::Message;

/// Actions delivered to the application store
#[derive(Debug, Clone)]
pub enum Action {
    /// A batch of translated messages arrived from a thread listing
    AddMessages(Vec<Message>),
}

/// Trait for the application-side action bus
///
/// Dispatch is fire-and-forget: implementations must not block and have no
/// way to report failure back to the caller.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, action: Action);
}

/// Dispatcher that drops every action, for embedders without a store
pub struct NullDispatcher;

impl Dispatcher for NullDispatcher {
    fn dispatch(&self, _action: Action) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingDispatcher {
        actions: Mutex<Vec<Action>>,
    }

    impl Dispatcher for RecordingDispatcher {
        fn dispatch(&self, action: Action) {
            self.actions.lock().unwrap().push(action);
        }
    }

    #[test]
    fn test_dispatch_records_action() {
        let bus = RecordingDispatcher {
            actions: Mutex::new(Vec::new()),
        };

        bus.dispatch(Action::AddMessages(Vec::new()));

        let actions = bus.actions.lock().unwrap();
        assert_eq!(actions.len(), 1);
        let Action::AddMessages(messages) = &actions[0];
        assert!(messages.is_empty());
    }

    #[test]
    fn test_null_dispatcher_accepts_actions() {
        NullDispatcher.dispatch(Action::AddMessages(Vec::new()));
    }
}

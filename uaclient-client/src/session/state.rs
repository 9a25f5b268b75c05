use log::debug;

/// The connection phase a client is in. Transitions move forward through
/// these values during `connect`, teardown steps strictly backward.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientState {
    /// No connection at all.
    Disconnected = 0,
    /// TCP is open and HELLO/ACKNOWLEDGE has completed.
    Connected = 1,
    /// A secure channel token has been issued.
    SecureChannel = 2,
    /// A session has been created and activated.
    Session = 3,
    /// An existing session was re-activated on a fresh secure channel.
    /// Subscription continuity is NOT recovered: publishes missed while
    /// the channel was down are lost.
    SessionRenewed = 4,
    /// A session exists on the server but its secure channel is gone.
    SessionDisconnected = 5,
}

/// Observer invoked on every state change, with the old and new state.
pub type StateCallback = Box<dyn FnMut(ClientState, ClientState) + Send>;

/// Holds the current connection phase and notifies an optional observer on
/// change. Setting the current value again is a no-op. The callback must
/// not itself mutate the state.
pub(crate) struct StateRegister {
    state: ClientState,
    callback: Option<StateCallback>,
}

impl StateRegister {
    pub(crate) fn new() -> StateRegister {
        StateRegister {
            state: ClientState::Disconnected,
            callback: None,
        }
    }

    /// The current state.
    pub(crate) fn state(&self) -> ClientState {
        self.state
    }

    /// Install or replace the observer.
    pub(crate) fn set_callback(&mut self, callback: Option<StateCallback>) {
        self.callback = callback;
    }

    /// Update the state, invoking the observer before returning. A write
    /// of the current value does nothing.
    pub(crate) fn set(&mut self, state: ClientState) {
        if self.state == state {
            return;
        }
        let previous = self.state;
        self.state = state;
        debug!("Client state {previous:?} -> {state:?}");
        if let Some(callback) = self.callback.as_mut() {
            callback(previous, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn state_ordering_follows_the_connect_sequence() {
        assert!(ClientState::Disconnected < ClientState::Connected);
        assert!(ClientState::Connected < ClientState::SecureChannel);
        assert!(ClientState::SecureChannel < ClientState::Session);
        assert!(ClientState::Session < ClientState::SessionRenewed);
        assert!(ClientState::SessionRenewed >= ClientState::Session);
    }

    #[test]
    fn callback_fires_on_change_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let mut register = StateRegister::new();
        register.set_callback(Some(Box::new(move |old, new| {
            assert_ne!(old, new);
            calls_clone.fetch_add(1, Ordering::Relaxed);
        })));

        register.set(ClientState::Connected);
        // Same value again is a no-op.
        register.set(ClientState::Connected);
        register.set(ClientState::SecureChannel);

        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(register.state(), ClientState::SecureChannel);
    }
}

//! Connection state machine.
//!
//! Tracks the single underlying connection's lifecycle and notifies
//! listeners of every transition. Channel reactions to connection-level
//! transitions (suspension, close, failure) are orchestrated by the client,
//! which owns both sides.

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ErrorInfo;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Initialized,
    Connecting,
    Connected,
    Disconnected,
    Suspended,
    Closing,
    Closed,
    Failed,
}

impl ConnectionState {
    /// States in which channel attach/detach requests are rejected
    /// synchronously rather than queued.
    pub fn rejects_channel_operations(self) -> bool {
        matches!(
            self,
            ConnectionState::Closing
                | ConnectionState::Closed
                | ConnectionState::Suspended
                | ConnectionState::Failed
        )
    }
}

/// Events driving the connection state machine: explicit API calls and
/// transport-level signals.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// `connect()` was called (also used for explicit reconnects).
    Connect,
    /// The server confirmed the connection.
    Connected { connection_id: String },
    /// The transport dropped; the connection is retryable.
    Disconnected,
    /// The transport's retry policy gave up for now.
    Suspended,
    /// `close()` was called.
    Close,
    /// The server confirmed the close, or the socket closed while closing.
    Closed,
    /// Fatal error at connection scope.
    Failed(ErrorInfo),
}

/// Transition function for the connection state machine. Returns the next
/// state, or `None` when the event does not apply in the current state.
pub fn transition(state: ConnectionState, event: &ConnectionEvent) -> Option<ConnectionState> {
    use ConnectionEvent as E;
    use ConnectionState as S;

    match (state, event) {
        // connect() is the only way out of the terminal-ish states.
        (S::Initialized | S::Disconnected | S::Suspended | S::Closed | S::Failed, E::Connect) => {
            Some(S::Connecting)
        }
        (S::Connecting, E::Connected { .. }) => Some(S::Connected),
        // A Connected while already connected is a resume, not a transition.
        (S::Connected, E::Connected { .. }) => None,
        (S::Connecting | S::Connected, E::Disconnected) => Some(S::Disconnected),
        (S::Connecting | S::Connected | S::Disconnected, E::Suspended) => Some(S::Suspended),
        (S::Closing, E::Closed | E::Disconnected) => Some(S::Closed),
        (_, E::Close) => match state {
            S::Closing | S::Closed | S::Failed => None,
            _ => Some(S::Closing),
        },
        (S::Failed, _) => None,
        (_, E::Failed(_)) => Some(S::Failed),
        _ => None,
    }
}

/// A single observed transition.
#[derive(Debug, Clone)]
pub struct ConnectionStateChange {
    pub previous: ConnectionState,
    pub current: ConnectionState,
    pub reason: Option<ErrorInfo>,
}

/// Connection bookkeeping: current state, server-assigned id, and the
/// state-change listener list.
pub struct Connection {
    state: ConnectionState,
    connection_id: Option<String>,
    error: Option<ErrorInfo>,
    listeners: Vec<mpsc::UnboundedSender<ConnectionStateChange>>,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Initialized,
            connection_id: None,
            error: None,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Register a state-change listener. Every subsequent transition is
    /// delivered exactly once, in order.
    pub fn on_state_change(&mut self) -> mpsc::UnboundedReceiver<ConnectionStateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    /// Apply an event. Returns the resulting state change, if the event
    /// caused one; listeners have already been notified.
    pub fn apply(&mut self, event: ConnectionEvent) -> Option<ConnectionStateChange> {
        let next = transition(self.state, &event)?;
        let previous = self.state;
        self.state = next;

        let reason = match &event {
            ConnectionEvent::Failed(e) => {
                self.error = Some(e.clone());
                Some(e.clone())
            }
            ConnectionEvent::Connected { connection_id } => {
                self.connection_id = Some(connection_id.clone());
                None
            }
            ConnectionEvent::Suspended | ConnectionEvent::Disconnected => {
                Some(ErrorInfo::connection_lost("connection unavailable"))
            }
            _ => None,
        };

        debug!(?previous, current = ?next, "connection state change");

        let change = ConnectionStateChange {
            previous,
            current: next,
            reason,
        };
        self.listeners.retain(|tx| tx.send(change.clone()).is_ok());
        Some(change)
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

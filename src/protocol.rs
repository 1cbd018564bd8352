//! Protocol message types.
//!
//! [`ProtocolMessage`] is the unit of wire communication for both control
//! traffic (attach/detach/error, connection handshakes, acknowledgements)
//! and data traffic (messages and presence). These are plain records: all
//! behavior lives in the state machines that consume them.

use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;

/// Bit flags carried on `Attached` protocol messages.
pub mod flags {
    /// The server holds presence members for this channel; a presence sync
    /// will follow the attach confirmation.
    pub const HAS_PRESENCE: u32 = 1;
}

/// Wire-level action vocabulary. Variant names are serialized verbatim,
/// so they must not be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Heartbeat,
    Ack,
    Nack,
    Connect,
    Connected,
    Disconnect,
    Disconnected,
    Close,
    Closed,
    Error,
    Attach,
    Attached,
    Detach,
    Detached,
    Presence,
    Message,
    Sync,
}

/// A single application message embedded in a `Message` protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Optional event name, matched against per-name subscriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Arbitrary payload. Payload encoding is the caller's concern.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Client the message is attributed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Server-assigned unique id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Milliseconds since the Unix epoch, server-assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl Message {
    pub fn new(name: Option<String>, data: serde_json::Value) -> Self {
        Self {
            name,
            data: Some(data),
            client_id: None,
            id: None,
            timestamp: None,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// Presence lifecycle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresenceAction {
    Enter,
    Update,
    Present,
    Leave,
}

/// A presence record for one member of a channel.
///
/// Members are keyed by `(client_id, member_id)`; one client may hold
/// several members (one per connection). `serial` is the server-assigned
/// ordering metadata used by the idempotent merge rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceMessage {
    pub action: PresenceAction,
    pub client_id: String,
    /// Connection-scoped member identifier.
    pub member_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Connection the record originated from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// Ordering serial; a record supersedes a stored one only if its serial
    /// is strictly greater.
    #[serde(default)]
    pub serial: u64,
}

impl PresenceMessage {
    pub fn new(action: PresenceAction, client_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            action,
            client_id: client_id.into(),
            member_id: member_id.into(),
            data: None,
            connection_id: None,
            serial: 0,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_serial(mut self, serial: u64) -> Self {
        self.serial = serial;
        self
    }

    /// Map key for this member.
    pub fn member_key(&self) -> (String, String) {
        (self.client_id.clone(), self.member_id.clone())
    }
}

/// The unit of wire communication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub action: Action,
    /// Channel the message is scoped to; absent for connection-scoped traffic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Sync pagination cursor (`<sync id>:<cursor>`) on `Sync` messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_serial: Option<String>,
    /// Connection id, carried on `Connected`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// Correlation serial for publishes and their acknowledgements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_serial: Option<u64>,
    /// Number of serials acknowledged by an `Ack`/`Nack`, starting at
    /// `msg_serial`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Bit flags; see [`flags`].
    #[serde(default, skip_serializing_if = "is_zero")]
    pub flags: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presence: Vec<PresenceMessage>,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl ProtocolMessage {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            channel: None,
            channel_serial: None,
            connection_id: None,
            msg_serial: None,
            count: None,
            flags: 0,
            error: None,
            messages: Vec::new(),
            presence: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Outbound attach request for a channel.
    pub fn attach(channel: impl Into<String>) -> Self {
        Self::new(Action::Attach).with_channel(channel)
    }

    /// Outbound detach request for a channel.
    pub fn detach(channel: impl Into<String>) -> Self {
        Self::new(Action::Detach).with_channel(channel)
    }

    /// Attach confirmation, as sent by the server.
    pub fn attached(channel: impl Into<String>, flags: u32) -> Self {
        let mut msg = Self::new(Action::Attached).with_channel(channel);
        msg.flags = flags;
        msg
    }

    /// Detach confirmation, as sent by the server.
    pub fn detached(channel: impl Into<String>) -> Self {
        Self::new(Action::Detached).with_channel(channel)
    }

    /// Positive acknowledgement for `count` serials starting at `serial`.
    pub fn ack(channel: impl Into<String>, serial: u64, count: u32) -> Self {
        let mut msg = Self::new(Action::Ack).with_channel(channel);
        msg.msg_serial = Some(serial);
        msg.count = Some(count);
        msg
    }

    /// Negative acknowledgement for `count` serials starting at `serial`.
    pub fn nack(channel: impl Into<String>, serial: u64, count: u32, error: ErrorInfo) -> Self {
        let mut msg = Self::new(Action::Nack).with_channel(channel);
        msg.msg_serial = Some(serial);
        msg.count = Some(count);
        msg.error = Some(error);
        msg
    }

    /// Error message, optionally scoped to a channel.
    pub fn error(channel: Option<String>, error: ErrorInfo) -> Self {
        let mut msg = Self::new(Action::Error);
        msg.channel = channel;
        msg.error = Some(error);
        msg
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Whether this message is scoped to a single channel.
    pub fn is_channel_scoped(&self) -> bool {
        self.channel.is_some()
    }
}

//! Wavelink: a realtime pub/sub client.
//!
//! The client multiplexes named channels over a single connection to a
//! message broker. Each channel carries its own attach/detach lifecycle,
//! ordered publish acknowledgements, and a presence member map kept
//! convergent under out-of-order delivery.
//!
//! The transport is pluggable: anything implementing [`transport::Transport`]
//! can carry protocol messages, and inbound traffic is fed to the client
//! through [`client::Realtime::dispatch`].

pub mod auth;
pub mod channel;
pub mod client;
pub mod connection;
pub mod error;
pub mod presence;
pub mod protocol;
pub mod queue;
pub mod transport;

pub use auth::{Capability, Operation};
pub use channel::{Channel, ChannelState, ChannelStateChange, Presence};
pub use client::{Realtime, RealtimeConfig};
pub use connection::{ConnectionState, ConnectionStateChange};
pub use error::{ErrorInfo, WavelinkError};
pub use protocol::{Action, Message, PresenceAction, PresenceMessage, ProtocolMessage};
pub use transport::{ChannelTransport, Transport, TransportEvent};

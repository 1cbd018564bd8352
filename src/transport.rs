//! Transport collaborator seam.
//!
//! The client does not own a socket. Outbound traffic goes through the
//! [`Transport`] trait; inbound traffic and connection-level signals arrive
//! as [`TransportEvent`]s fed to [`crate::client::Realtime::dispatch`].
//! [`ChannelTransport`] is an mpsc-backed implementation for embedders that
//! drive their own socket, and for tests.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ErrorInfo;
use crate::protocol::ProtocolMessage;

/// Inbound signals from the transport layer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The underlying socket opened.
    Opened,
    /// A protocol message arrived.
    Message(ProtocolMessage),
    /// The socket closed; the connection may be retried by the owner.
    Closed,
    /// The transport's reconnection policy gave up for now.
    Suspended,
    /// The transport failed fatally.
    Failed(ErrorInfo),
}

/// Outbound side of the transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one protocol message. An error means the message was not
    /// handed to the wire.
    async fn send(&self, msg: ProtocolMessage) -> Result<(), ErrorInfo>;
}

/// A [`Transport`] that forwards outbound messages into an unbounded
/// channel. The receiving half belongs to whoever owns the socket.
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<ProtocolMessage>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its outbound messages land on.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<ProtocolMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { outbound: tx }, rx)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, msg: ProtocolMessage) -> Result<(), ErrorInfo> {
        debug!(action = ?msg.action, channel = ?msg.channel, "sending protocol message");
        self.outbound
            .send(msg)
            .map_err(|_| ErrorInfo::connection_lost("transport closed"))
    }
}

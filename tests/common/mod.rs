//! Shared harness: a client wired to an in-memory transport, with helpers
//! to drive the connection and channel handshakes from the server side.
#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use tokio::sync::mpsc;
use wavelink::{
    Action, Channel, ChannelTransport, ErrorInfo, ProtocolMessage, Realtime, RealtimeConfig,
    TransportEvent,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("wavelink=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A client plus the receiving end of everything it sends.
pub struct Rig {
    pub client: Realtime,
    pub outbound: mpsc::UnboundedReceiver<ProtocolMessage>,
}

impl Rig {
    pub fn new(config: RealtimeConfig) -> Self {
        init_tracing();
        let (transport, outbound) = ChannelTransport::pair();
        Self {
            client: Realtime::new(Arc::new(transport), config),
            outbound,
        }
    }

    /// Feed one protocol message to the client as if it arrived on the wire.
    pub async fn receive(&self, msg: ProtocolMessage) {
        self.client.dispatch(TransportEvent::Message(msg)).await;
    }

    /// The next message the client sent, or a panic if none arrives in time.
    pub async fn sent(&mut self) -> ProtocolMessage {
        tokio::time::timeout(TIMEOUT, self.outbound.recv())
            .await
            .expect("timed out waiting for an outbound message")
            .expect("transport closed")
    }

    /// Assert that the client has sent nothing (so far).
    pub fn assert_nothing_sent(&mut self) {
        assert!(
            self.outbound.try_recv().is_err(),
            "expected no outbound messages"
        );
    }

    /// Connect and confirm from the server side.
    pub async fn connect(&mut self) {
        self.client.connect().await.unwrap();
        let sent = self.sent().await;
        assert_eq!(sent.action, Action::Connect);
        self.receive(ProtocolMessage {
            connection_id: Some("conn-1".into()),
            ..ProtocolMessage::new(Action::Connected)
        })
        .await;
    }

    /// Attach a channel and confirm with the given flags, consuming the
    /// outbound Attach frame.
    pub async fn attach(&mut self, name: &str, flags: u32) -> Channel {
        let channel = self.client.channel(name).await;
        channel.attach().await.unwrap();
        let sent = self.sent().await;
        assert_eq!(sent.action, Action::Attach);
        assert_eq!(sent.channel.as_deref(), Some(name));
        self.receive(ProtocolMessage::attached(name, flags)).await;
        channel
    }
}

/// A publish completion wired to a channel, so tests can observe ordering.
pub fn completion_probe() -> (
    Box<dyn FnOnce(Result<(), ErrorInfo>) + Send>,
    mpsc::UnboundedReceiver<Result<(), ErrorInfo>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }),
        rx,
    )
}

/// A set of completions reporting into one stream as `(tag, outcome)`, for
/// asserting cross-publish completion order.
pub fn tagged_completions(
    tags: &[&'static str],
) -> (
    Vec<Box<dyn FnOnce(Result<(), ErrorInfo>) + Send>>,
    mpsc::UnboundedReceiver<(&'static str, Result<(), ErrorInfo>)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let completions = tags
        .iter()
        .map(|&tag| {
            let tx = tx.clone();
            Box::new(move |outcome| {
                let _ = tx.send((tag, outcome));
            }) as Box<dyn FnOnce(Result<(), ErrorInfo>) + Send>
        })
        .collect();
    (completions, rx)
}

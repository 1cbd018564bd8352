//! The realtime client: connection ownership, the channel registry, and the
//! single dispatch path every inbound transport event flows through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Capability;
use crate::channel::Channel;
use crate::connection::{Connection, ConnectionEvent, ConnectionState, ConnectionStateChange};
use crate::error::{ErrorInfo, WavelinkError};
use crate::protocol::{Action, ProtocolMessage};
use crate::transport::{Transport, TransportEvent};

/// Client configuration, fixed for the lifetime of the client.
#[derive(Clone)]
pub struct RealtimeConfig {
    /// Identity attached to presence entries and outbound messages.
    pub client_id: Option<String>,
    /// Per-channel operation grants checked before anything leaves the
    /// client.
    pub capability: Capability,
    /// How long an attach may remain unconfirmed before the channel fails.
    pub attach_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            capability: Capability::allow_all(),
            attach_timeout: Duration::from_secs(10),
        }
    }
}

/// State shared between the client and every channel it owns.
pub(crate) struct Shared {
    pub transport: Arc<dyn Transport>,
    pub config: RealtimeConfig,
    pub connection: Mutex<Connection>,
    /// Next outbound message serial. Serials are global to the connection
    /// and strictly increasing.
    msg_serial: AtomicU64,
    /// Local fallback identity, used as the presence member id until the
    /// server assigns a connection id.
    local_id: String,
}

impl Shared {
    pub fn next_serial(&self) -> u64 {
        self.msg_serial.fetch_add(1, Ordering::SeqCst)
    }

    /// The member id stamped on outbound presence records.
    pub async fn member_id(&self) -> String {
        let connection = self.connection.lock().await;
        connection
            .connection_id()
            .map(str::to_owned)
            .unwrap_or_else(|| self.local_id.clone())
    }
}

/// A realtime pub/sub client multiplexing channels over one connection.
pub struct Realtime {
    shared: Arc<Shared>,
    channels: RwLock<HashMap<String, Channel>>,
}

impl Realtime {
    pub fn new(transport: Arc<dyn Transport>, config: RealtimeConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                connection: Mutex::new(Connection::new()),
                msg_serial: AtomicU64::new(0),
                local_id: Uuid::new_v4().to_string(),
            }),
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.shared.config.client_id.as_deref()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.shared.connection.lock().await.state()
    }

    pub async fn connection_id(&self) -> Option<String> {
        self.shared
            .connection
            .lock()
            .await
            .connection_id()
            .map(str::to_owned)
    }

    /// Register a connection state listener.
    pub async fn on_connection_state_change(
        &self,
    ) -> mpsc::UnboundedReceiver<ConnectionStateChange> {
        self.shared.connection.lock().await.on_state_change()
    }

    /// Look up or create the channel with the given name. All callers using
    /// the same name share one channel.
    pub async fn channel(&self, name: &str) -> Channel {
        {
            let channels = self.channels.read().await;
            if let Some(channel) = channels.get(name) {
                return channel.clone();
            }
        }
        let mut channels = self.channels.write().await;
        // Re-check under the write lock in case another task created it.
        channels
            .entry(name.to_owned())
            .or_insert_with(|| Channel::new(name, Arc::clone(&self.shared)))
            .clone()
    }

    /// Begin connecting. The connection becomes Connected only once the
    /// server's confirmation arrives through [`dispatch`](Self::dispatch).
    pub async fn connect(&self) -> Result<(), WavelinkError> {
        let changed = self
            .apply_connection_event(ConnectionEvent::Connect)
            .await
            .is_some();
        if changed {
            self.shared
                .transport
                .send(ProtocolMessage::new(Action::Connect))
                .await
                .map_err(WavelinkError::ConnectionLost)?;
        }
        Ok(())
    }

    /// Begin a graceful close. Attached channels detach and pending
    /// publishes fail; the connection settles in Closed once the server
    /// confirms or the socket drops.
    pub async fn close(&self) {
        let changed = self
            .apply_connection_event(ConnectionEvent::Close)
            .await
            .is_some();
        if changed {
            if let Err(err) = self
                .shared
                .transport
                .send(ProtocolMessage::new(Action::Close))
                .await
            {
                debug!(%err, "transport already gone during close");
                self.apply_connection_event(ConnectionEvent::Closed).await;
            }
        }
    }

    /// Drive the client from a transport event stream. Returns when the
    /// stream ends.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        debug!("transport event stream ended");
    }

    /// Apply one inbound transport event. This is the only path by which
    /// inbound traffic mutates client state, and events are fully applied
    /// in arrival order.
    pub async fn dispatch(&self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                debug!("transport opened, awaiting connection confirmation");
            }
            TransportEvent::Message(msg) => self.dispatch_message(msg).await,
            TransportEvent::Closed => {
                self.apply_connection_event(ConnectionEvent::Disconnected)
                    .await;
            }
            TransportEvent::Suspended => {
                self.apply_connection_event(ConnectionEvent::Suspended).await;
            }
            TransportEvent::Failed(err) => {
                self.apply_connection_event(ConnectionEvent::Failed(err))
                    .await;
            }
        }
    }

    async fn dispatch_message(&self, msg: ProtocolMessage) {
        if msg.is_channel_scoped() {
            return self.route_to_channel(msg).await;
        }
        match msg.action {
            Action::Heartbeat => debug!("heartbeat"),
            Action::Connected => {
                let connection_id = msg.connection_id.unwrap_or_default();
                info!(%connection_id, "connected");
                self.apply_connection_event(ConnectionEvent::Connected { connection_id })
                    .await;
            }
            Action::Disconnected => {
                self.apply_connection_event(ConnectionEvent::Disconnected)
                    .await;
            }
            Action::Closed => {
                self.apply_connection_event(ConnectionEvent::Closed).await;
            }
            Action::Error => {
                let err = msg
                    .error
                    .unwrap_or_else(|| ErrorInfo::protocol("unspecified connection error"));
                self.apply_connection_event(ConnectionEvent::Failed(err))
                    .await;
            }
            other => {
                warn!(action = ?other, "unroutable protocol message without a channel");
            }
        }
    }

    async fn route_to_channel(&self, msg: ProtocolMessage) {
        let name = msg.channel.clone().unwrap_or_default();
        let channel = {
            let channels = self.channels.read().await;
            channels.get(&name).cloned()
        };
        match channel {
            Some(channel) => channel.handle_protocol_message(msg).await,
            None => {
                warn!(channel = %name, action = ?msg.action,
                      "protocol message for unknown channel");
            }
        }
    }

    /// Apply a connection event, then fan the resulting state change out to
    /// every channel. The connection lock is released before channels are
    /// touched.
    async fn apply_connection_event(
        &self,
        event: ConnectionEvent,
    ) -> Option<ConnectionStateChange> {
        let change = {
            let mut connection = self.shared.connection.lock().await;
            connection.apply(event)?
        };
        let channels: Vec<Channel> = {
            let channels = self.channels.read().await;
            channels.values().cloned().collect()
        };
        for channel in channels {
            channel.handle_connection_change(&change).await;
        }
        Some(change)
    }
}

//! Per-channel state machine, message dispatch, and presence operations.
//!
//! A [`Channel`] is a named pub/sub topic scoped to one connection. Its
//! lifecycle is driven by protocol messages and connection-level events
//! through a pure [`transition`] function; the handle executes the emitted
//! effects (sends, queue flushes, presence sync) around it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::auth::Operation;
use crate::client::Shared;
use crate::connection::{ConnectionState, ConnectionStateChange};
use crate::error::{ErrorInfo, WavelinkError};
use crate::presence::{PresenceMap, PresenceOutcome};
use crate::protocol::{flags, Action, Message, PresenceAction, PresenceMessage, ProtocolMessage};
use crate::queue::{AckQueue, Completion, QueuedMessage};

/// Channel lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Initialized,
    Attaching,
    Attached,
    Detaching,
    Detached,
    /// Part of the protocol's lifecycle vocabulary, re-enterable via
    /// [`Channel::attach`] like `Failed`. No transition in this crate
    /// currently produces it: connection suspension detaches the channel
    /// instead of suspending it.
    Suspended,
    Failed,
}

/// Events driving the channel state machine.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// `attach()` was accepted.
    Attach,
    /// The server confirmed the attach.
    Attached { flags: u32 },
    /// No Attached confirmation arrived within the attach timeout.
    AttachTimedOut,
    /// `detach()` was accepted.
    Detach,
    /// The server confirmed (or initiated) a detach.
    Detached,
    /// An Error protocol message scoped to this channel.
    Error(ErrorInfo),
    /// The connection entered Suspended.
    ConnectionSuspended,
    /// The connection entered Closing or Closed.
    ConnectionClosing,
    /// The connection failed fatally.
    ConnectionFailed(ErrorInfo),
}

/// Effects emitted by a transition, executed by the channel handle.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEffect {
    /// Send an Attach protocol message (once the connection permits).
    SendAttach,
    /// Send a Detach protocol message.
    SendDetach,
    /// Arm the attach timeout.
    StartAttachTimer,
    /// Flush messages queued while not attached, in submission order.
    FlushQueued,
    /// Fail all in-flight and queued publishes with the given error.
    FailPending(ErrorInfo),
    /// Start or settle the presence sync, depending on the attach flags.
    SyncPresence { has_presence: bool },
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: ChannelState,
    /// Error recorded on the channel and surfaced to state listeners.
    pub reason: Option<ErrorInfo>,
    pub effects: Vec<ChannelEffect>,
}

/// Transition function for the channel state machine. Returns `None` when
/// the event does not apply in the current state (the event is ignored).
pub fn transition(state: ChannelState, event: &ChannelEvent) -> Option<Transition> {
    use ChannelEvent as E;
    use ChannelState as S;

    let t = |next, reason, effects| Some(Transition { next, reason, effects });

    match (state, event) {
        (S::Initialized | S::Detached | S::Suspended | S::Failed, E::Attach) => t(
            S::Attaching,
            None,
            vec![ChannelEffect::SendAttach, ChannelEffect::StartAttachTimer],
        ),
        (S::Attaching, E::Attached { flags: f }) => t(
            S::Attached,
            None,
            vec![
                ChannelEffect::SyncPresence {
                    has_presence: f & flags::HAS_PRESENCE != 0,
                },
                ChannelEffect::FlushQueued,
            ],
        ),
        (S::Attaching, E::AttachTimedOut) => {
            let err = ErrorInfo::attach_timeout("no Attached confirmation within attach timeout");
            t(
                S::Failed,
                Some(err.clone()),
                vec![ChannelEffect::FailPending(err)],
            )
        }
        (S::Attaching | S::Attached, E::Detach) => {
            t(S::Detaching, None, vec![ChannelEffect::SendDetach])
        }
        (S::Attached | S::Detaching, E::Detached) => t(S::Detached, None, vec![]),
        (S::Failed, E::Error(_)) => None,
        (_, E::Error(err)) => t(
            S::Failed,
            Some(err.clone()),
            vec![ChannelEffect::FailPending(err.clone())],
        ),
        (S::Attaching | S::Attached | S::Detaching, E::ConnectionSuspended) => {
            // Dropped, not failed: the channel is eligible for re-attach.
            let err = ErrorInfo::connection_lost("connection suspended");
            t(S::Detached, None, vec![ChannelEffect::FailPending(err)])
        }
        (S::Attaching | S::Attached | S::Detaching, E::ConnectionClosing) => {
            let err = ErrorInfo::connection_lost("connection closed");
            t(S::Detached, None, vec![ChannelEffect::FailPending(err)])
        }
        (S::Failed, E::ConnectionFailed(_)) => None,
        (_, E::ConnectionFailed(err)) => t(
            S::Failed,
            Some(err.clone()),
            vec![ChannelEffect::FailPending(err.clone())],
        ),
        _ => None,
    }
}

/// A single observed channel transition.
#[derive(Debug, Clone)]
pub struct ChannelStateChange {
    pub previous: ChannelState,
    pub current: ChannelState,
    pub reason: Option<ErrorInfo>,
}

struct Subscriber {
    filter: Option<String>,
    tx: mpsc::UnboundedSender<Message>,
}

struct ChannelInner {
    state: ChannelState,
    error: Option<ErrorInfo>,
    presence: PresenceMap,
    acks: AckQueue,
    queued: Vec<QueuedMessage>,
    subscribers: Vec<Subscriber>,
    presence_subscribers: Vec<mpsc::UnboundedSender<PresenceMessage>>,
    state_listeners: Vec<mpsc::UnboundedSender<ChannelStateChange>>,
    /// Bumped on every entry into Attaching, so a stale timeout timer from
    /// an earlier attach attempt cannot fire against a later one.
    attach_epoch: u64,
}

struct ChannelCtx {
    name: String,
    shared: Arc<Shared>,
    inner: Mutex<ChannelInner>,
}

/// Handle to one channel. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Channel {
    ctx: Arc<ChannelCtx>,
}

/// Completions to run once the channel lock has been released.
type DeferredCompletions = Vec<(Completion, Result<(), ErrorInfo>)>;

fn run_completions(completions: DeferredCompletions) {
    for (completion, outcome) in completions {
        completion(outcome);
    }
}

impl Channel {
    pub(crate) fn new(name: impl Into<String>, shared: Arc<Shared>) -> Self {
        Self {
            ctx: Arc::new(ChannelCtx {
                name: name.into(),
                shared,
                inner: Mutex::new(ChannelInner {
                    state: ChannelState::Initialized,
                    error: None,
                    presence: PresenceMap::new(),
                    acks: AckQueue::new(),
                    queued: Vec::new(),
                    subscribers: Vec::new(),
                    presence_subscribers: Vec::new(),
                    state_listeners: Vec::new(),
                    attach_epoch: 0,
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    pub async fn state(&self) -> ChannelState {
        self.ctx.inner.lock().await.state
    }

    /// The last error recorded on this channel, if any.
    pub async fn error_reason(&self) -> Option<ErrorInfo> {
        self.ctx.inner.lock().await.error.clone()
    }

    /// Presence operations for this channel.
    pub fn presence(&self) -> Presence {
        Presence {
            channel: self.clone(),
        }
    }

    // --- Listener registration ---

    /// Register a state-change listener. Every subsequent transition is
    /// delivered exactly once, in order; no transition is coalesced.
    pub async fn on_state_change(&self) -> mpsc::UnboundedReceiver<ChannelStateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ctx.inner.lock().await.state_listeners.push(tx);
        rx
    }

    /// Subscribe to all messages on this channel.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<Message> {
        self.subscribe_filtered(None).await
    }

    /// Subscribe to messages whose name matches `name`.
    pub async fn subscribe_to_name(&self, name: impl Into<String>) -> mpsc::UnboundedReceiver<Message> {
        self.subscribe_filtered(Some(name.into())).await
    }

    async fn subscribe_filtered(&self, filter: Option<String>) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ctx
            .inner
            .lock()
            .await
            .subscribers
            .push(Subscriber { filter, tx });
        rx
    }

    /// Subscribe to presence events on this channel. Events are delivered
    /// after the member map has been updated, so `members()` observed from
    /// a presence handler reflects the event that triggered it.
    pub async fn subscribe_presence(&self) -> mpsc::UnboundedReceiver<PresenceMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ctx.inner.lock().await.presence_subscribers.push(tx);
        rx
    }

    // --- Lifecycle operations ---

    /// Request an attach. Returns an error without changing channel state
    /// when the connection is Closing, Closed, Suspended, or Failed, or when
    /// the capability grants nothing at all on this channel.
    pub async fn attach(&self) -> Result<(), WavelinkError> {
        let conn_state = self.connection_state().await;
        if conn_state.rejects_channel_operations() {
            return Err(WavelinkError::ConnectivityState(
                ErrorInfo::bad_connection_state(format!(
                    "cannot attach while the connection is {conn_state:?}"
                )),
            ));
        }
        if !self.ctx.shared.config.capability.any_grant(&self.ctx.name) {
            let err = ErrorInfo::capability_denied(format!(
                "no capability granted for channel {}",
                self.ctx.name
            ));
            self.apply_event(ChannelEvent::Error(err.clone())).await;
            return Err(WavelinkError::Capability(err));
        }

        self.apply_event(ChannelEvent::Attach).await;
        Ok(())
    }

    /// Request a detach. Confirmed by a Detached protocol message when a
    /// transport round trip is required, immediate otherwise.
    pub async fn detach(&self) -> Result<(), WavelinkError> {
        let conn_state = self.connection_state().await;
        if conn_state.rejects_channel_operations() {
            return Err(WavelinkError::ConnectivityState(
                ErrorInfo::bad_connection_state(format!(
                    "cannot detach while the connection is {conn_state:?}"
                )),
            ));
        }

        match self.state().await {
            ChannelState::Initialized | ChannelState::Detached => return Ok(()),
            ChannelState::Failed => {
                let err = self
                    .error_reason()
                    .await
                    .unwrap_or_else(|| ErrorInfo::protocol("channel is failed"));
                return Err(WavelinkError::Protocol(err));
            }
            _ => {}
        }

        self.apply_event(ChannelEvent::Detach).await;
        // Without a live connection there is no round trip to wait for.
        if conn_state != ConnectionState::Connected {
            self.apply_event(ChannelEvent::Detached).await;
        }
        Ok(())
    }

    // --- Publishing ---

    /// Publish a message. The completion is invoked exactly once: with the
    /// first known failure (capability, channel failure, connection loss) or
    /// with the transport acknowledgement, in per-channel submission order.
    pub async fn publish_with(
        &self,
        name: Option<String>,
        data: serde_json::Value,
        client_id: Option<String>,
        completion: Completion,
    ) {
        let mut message = Message::new(name, data);
        message.client_id = client_id;
        let mut proto = ProtocolMessage::new(Action::Message).with_channel(&self.ctx.name);
        proto.messages = vec![message];
        self.submit(proto, Operation::Publish, completion).await;
    }

    /// Publish and await the outcome.
    pub async fn publish(
        &self,
        name: Option<String>,
        data: serde_json::Value,
    ) -> Result<(), ErrorInfo> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.publish_with(
            name,
            data,
            None,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        )
        .await;
        rx.await
            .unwrap_or_else(|_| Err(ErrorInfo::connection_lost("client dropped")))
    }

    /// Shared submission path for messages and presence: capability check,
    /// immediate failure on a failed channel, send-when-attached, queue
    /// otherwise.
    async fn submit(&self, mut proto: ProtocolMessage, op: Operation, completion: Completion) {
        if !self.ctx.shared.config.capability.allows(&self.ctx.name, op) {
            completion(Err(ErrorInfo::capability_denied(format!(
                "{op:?} not permitted on channel {}",
                self.ctx.name
            ))));
            return;
        }

        let conn_state = self.connection_state().await;
        let mut deferred: DeferredCompletions = Vec::new();
        {
            let mut inner = self.ctx.inner.lock().await;
            match inner.state {
                ChannelState::Failed => {
                    let err = inner
                        .error
                        .clone()
                        .unwrap_or_else(|| ErrorInfo::protocol("channel is failed"));
                    deferred.push((completion, Err(err)));
                }
                ChannelState::Attached if conn_state == ConnectionState::Connected => {
                    let serial = self.ctx.shared.next_serial();
                    proto.msg_serial = Some(serial);
                    inner.acks.push(serial, completion);
                    if let Err(err) = self.ctx.shared.transport.send(proto).await {
                        deferred.extend(inner.acks.acknowledge(serial, 1, Err(err)));
                    }
                }
                _ => {
                    debug!(channel = %self.ctx.name, state = ?inner.state,
                           "queueing message until attached");
                    inner.queued.push(QueuedMessage {
                        message: proto,
                        completion,
                    });
                }
            }
        }
        run_completions(deferred);
    }

    // --- Event application ---

    async fn connection_state(&self) -> ConnectionState {
        self.ctx.shared.connection.lock().await.state()
    }

    /// Apply one event to the state machine and execute its effects.
    /// Completion callbacks run after the channel lock is released.
    pub(crate) async fn apply_event(&self, event: ChannelEvent) -> Option<ChannelStateChange> {
        let conn_state = self.connection_state().await;
        let mut deferred: DeferredCompletions = Vec::new();

        let change = {
            let mut inner = self.ctx.inner.lock().await;
            let t = transition(inner.state, &event)?;
            let change = ChannelStateChange {
                previous: inner.state,
                current: t.next,
                reason: t.reason.clone(),
            };
            debug!(channel = %self.ctx.name, previous = ?change.previous,
                   current = ?change.current, "channel state change");
            inner.state = t.next;
            if let Some(err) = t.reason {
                inner.error = Some(err);
            }
            if t.next == ChannelState::Attaching {
                inner.attach_epoch += 1;
            }
            inner
                .state_listeners
                .retain(|tx| tx.send(change.clone()).is_ok());

            for effect in t.effects {
                self.execute_effect(&mut inner, effect, conn_state, &mut deferred)
                    .await;
            }
            change
        };

        run_completions(deferred);
        Some(change)
    }

    async fn execute_effect(
        &self,
        inner: &mut ChannelInner,
        effect: ChannelEffect,
        conn_state: ConnectionState,
        deferred: &mut DeferredCompletions,
    ) {
        match effect {
            ChannelEffect::SendAttach => {
                // If not yet connected the intent is already recorded in the
                // Attaching state; the client re-sends on Connected.
                if conn_state == ConnectionState::Connected {
                    if let Err(err) = self
                        .ctx
                        .shared
                        .transport
                        .send(ProtocolMessage::attach(&self.ctx.name))
                        .await
                    {
                        warn!(channel = %self.ctx.name, %err, "failed to send Attach");
                    }
                }
            }
            ChannelEffect::SendDetach => {
                if conn_state == ConnectionState::Connected {
                    if let Err(err) = self
                        .ctx
                        .shared
                        .transport
                        .send(ProtocolMessage::detach(&self.ctx.name))
                        .await
                    {
                        warn!(channel = %self.ctx.name, %err, "failed to send Detach");
                    }
                }
            }
            ChannelEffect::StartAttachTimer => {
                let channel = self.clone();
                let epoch = inner.attach_epoch;
                let timeout = self.ctx.shared.config.attach_timeout;
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    channel.on_attach_timeout(epoch).await;
                });
            }
            ChannelEffect::SyncPresence { has_presence } => {
                if has_presence {
                    inner.presence.begin_sync();
                } else {
                    inner.presence.complete_empty();
                }
            }
            ChannelEffect::FlushQueued => {
                for queued in std::mem::take(&mut inner.queued) {
                    let serial = self.ctx.shared.next_serial();
                    let mut proto = queued.message;
                    proto.msg_serial = Some(serial);
                    inner.acks.push(serial, queued.completion);
                    if let Err(err) = self.ctx.shared.transport.send(proto).await {
                        deferred.extend(inner.acks.acknowledge(serial, 1, Err(err)));
                    }
                }
            }
            ChannelEffect::FailPending(err) => {
                deferred.extend(inner.acks.fail_all(err.clone()));
                for queued in inner.queued.drain(..) {
                    deferred.push((queued.completion, Err(err.clone())));
                }
            }
        }
    }

    // Boxed rather than an `async fn`: the timer task calls back into
    // `apply_event`, and the resulting cycle of opaque futures would keep
    // the compiler from proving the spawned task is `Send`.
    fn on_attach_timeout(&self, epoch: u64) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            {
                let inner = self.ctx.inner.lock().await;
                if inner.state != ChannelState::Attaching || inner.attach_epoch != epoch {
                    return;
                }
            }
            self.apply_event(ChannelEvent::AttachTimedOut).await;
        })
    }

    // --- Inbound dispatch (called from the client's single dispatch path) ---

    pub(crate) async fn handle_protocol_message(&self, msg: ProtocolMessage) {
        match msg.action {
            Action::Attached => {
                self.apply_event(ChannelEvent::Attached { flags: msg.flags })
                    .await;
            }
            Action::Detached => {
                self.apply_event(ChannelEvent::Detached).await;
            }
            Action::Error => {
                let err = msg
                    .error
                    .unwrap_or_else(|| ErrorInfo::protocol("unspecified channel error"));
                self.apply_event(ChannelEvent::Error(err)).await;
            }
            Action::Message => self.deliver_messages(msg.messages).await,
            Action::Presence => self.apply_presence(msg.presence, false, None).await,
            Action::Sync => {
                self.apply_presence(msg.presence, true, msg.channel_serial.as_deref())
                    .await;
            }
            Action::Ack => {
                let serial = msg.msg_serial.unwrap_or(0);
                let count = msg.count.unwrap_or(1);
                self.resolve_acks(serial, count, Ok(())).await;
            }
            Action::Nack => {
                let serial = msg.msg_serial.unwrap_or(0);
                let count = msg.count.unwrap_or(1);
                let err = msg
                    .error
                    .unwrap_or_else(|| ErrorInfo::protocol("publish rejected"));
                self.resolve_acks(serial, count, Err(err)).await;
            }
            other => {
                warn!(channel = %self.ctx.name, action = ?other,
                      "unexpected channel-scoped protocol message");
            }
        }
    }

    async fn deliver_messages(&self, messages: Vec<Message>) {
        let mut inner = self.ctx.inner.lock().await;
        if inner.state != ChannelState::Attached {
            debug!(channel = %self.ctx.name, state = ?inner.state,
                   "dropping messages for non-attached channel");
            return;
        }
        for message in messages {
            inner.subscribers.retain(|sub| {
                let matches = match &sub.filter {
                    Some(filter) => message.name.as_deref() == Some(filter.as_str()),
                    None => true,
                };
                if matches {
                    sub.tx.send(message.clone()).is_ok()
                } else {
                    // Keep non-matching subscribers; only prune closed ones.
                    !sub.tx.is_closed()
                }
            });
        }
    }

    /// Fold presence records into the member map, then notify presence
    /// subscribers of the records that were actually applied.
    async fn apply_presence(
        &self,
        records: Vec<PresenceMessage>,
        sync: bool,
        sync_serial: Option<&str>,
    ) {
        let mut inner = self.ctx.inner.lock().await;
        let applied = if sync {
            inner.presence.apply_sync(records, sync_serial)
        } else {
            records
                .into_iter()
                .filter_map(|record| match inner.presence.apply(record) {
                    PresenceOutcome::Applied(m) => Some(m),
                    PresenceOutcome::Ignored => None,
                })
                .collect()
        };
        for event in applied {
            inner
                .presence_subscribers
                .retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    async fn resolve_acks(&self, serial: u64, count: u32, outcome: Result<(), ErrorInfo>) {
        let released = {
            let mut inner = self.ctx.inner.lock().await;
            inner.acks.acknowledge(serial, count, outcome)
        };
        run_completions(released);
    }

    /// React to a connection-level state change (called by the client for
    /// every channel it owns).
    pub(crate) async fn handle_connection_change(&self, change: &ConnectionStateChange) {
        match change.current {
            ConnectionState::Suspended => {
                self.apply_event(ChannelEvent::ConnectionSuspended).await;
            }
            ConnectionState::Closing | ConnectionState::Closed => {
                self.apply_event(ChannelEvent::ConnectionClosing).await;
            }
            ConnectionState::Failed => {
                let err = change
                    .reason
                    .clone()
                    .unwrap_or_else(|| ErrorInfo::protocol("connection failed"));
                self.apply_event(ChannelEvent::ConnectionFailed(err)).await;
            }
            ConnectionState::Connected => {
                // Attach intents recorded while the connection was down are
                // sent now; messages queued during a disconnection on a
                // still-attached channel are flushed.
                let mut deferred: DeferredCompletions = Vec::new();
                let pending_attach = {
                    let mut inner = self.ctx.inner.lock().await;
                    if inner.state == ChannelState::Attached {
                        self.execute_effect(
                            &mut inner,
                            ChannelEffect::FlushQueued,
                            ConnectionState::Connected,
                            &mut deferred,
                        )
                        .await;
                    }
                    inner.state == ChannelState::Attaching
                };
                run_completions(deferred);
                if pending_attach {
                    if let Err(err) = self
                        .ctx
                        .shared
                        .transport
                        .send(ProtocolMessage::attach(&self.ctx.name))
                        .await
                    {
                        warn!(channel = %self.ctx.name, %err, "failed to send queued Attach");
                    }
                }
            }
            _ => {}
        }
    }
}

/// Presence operations for one channel.
pub struct Presence {
    channel: Channel,
}

impl Presence {
    /// Enter the local client into presence.
    pub async fn enter(&self, data: Option<serde_json::Value>, completion: Completion) {
        match self.channel.ctx.shared.config.client_id.clone() {
            Some(client_id) => self.enter_client(client_id, data, completion).await,
            None => completion(Err(ErrorInfo::protocol(
                "cannot enter presence without a client id",
            ))),
        }
    }

    /// Enter presence on behalf of the given client id.
    pub async fn enter_client(
        &self,
        client_id: impl Into<String>,
        data: Option<serde_json::Value>,
        completion: Completion,
    ) {
        self.send_presence(PresenceAction::Enter, client_id.into(), data, completion)
            .await;
    }

    /// Update the local member's presence payload.
    pub async fn update(&self, data: Option<serde_json::Value>, completion: Completion) {
        match self.channel.ctx.shared.config.client_id.clone() {
            Some(client_id) => {
                self.send_presence(PresenceAction::Update, client_id, data, completion)
                    .await
            }
            None => completion(Err(ErrorInfo::protocol(
                "cannot update presence without a client id",
            ))),
        }
    }

    /// Remove the local member from presence.
    pub async fn leave(&self, completion: Completion) {
        match self.channel.ctx.shared.config.client_id.clone() {
            Some(client_id) => {
                self.send_presence(PresenceAction::Leave, client_id, None, completion)
                    .await
            }
            None => completion(Err(ErrorInfo::protocol(
                "cannot leave presence without a client id",
            ))),
        }
    }

    async fn send_presence(
        &self,
        action: PresenceAction,
        client_id: String,
        data: Option<serde_json::Value>,
        completion: Completion,
    ) {
        let member_id = self.channel.ctx.shared.member_id().await;
        let mut record = PresenceMessage::new(action, client_id, member_id);
        record.data = data;
        let mut proto =
            ProtocolMessage::new(Action::Presence).with_channel(self.channel.name());
        proto.presence = vec![record];
        self.channel
            .submit(proto, Operation::Presence, completion)
            .await;
    }

    /// Snapshot of the live member set.
    pub async fn members(&self) -> Vec<PresenceMessage> {
        self.channel.ctx.inner.lock().await.presence.members()
    }

    /// True iff the presence sync has observed its end signal.
    pub async fn is_sync_complete(&self) -> bool {
        self.channel
            .ctx
            .inner
            .lock()
            .await
            .presence
            .is_sync_complete()
    }
}

//! Channel lifecycle integration tests: attach/detach handshakes, rejection
//! while the connection is unusable, and reactions to connection loss.

mod common;

use std::time::Duration;

use common::{completion_probe, Rig, TIMEOUT};
use wavelink::{
    Action, Capability, ChannelState, ConnectionState, ErrorInfo, ProtocolMessage,
    RealtimeConfig, TransportEvent,
};

#[tokio::test]
async fn test_attach_round_trip() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.connect().await;

    let channel = rig.client.channel("updates").await;
    let mut changes = channel.on_state_change().await;

    channel.attach().await.unwrap();
    assert_eq!(channel.state().await, ChannelState::Attaching);
    let sent = rig.sent().await;
    assert_eq!(sent.action, Action::Attach);

    rig.receive(ProtocolMessage::attached("updates", 0)).await;
    assert_eq!(channel.state().await, ChannelState::Attached);

    // Every transition is observed, in order, uncoalesced.
    let first = changes.recv().await.unwrap();
    assert_eq!(first.previous, ChannelState::Initialized);
    assert_eq!(first.current, ChannelState::Attaching);
    let second = changes.recv().await.unwrap();
    assert_eq!(second.previous, ChannelState::Attaching);
    assert_eq!(second.current, ChannelState::Attached);
}

#[tokio::test]
async fn test_repeated_attach_is_idempotent() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.connect().await;
    let channel = rig.attach("updates", 0).await;

    channel.attach().await.unwrap();
    assert_eq!(channel.state().await, ChannelState::Attached);
    rig.assert_nothing_sent();
}

#[tokio::test]
async fn test_detach_round_trip() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.connect().await;
    let channel = rig.attach("updates", 0).await;

    channel.detach().await.unwrap();
    assert_eq!(channel.state().await, ChannelState::Detaching);
    let sent = rig.sent().await;
    assert_eq!(sent.action, Action::Detach);

    rig.receive(ProtocolMessage::detached("updates")).await;
    assert_eq!(channel.state().await, ChannelState::Detached);
}

#[tokio::test]
async fn test_attach_rejected_while_connection_closed() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.connect().await;
    rig.client.close().await;
    let sent = rig.sent().await;
    assert_eq!(sent.action, Action::Close);
    rig.receive(ProtocolMessage::new(Action::Closed)).await;
    assert_eq!(rig.client.connection_state().await, ConnectionState::Closed);

    let channel = rig.client.channel("updates").await;
    let err = channel.attach().await.unwrap_err();
    assert_eq!(err.error_info().code, 80002);
    // The rejection leaves the channel untouched.
    assert_eq!(channel.state().await, ChannelState::Initialized);
    rig.assert_nothing_sent();
}

#[tokio::test]
async fn test_attach_rejected_without_any_grant() {
    let config = RealtimeConfig {
        capability: Capability::parse(r#"{"news": ["subscribe"]}"#).unwrap(),
        ..RealtimeConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.connect().await;

    let channel = rig.client.channel("private").await;
    let err = channel.attach().await.unwrap_err();
    assert_eq!(err.error_info().code, 40160);
    assert_eq!(channel.state().await, ChannelState::Failed);
    rig.assert_nothing_sent();
}

#[tokio::test]
async fn test_suspension_detaches_attached_channels() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.connect().await;
    let channel = rig.attach("updates", 0).await;

    let (completion, mut outcome) = completion_probe();
    channel
        .publish_with(Some("ev".into()), serde_json::json!(1), None, completion)
        .await;
    let _ = rig.sent().await;

    rig.client.dispatch(TransportEvent::Suspended).await;
    assert_eq!(
        rig.client.connection_state().await,
        ConnectionState::Suspended
    );
    // Dropped, not failed: detached with no channel error, and the channel
    // may be attached again later.
    assert_eq!(channel.state().await, ChannelState::Detached);
    let result = tokio::time::timeout(TIMEOUT, outcome.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.unwrap_err().code, 80003);
}

#[tokio::test]
async fn test_close_detaches_channels_without_failing_them() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.connect().await;
    let channel = rig.attach("updates", 0).await;

    rig.client.close().await;
    assert_eq!(
        rig.client.connection_state().await,
        ConnectionState::Closing
    );
    assert_eq!(channel.state().await, ChannelState::Detached);
    assert!(channel.error_reason().await.is_none());
}

#[tokio::test]
async fn test_channel_scoped_error_fails_channel() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.connect().await;
    let channel = rig.attach("updates", 0).await;

    rig.receive(ProtocolMessage::error(
        Some("updates".into()),
        ErrorInfo::new(91234, "server said no"),
    ))
    .await;

    assert_eq!(channel.state().await, ChannelState::Failed);
    let reason = channel.error_reason().await.unwrap();
    assert_eq!(reason.code, 91234);
    assert_eq!(reason.message, "server said no");
}

#[tokio::test]
async fn test_connection_failure_fails_channels_with_reason() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.connect().await;
    let channel = rig.attach("updates", 0).await;

    rig.client
        .dispatch(TransportEvent::Failed(ErrorInfo::new(40101, "auth expired")))
        .await;

    assert_eq!(rig.client.connection_state().await, ConnectionState::Failed);
    assert_eq!(channel.state().await, ChannelState::Failed);
    assert_eq!(channel.error_reason().await.unwrap().code, 40101);
}

#[tokio::test(start_paused = true)]
async fn test_attach_times_out_without_confirmation() {
    let config = RealtimeConfig {
        attach_timeout: Duration::from_secs(10),
        ..RealtimeConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.connect().await;

    let channel = rig.client.channel("updates").await;
    channel.attach().await.unwrap();
    let sent = rig.sent().await;
    assert_eq!(sent.action, Action::Attach);

    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(channel.state().await, ChannelState::Failed);
    assert_eq!(channel.error_reason().await.unwrap().code, 90007);
}

#[tokio::test(start_paused = true)]
async fn test_stale_attach_timer_does_not_fire_after_confirmation() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.connect().await;
    let channel = rig.attach("updates", 0).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(channel.state().await, ChannelState::Attached);
}

#[tokio::test]
async fn test_attach_intent_queued_until_connected() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.client.connect().await.unwrap();
    let sent = rig.sent().await;
    assert_eq!(sent.action, Action::Connect);

    // Attach before the server confirms the connection: intent recorded,
    // nothing on the wire yet.
    let channel = rig.client.channel("updates").await;
    channel.attach().await.unwrap();
    assert_eq!(channel.state().await, ChannelState::Attaching);
    rig.assert_nothing_sent();

    rig.receive(ProtocolMessage {
        connection_id: Some("conn-1".into()),
        ..ProtocolMessage::new(Action::Connected)
    })
    .await;

    let sent = rig.sent().await;
    assert_eq!(sent.action, Action::Attach);
    assert_eq!(sent.channel.as_deref(), Some("updates"));
}

#[tokio::test]
async fn test_messages_delivered_only_to_matching_subscribers() {
    let mut rig = Rig::new(RealtimeConfig::default());
    rig.connect().await;
    let channel = rig.attach("updates", 0).await;

    let mut all = channel.subscribe().await;
    let mut only_ticks = channel.subscribe_to_name("tick").await;

    let mut proto = ProtocolMessage::new(Action::Message).with_channel("updates");
    proto.messages = vec![
        wavelink::Message::new(Some("tick".into()), serde_json::json!(1)),
        wavelink::Message::new(Some("tock".into()), serde_json::json!(2)),
    ];
    rig.receive(proto).await;

    assert_eq!(all.recv().await.unwrap().name.as_deref(), Some("tick"));
    assert_eq!(all.recv().await.unwrap().name.as_deref(), Some("tock"));
    assert_eq!(
        only_ticks.recv().await.unwrap().name.as_deref(),
        Some("tick")
    );
    assert!(only_ticks.try_recv().is_err());
}

//! Gateway Integration Tests
//!
//! Each test runs a shard against an in-process fake gateway over a real
//! WebSocket connection and scripts the server side frame by frame.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;
use std::time::{Duration, Instant};

use chat_common::ShardConfig;
use chat_core::{Intents, Snowflake, Status};
use chat_gateway::connection::ConnectionState;
use chat_gateway::protocol::StatusUpdatePayload;
use chat_gateway::{
    FailureReason, GatewayEndpoint, GatewayError, GatewayResult, ShardConnection, ShardEvent,
};
use integration_tests::*;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const LONG_INTERVAL: u64 = 41_250;

fn spawn_connect(shard: &Arc<ShardConnection>) -> JoinHandle<GatewayResult<()>> {
    let shard = Arc::clone(shard);
    tokio::spawn(async move { shard.connect(&CancellationToken::new()).await })
}

/// Hello, Identify, Ready on a fresh connection
async fn handshake(gateway: &mut FakeGateway, shard: &Arc<ShardConnection>) -> GatewayPeer {
    let connecting = spawn_connect(shard);
    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    peer.expect_op(2).await.unwrap();
    peer.send(ready(1)).await.unwrap();
    connecting.await.unwrap().unwrap();
    peer
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_fresh_connect() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let connecting = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();

    let identify = peer.expect_op(2).await.unwrap();
    assert_eq!(identify["d"]["token"], TEST_TOKEN);
    assert_eq!(identify["d"]["intents"], Intents::default().bits());
    assert!(identify["d"].get("shard").is_none());
    assert!(identify["d"]["properties"].is_object());
    assert_eq!(shard.state(), ConnectionState::Connecting);

    peer.send(ready(1)).await.unwrap();
    connecting.await.unwrap().unwrap();

    assert_eq!(shard.state(), ConnectionState::Connected);
    assert_eq!(shard.session_id().as_deref(), Some(SESSION_ID));

    let cache = shard.cache();
    let guild = cache.guild(Snowflake::new(10)).unwrap();
    assert!(!guild.is_available());
    assert_eq!(cache.current_user().unwrap().id, Snowflake::new(1));
    assert!(cache.user(Snowflake::new(1)).is_some());
}

#[tokio::test]
async fn test_sharded_identify_carries_shard_pair() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_with(&gateway, Intents::GUILDS, ShardConfig::new(1, 2).unwrap());
    let _connecting = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();

    let identify = peer.expect_op(2).await.unwrap();
    assert_eq!(identify["d"]["shard"], serde_json::json!([1, 2]));
    assert_eq!(identify["d"]["intents"], 1);
}

#[tokio::test]
async fn test_guild_becomes_available() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut events = shard.subscribe();
    let mut peer = handshake(&mut gateway, &shard).await;

    peer.send(guild_create(2)).await.unwrap();

    let event = next_event(&mut events, |e| {
        matches!(e, ShardEvent::GuildAvailable(_) | ShardEvent::GuildCreated(_))
    })
    .await
    .unwrap();
    let ShardEvent::GuildAvailable(guild) = event else {
        panic!("expected guild available, got {}", event.name());
    };
    assert_eq!(guild.name, "Test");
    assert!(guild.is_available());

    let cache = shard.cache();
    let mut channels: Vec<u64> = cache
        .guild_channels(Snowflake::new(10))
        .unwrap()
        .iter()
        .map(|c| c.id.get())
        .collect();
    channels.sort_unstable();
    assert_eq!(channels, vec![5, 6]);
    assert_eq!(cache.members(Snowflake::new(10)).unwrap().len(), 2);
    assert!(cache.user(Snowflake::new(2)).is_some());
}

#[tokio::test]
async fn test_bulk_delete_yields_one_event_per_message() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut events = shard.subscribe();
    let mut peer = handshake(&mut gateway, &shard).await;

    peer.send(guild_create(2)).await.unwrap();
    peer.send(message_create(3, "100", "5", "first")).await.unwrap();
    peer.send(message_delete_bulk(4, "5", &["100", "101", "102"]))
        .await
        .unwrap();

    let mut deleted = Vec::new();
    for _ in 0..3 {
        let event = next_event(&mut events, |e| matches!(e, ShardEvent::MessageDeleted { .. }))
            .await
            .unwrap();
        if let ShardEvent::MessageDeleted {
            channel_id,
            message_id,
            message,
        } = event
        {
            assert_eq!(channel_id, Snowflake::new(5));
            // only the first one was ever cached
            assert_eq!(message.is_some(), message_id.get() == 100);
            deleted.push(message_id.get());
        }
    }
    assert_eq!(deleted, vec![100, 101, 102]);
    assert!(shard
        .cache()
        .message(Snowflake::new(5), Snowflake::new(100))
        .is_none());
}

#[tokio::test]
async fn test_overlapping_connects_share_one_handshake() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let first = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    let second = spawn_connect(&shard);
    tokio::time::sleep(Duration::from_millis(50)).await;

    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    peer.expect_op(2).await.unwrap();
    peer.send(ready(1)).await.unwrap();

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(shard.state(), ConnectionState::Connected);
    assert_eq!(shard.session_id().as_deref(), Some(SESSION_ID));
    assert!(gateway.stays_quiet(Duration::from_millis(500)).await);

    // connected already, so this returns at once
    shard.connect(&CancellationToken::new()).await.unwrap();
    assert!(peer.stays_quiet(Duration::from_millis(200)).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_hello_is_ignored() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let connecting = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    peer.expect_op(2).await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    peer.send(ready(1)).await.unwrap();
    connecting.await.unwrap().unwrap();

    // a second Identify would arrive once the identify window reopens
    assert!(peer.stays_quiet(Duration::from_secs(6)).await.unwrap());
    assert!(peer.heartbeats() <= 1);
    assert_eq!(shard.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_zero_heartbeat_interval_still_beats() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let connecting = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(0)).await.unwrap();
    loop {
        let frame = peer.recv().await.unwrap();
        match frame["op"].as_u64() {
            Some(1) => peer.send(heartbeat_ack()).await.unwrap(),
            Some(2) => break,
            _ => panic!("unexpected frame {frame}"),
        }
    }
    peer.send(ready(1)).await.unwrap();
    connecting.await.unwrap().unwrap();

    for _ in 0..3 {
        let beat = peer.recv().await.unwrap();
        assert_eq!(beat["op"], 1);
        peer.send(heartbeat_ack()).await.unwrap();
    }
    assert_eq!(shard.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_server_heartbeat_request_keeps_schedule() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let connecting = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(1_000)).await.unwrap();
    loop {
        let frame = peer.recv().await.unwrap();
        match frame["op"].as_u64() {
            Some(1) => peer.send(heartbeat_ack()).await.unwrap(),
            Some(2) => break,
            _ => panic!("unexpected frame {frame}"),
        }
    }
    peer.send(ready(1)).await.unwrap();
    connecting.await.unwrap().unwrap();

    // first scheduled beat after the handshake
    let beat = peer.recv().await.unwrap();
    assert_eq!(beat["op"], 1);
    let scheduled = Instant::now();
    peer.send(heartbeat_ack()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let requested = Instant::now();
    peer.send(heartbeat_request()).await.unwrap();
    let beat = peer.recv().await.unwrap();
    assert_eq!(beat["op"], 1);
    assert!(requested.elapsed() < Duration::from_millis(500));
    peer.send(heartbeat_ack()).await.unwrap();

    // the next scheduled beat is still one interval after the previous one
    let beat = peer.recv().await.unwrap();
    assert_eq!(beat["op"], 1);
    let gap = scheduled.elapsed();
    assert!(gap >= Duration::from_millis(800), "beat came early: {gap:?}");
    assert!(gap < Duration::from_millis(1_250), "beat came late: {gap:?}");
    peer.send(heartbeat_ack()).await.unwrap();

    assert_eq!(shard.state(), ConnectionState::Connected);
}

// ============================================================================
// Reconnect
// ============================================================================

#[tokio::test]
async fn test_reconnect_request_resumes() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut events = shard.subscribe();
    let mut peer = handshake(&mut gateway, &shard).await;

    peer.send(guild_create(2)).await.unwrap();
    next_event(&mut events, |e| matches!(e, ShardEvent::GuildAvailable(_)))
        .await
        .unwrap();

    peer.send(reconnect()).await.unwrap();
    assert_eq!(peer.expect_closed().await.unwrap(), Some(4000));

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    let resume = peer.expect_op(6).await.unwrap();
    assert_eq!(resume["d"]["session_id"], SESSION_ID);
    assert_eq!(resume["d"]["seq"], 2);
    assert_eq!(resume["d"]["token"], TEST_TOKEN);

    peer.send(resumed(3)).await.unwrap();
    next_event(&mut events, |e| matches!(e, ShardEvent::Reconnected))
        .await
        .unwrap();
    assert_eq!(shard.state(), ConnectionState::Connected);
    assert_eq!(shard.session_id().as_deref(), Some(SESSION_ID));
    // resuming keeps the cache
    assert!(shard.cache().guild(Snowflake::new(10)).unwrap().is_available());
}

#[tokio::test]
async fn test_invalid_session_identifies_again() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut peer = handshake(&mut gateway, &shard).await;

    peer.send(invalid_session(false)).await.unwrap();
    assert_eq!(peer.expect_closed().await.unwrap(), Some(1000));

    let mut peer = gateway.accept().await.unwrap();
    assert!(shard.session_id().is_none());
    peer.send(hello(LONG_INTERVAL)).await.unwrap();

    let identify = peer.expect_op(2).await.unwrap();
    assert_eq!(identify["d"]["token"], TEST_TOKEN);
}

#[tokio::test]
async fn test_resumable_close_code_resumes() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut peer = handshake(&mut gateway, &shard).await;

    peer.close(4001, "unknown opcode").await.unwrap();

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    let resume = peer.expect_op(6).await.unwrap();
    assert_eq!(resume["d"]["session_id"], SESSION_ID);
    assert_eq!(resume["d"]["seq"], 1);
}

#[tokio::test]
async fn test_close_during_resume_reconnects_again() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut peer = handshake(&mut gateway, &shard).await;

    peer.close(4001, "unknown opcode").await.unwrap();

    // closed again before the resume completes
    let mut peer = gateway.accept().await.unwrap();
    peer.close(4001, "unknown opcode").await.unwrap();

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    let resume = peer.expect_op(6).await.unwrap();
    assert_eq!(resume["d"]["session_id"], SESSION_ID);
    peer.send(resumed(2)).await.unwrap();

    let mut state = shard.subscribe_state();
    tokio::time::timeout(STEP_TIMEOUT, state.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_dropped_connection_resumes() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut events = shard.subscribe();
    let peer = handshake(&mut gateway, &shard).await;

    peer.drop_connection();

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    let resume = peer.expect_op(6).await.unwrap();
    assert_eq!(resume["d"]["session_id"], SESSION_ID);
    assert_eq!(resume["d"]["seq"], 1);

    peer.send(resumed(2)).await.unwrap();
    next_event(&mut events, |e| matches!(e, ShardEvent::Reconnected))
        .await
        .unwrap();
    assert_eq!(shard.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_rate_limited_close_resumes_after_delay() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut peer = handshake(&mut gateway, &shard).await;

    let closed = Instant::now();
    peer.close(4008, "rate limited").await.unwrap();

    let mut peer = gateway.accept().await.unwrap();
    let waited = closed.elapsed();
    assert!(waited >= Duration::from_millis(4_500), "reconnected after {waited:?}");

    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    let resume = peer.expect_op(6).await.unwrap();
    assert_eq!(resume["d"]["session_id"], SESSION_ID);
}

#[tokio::test]
async fn test_session_timeout_close_identifies_again() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut peer = handshake(&mut gateway, &shard).await;

    peer.close(4009, "session timed out").await.unwrap();

    let mut peer = gateway.accept().await.unwrap();
    assert!(shard.session_id().is_none());
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    let identify = peer.expect_op(2).await.unwrap();
    assert_eq!(identify["d"]["token"], TEST_TOKEN);

    peer.send(ready(1)).await.unwrap();
    let mut state = shard.subscribe_state();
    tokio::time::timeout(STEP_TIMEOUT, state.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_invalid_sequence_close_identifies_again() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut peer = handshake(&mut gateway, &shard).await;

    peer.close(4007, "invalid seq").await.unwrap();

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    let identify = peer.expect_op(2).await.unwrap();
    assert!(identify["d"].get("session_id").is_none());
}

#[tokio::test]
async fn test_failed_transport_connect_is_retried() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let urls = Arc::new(ScriptedUrls::new([dead_url().await.unwrap(), gateway.url()]));
    let endpoint = Arc::new(GatewayEndpoint::new(urls.clone(), 6));
    let shard = shard_on(Arc::clone(&endpoint), Intents::default(), ShardConfig::SINGLE);

    let started = Instant::now();
    let connecting = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(4_500), "retried after {waited:?}");
    // the dead url was dropped and looked up again
    assert_eq!(urls.calls(), 2);
    assert_eq!(endpoint.cached().as_deref(), Some(gateway.url().as_str()));

    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    peer.expect_op(2).await.unwrap();
    peer.send(ready(1)).await.unwrap();
    connecting.await.unwrap().unwrap();
    assert_eq!(shard.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_heartbeat_ack_timeout_resumes() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let connecting = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(300)).await.unwrap();
    peer.expect_op(2).await.unwrap();
    peer.send(ready(1)).await.unwrap();
    connecting.await.unwrap().unwrap();

    // never acknowledged, so the second beat is never sent
    assert_eq!(peer.expect_closed().await.unwrap(), Some(4000));

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    let resume = peer.expect_op(6).await.unwrap();
    assert_eq!(resume["d"]["session_id"], SESSION_ID);
    assert_eq!(resume["d"]["seq"], 1);
}

#[tokio::test]
async fn test_acknowledged_heartbeats_keep_connection() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let connecting = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(200)).await.unwrap();

    // the first beat races Identify
    loop {
        let frame = peer.recv().await.unwrap();
        match frame["op"].as_u64() {
            Some(1) => peer.send(heartbeat_ack()).await.unwrap(),
            Some(2) => break,
            _ => panic!("unexpected frame {frame}"),
        }
    }
    peer.send(ready(1)).await.unwrap();
    connecting.await.unwrap().unwrap();

    for _ in 0..3 {
        let beat = peer.recv().await.unwrap();
        assert_eq!(beat["op"], 1);
        peer.send(heartbeat_ack()).await.unwrap();
    }

    assert_eq!(shard.state(), ConnectionState::Connected);
    assert!(gateway.stays_quiet(Duration::from_millis(300)).await);
    assert!(shard.latency().is_some());
}

// ============================================================================
// Failure
// ============================================================================

#[tokio::test]
async fn test_authentication_failure_is_fatal() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut events = shard.subscribe();
    let connecting = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    peer.expect_op(2).await.unwrap();
    peer.close(4004, "Authentication failed").await.unwrap();

    let result = connecting.await.unwrap();
    match result {
        Err(GatewayError::Fatal(failure)) => {
            assert_eq!(failure.reason, FailureReason::AuthenticationFailed);
        }
        other => panic!("expected fatal error, got {other:?}"),
    }

    let event = next_event(&mut events, |e| matches!(e, ShardEvent::Failed(_)))
        .await
        .unwrap();
    assert!(matches!(event, ShardEvent::Failed(f) if f.reason == FailureReason::AuthenticationFailed));

    assert!(gateway.stays_quiet(Duration::from_secs(6)).await);
    assert_eq!(shard.state(), ConnectionState::Failed);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_status_update_waits_for_ready() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let connecting = spawn_connect(&shard);

    let mut peer = gateway.accept().await.unwrap();
    let updating = {
        let shard = Arc::clone(&shard);
        tokio::spawn(async move {
            shard
                .update_status(StatusUpdatePayload::new(Status::Idle), &CancellationToken::new())
                .await
        })
    };

    peer.send(hello(LONG_INTERVAL)).await.unwrap();
    // the status update is still parked, so Identify comes first
    peer.expect_op(2).await.unwrap();
    peer.send(ready(1)).await.unwrap();
    connecting.await.unwrap().unwrap();

    let status = peer.expect_op(3).await.unwrap();
    assert_eq!(status["d"]["status"], "idle");
    assert_eq!(status["d"]["afk"], false);
    updating.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_request_guild_members() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut peer = handshake(&mut gateway, &shard).await;

    shard
        .request_guild_members(Snowflake::new(10), "ab", 5, &CancellationToken::new())
        .await
        .unwrap();

    let request = peer.expect_op(8).await.unwrap();
    assert_eq!(request["d"]["guild_id"], GUILD_ID);
    assert_eq!(request["d"]["query"], "ab");
    assert_eq!(request["d"]["limit"], 5);
}

#[tokio::test]
async fn test_disconnect_closes_and_stays_down() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let shard = shard_for(&gateway);
    let mut peer = handshake(&mut gateway, &shard).await;

    shard.disconnect().await;

    assert_eq!(peer.expect_closed().await.unwrap(), Some(1000));
    assert_eq!(shard.state(), ConnectionState::Disconnected);
    assert!(shard.session_id().is_none());
    assert!(gateway.stays_quiet(Duration::from_secs(1)).await);

    let result = shard
        .update_status(StatusUpdatePayload::new(Status::Online), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(GatewayError::Disconnected)));
}

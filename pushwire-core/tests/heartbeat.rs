//! Heartbeat timing tests on Tokio's paused clock.

mod common;

use std::time::Duration;

use pushwire_core::{ConnectionState, SessionConfig};
use serde_json::json;

use common::{handshake, session_with};

const ACTIVITY: Duration = Duration::from_secs(120);
const PONG: Duration = Duration::from_secs(30);
const EPSILON: Duration = Duration::from_millis(10);

fn config() -> SessionConfig {
    SessionConfig::default().with_timeouts(ACTIVITY, PONG)
}

#[tokio::test(start_paused = true)]
async fn test_quiet_line_pings_then_disconnects() {
    let (session, transport, recorder) = session_with(config());
    session.connect();
    transport.open();
    transport.deliver(&handshake("abc123"));

    tokio::time::sleep(ACTIVITY - EPSILON).await;
    assert!(transport.sent_events("pusher:ping").is_empty());

    tokio::time::sleep(EPSILON * 2).await;
    assert_eq!(transport.sent_events("pusher:ping").len(), 1);
    assert!(session.is_connected());

    tokio::time::sleep(PONG).await;
    assert_eq!(transport.sent_events("pusher:ping").len(), 1);
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(recorder.disconnects(), 1);
    assert_eq!(transport.closes(), 1);

    // Nothing else fires afterwards.
    tokio::time::sleep(ACTIVITY * 3).await;
    assert_eq!(transport.sent_events("pusher:ping").len(), 1);
    assert_eq!(recorder.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pong_keeps_session_alive() {
    let (session, transport, recorder) = session_with(config());
    session.connect();
    transport.open();
    transport.deliver(&handshake("abc123"));

    tokio::time::sleep(ACTIVITY + EPSILON).await;
    assert_eq!(transport.sent_events("pusher:ping").len(), 1);

    transport.deliver(r#"{"event":"pusher:pong"}"#);
    tokio::time::sleep(PONG + EPSILON).await;
    assert!(session.is_connected());
    assert_eq!(recorder.disconnects(), 0);

    // The cycle starts over from the pong.
    tokio::time::sleep(ACTIVITY - PONG).await;
    assert_eq!(transport.sent_events("pusher:ping").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_traffic_postpones_ping() {
    let (session, transport, _recorder) = session_with(config());
    session.connect();
    transport.open();
    transport.deliver(&handshake("abc123"));

    for _ in 0..5 {
        tokio::time::sleep(ACTIVITY / 2).await;
        transport.deliver_json(json!({ "event": "tick", "channel": "A" }));
    }
    assert!(transport.sent_events("pusher:ping").is_empty());
    assert!(session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_other_traffic_does_not_answer_ping() {
    let (session, transport, recorder) = session_with(config());
    session.connect();
    transport.open();
    transport.deliver(&handshake("abc123"));

    tokio::time::sleep(ACTIVITY + EPSILON).await;
    assert_eq!(transport.sent_events("pusher:ping").len(), 1);

    transport.deliver_json(json!({ "event": "tick", "channel": "A" }));
    tokio::time::sleep(PONG).await;
    assert!(!session.is_connected());
    assert_eq!(recorder.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_silences_timers() {
    let (session, transport, recorder) = session_with(config());
    session.connect();
    transport.open();
    transport.deliver(&handshake("abc123"));

    tokio::time::sleep(ACTIVITY + EPSILON).await;
    session.disconnect();
    assert_eq!(recorder.disconnects(), 1);

    tokio::time::sleep(ACTIVITY * 4).await;
    assert_eq!(transport.sent_events("pusher:ping").len(), 1);
    assert_eq!(recorder.disconnects(), 1);
    assert_eq!(transport.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_starts_when_transport_opens() {
    let (session, transport, recorder) = session_with(config());
    session.connect();

    // Dialing takes a while; the clock only starts on open.
    tokio::time::sleep(ACTIVITY * 2).await;
    assert!(transport.sent_events("pusher:ping").is_empty());
    assert_eq!(session.state(), ConnectionState::Connecting);

    transport.open();
    tokio::time::sleep(ACTIVITY + EPSILON).await;
    assert_eq!(transport.sent_events("pusher:ping").len(), 1);

    // No handshake ever arrived and no pong either.
    tokio::time::sleep(PONG).await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(recorder.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_arms_heartbeat_without_open_notice() {
    let (session, transport, recorder) = session_with(config());
    session.connect();
    transport.open_silently();
    transport.deliver(&handshake("abc123"));
    assert!(session.is_connected());

    tokio::time::sleep(ACTIVITY + EPSILON).await;
    assert_eq!(transport.sent_events("pusher:ping").len(), 1);

    tokio::time::sleep(PONG).await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(recorder.disconnects(), 1);
}

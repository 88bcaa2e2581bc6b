//! Session behaviour against the scripted transport

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ilink_ble::testing::{MockLink, MockProvider};
use ilink_ble::{LinkActivity, Session, SessionConfig, SessionError, SessionState};
use ilink_core::{Advertisement, Command, StatusFrame, ValidationError};
use parking_lot::Mutex;
use tokio::time::{sleep, Instant};

const REFERENCE_STATUS: &str = "55aa098815aaaaaaffffff0105ed6c";

fn reference_frame() -> Vec<u8> {
    hex::decode(REFERENCE_STATUS).unwrap()
}

fn setup() -> (Arc<MockProvider>, Arc<MockLink>, Session) {
    let provider = MockProvider::new();
    let link = provider.link();
    let session = Session::new(
        "AA:BB:CC:DD:EE:FF".parse().unwrap(),
        provider.clone(),
        SessionConfig::default(),
    );
    (provider, link, session)
}

/// Let spawned tasks (notification pump, writers) make progress
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

// ---- Connect ----

#[tokio::test(start_paused = true)]
async fn test_concurrent_connects_share_one_attempt() {
    let (provider, link, session) = setup();
    link.set_connect_delay(Duration::from_millis(200));

    let first = session.clone();
    let pending = tokio::spawn(async move { first.connect().await });
    settle().await;

    assert_eq!(session.state(), SessionState::Connecting);
    assert!(session.is_busy());

    let (a, b) = tokio::join!(session.connect(), session.connect());
    assert!(a && b);
    assert!(pending.await.unwrap());

    assert_eq!(link.connect_calls(), 1);
    assert_eq!(provider.resolve_calls(), 1);
    assert!(session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_connect_requests_initial_status() {
    let (_provider, link, session) = setup();

    assert!(session.connect().await);
    assert_eq!(link.written(), vec![Command::status().to_hex()]);
    assert!(session.is_awaiting_status());
    assert!(!session.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_connect_retries_with_delay() {
    let (_provider, link, session) = setup();
    link.fail_next_connects(2);

    let start = Instant::now();
    assert!(session.connect().await);
    assert_eq!(link.connect_calls(), 3);
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_report_false() {
    let (_provider, link, session) = setup();
    link.fail_next_connects(3);

    assert!(!session.connect().await);
    assert_eq!(link.connect_calls(), 3);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_busy());
    assert!(link.written().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_connect_when_connected_is_immediate() {
    let (_provider, link, session) = setup();
    assert!(session.connect().await);
    assert!(session.connect().await);
    assert_eq!(link.connect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_captures_advertisement_metadata() {
    let (provider, _link, session) = setup();
    provider.set_advertisement(Advertisement {
        local_name: Some("iLink Lamp".into()),
        manufacturer_data: HashMap::from([
            (5101, vec![1, 2, 3, 4]),
            (1494, b"iLink".to_vec()),
        ]),
        services: Vec::new(),
    });

    assert!(session.connect().await);
    let metadata = session.metadata().unwrap();
    assert_eq!(metadata.name.as_deref(), Some("iLink Lamp"));
    assert_eq!(metadata.manufacturer.as_deref(), Some("iLink"));
    assert_eq!(metadata.hw_version.as_deref(), Some("1.2.3.4"));
}

// ---- Writes ----

#[tokio::test(start_paused = true)]
async fn test_second_writer_is_rejected_as_busy() {
    let (_provider, link, session) = setup();
    assert!(session.connect().await);
    link.set_write_delay(Duration::from_millis(500));

    let writer = session.clone();
    let pending = tokio::spawn(async move { writer.turn_on().await });
    settle().await;

    assert!(session.is_busy());
    assert_eq!(session.turn_off().await, Err(SessionError::Busy));
    assert_eq!(session.request_status().await, Err(SessionError::Busy));

    pending.await.unwrap().unwrap();
    assert_eq!(link.written_commands(), vec![Command::on().to_hex()]);
    assert!(!session.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_send_without_connection_reports_not_connected() {
    let (_provider, link, session) = setup();

    assert_eq!(
        session.turn_on().await,
        Err(SessionError::NotConnected {
            address: session.address()
        })
    );
    assert_eq!(session.consecutive_write_errors(), 1);
    assert!(link.written().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_connecting_caller_keeps_link_after_initial_status() {
    let (_provider, link, session) = setup();
    link.reply_to_status_with(reference_frame());

    assert!(session.connect().await);
    settle().await;
    assert!(session.last_status().is_some());
    assert!(session.is_connected());

    assert_eq!(session.turn_on().await, Ok(()));
    assert_eq!(link.written_commands(), vec![Command::on().to_hex()]);
    assert_eq!(session.consecutive_write_errors(), 0);
    assert_eq!(link.disconnect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_write_failures_are_aggregated() {
    let (_provider, link, session) = setup();
    assert!(session.connect().await);
    link.set_fail_writes(true);

    for _ in 0..10 {
        assert_eq!(session.turn_on().await, Ok(()));
    }
    assert_eq!(session.consecutive_write_errors(), 10);

    // the eleventh failure is reported once and the counter starts over
    session.turn_on().await.unwrap();
    assert_eq!(session.consecutive_write_errors(), 0);

    link.set_fail_writes(false);
    session.turn_on().await.unwrap();
    session.turn_off().await.unwrap();
    assert_eq!(session.consecutive_write_errors(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_write_timeout_counts_as_failure() {
    let (_provider, link, session) = setup();
    assert!(session.connect().await);
    link.set_write_delay(Duration::from_secs(5));

    assert_eq!(session.turn_on().await, Ok(()));
    assert_eq!(session.consecutive_write_errors(), 1);
    assert!(!session.state().is_writing());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_values_are_rejected_before_sending() {
    let (_provider, link, session) = setup();
    assert!(session.connect().await);
    let before = link.written().len();

    assert_eq!(
        session.set_brightness(256).await,
        Err(SessionError::Validation(ValidationError::Brightness { value: 256 }))
    );
    assert!(matches!(
        session.set_white_temp(0).await,
        Err(SessionError::Validation(ValidationError::WhiteTempLevel { value: 0 }))
    ));
    assert!(matches!(
        session.set_rgb(0, 0, 256).await,
        Err(SessionError::Validation(ValidationError::RgbChannel { .. }))
    ));
    assert!(matches!(
        session.set_scene(94).await,
        Err(SessionError::Validation(ValidationError::Scene { value: 94 }))
    ));
    assert_eq!(link.written().len(), before);

    session.set_scene(93).await.unwrap();
    session.set_brightness(0).await.unwrap();
    assert_eq!(
        link.written_commands(),
        vec![
            Command::scene(93).unwrap().to_hex(),
            Command::brightness(1).to_hex()
        ]
    );
}

// ---- Notifications & Disconnect ----

#[tokio::test(start_paused = true)]
async fn test_disconnect_waits_for_requested_status() {
    let (_provider, link, session) = setup();
    assert!(session.connect().await);
    assert!(session.is_awaiting_status());

    session.disconnect(false, false).await;
    assert!(session.is_connected());
    assert_eq!(link.disconnect_calls(), 0);

    assert!(link.notify(&reference_frame()));
    settle().await;

    assert!(!session.is_connected());
    assert_eq!(link.disconnect_calls(), 1);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.last_status().unwrap().brightness, 0xFF);
}

#[tokio::test(start_paused = true)]
async fn test_only_if_needed_is_noop_without_deferred_disconnect() {
    let (_provider, link, session) = setup();
    link.reply_to_status_with(reference_frame());
    assert!(session.connect().await);
    settle().await;
    assert_eq!(session.state(), SessionState::Connected(LinkActivity::Idle));

    session.disconnect(false, true).await;
    assert!(session.is_connected());

    session.disconnect(false, false).await;
    assert!(!session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_write_runs_when_write_finishes() {
    let (_provider, link, session) = setup();
    link.reply_to_status_with(reference_frame());
    assert!(session.connect().await);
    settle().await;
    assert!(!session.is_awaiting_status());

    link.set_write_delay(Duration::from_millis(500));
    let writer = session.clone();
    let pending = tokio::spawn(async move { writer.turn_on().await });
    settle().await;
    assert!(session.state().is_writing());

    session.disconnect(false, false).await;
    assert!(session.is_connected());
    assert_eq!(link.disconnect_calls(), 0);

    assert_eq!(pending.await.unwrap(), Ok(()));
    assert_eq!(link.written_commands(), vec![Command::on().to_hex()]);
    assert!(!session.is_connected());
    assert_eq!(link.disconnect_calls(), 1);
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_forced_disconnect_proceeds_while_writing() {
    let (_provider, link, session) = setup();
    assert!(session.connect().await);
    link.set_write_delay(Duration::from_millis(500));

    let writer = session.clone();
    let pending = tokio::spawn(async move { writer.turn_on().await });
    settle().await;
    assert!(session.state().is_writing());

    session.disconnect(true, false).await;
    assert_eq!(link.disconnect_calls(), 1);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_busy());

    pending.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_handle_is_dropped_when_no_status_was_seen() {
    let (provider, _link, session) = setup();
    assert!(session.connect().await);
    session.disconnect(true, false).await;

    assert!(session.connect().await);
    assert_eq!(provider.resolve_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_handle_is_kept_once_status_was_seen() {
    let (provider, link, session) = setup();
    link.reply_to_status_with(reference_frame());
    assert!(session.connect().await);
    settle().await;
    assert!(session.last_status().is_some());

    session.disconnect(true, false).await;
    assert!(session.connect().await);
    assert_eq!(provider.resolve_calls(), 1);
    assert_eq!(link.connect_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_observer_sees_only_status_frames() {
    let (_provider, link, session) = setup();
    let seen: Arc<Mutex<Vec<StatusFrame>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session.set_observer(Arc::new(move |status: &StatusFrame| sink.lock().push(*status)));

    assert!(session.connect().await);

    link.notify(&Command::on().as_bytes().to_vec());
    link.notify(&[0x55, 0xAA, 0x09, 0x88, 0x15]);
    settle().await;
    assert!(seen.lock().is_empty());
    assert!(session.is_awaiting_status());

    link.notify(&reference_frame());
    settle().await;

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].power);
    assert!(!session.is_awaiting_status());
}

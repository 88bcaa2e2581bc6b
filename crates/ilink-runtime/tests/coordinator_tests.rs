//! Coordinator behaviour against the scripted transport

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ilink_ble::testing::{MockLink, MockProvider};
use ilink_core::{
    Advertisement, Command, DeviceAddress, DeviceConfig, DeviceMetadata, Preset, Rgb, StateUpdate,
    ValidationError,
};
use ilink_runtime::{
    CoordinatorConfig, CoordinatorError, DeviceRegistry, LightCoordinator, RegistryError, Session,
    SessionConfig, UpdateOutcome,
};
use parking_lot::Mutex;
use tokio::time::sleep;

const REFERENCE_STATUS: &str = "55aa098815aaaaaaffffff0105ed6c";

#[derive(Default)]
struct RecordingRegistry {
    updates: Mutex<Vec<(DeviceAddress, DeviceMetadata)>>,
}

impl DeviceRegistry for RecordingRegistry {
    fn update_device(
        &self,
        address: &DeviceAddress,
        metadata: &DeviceMetadata,
    ) -> Result<(), RegistryError> {
        self.updates.lock().push((*address, metadata.clone()));
        Ok(())
    }
}

struct Harness {
    provider: Arc<MockProvider>,
    link: Arc<MockLink>,
    registry: Arc<RecordingRegistry>,
    coordinator: Arc<LightCoordinator>,
}

fn harness() -> Harness {
    let provider = MockProvider::new();
    let link = provider.link();
    let address: DeviceAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
    let device = DeviceConfig::new(address, "Desk lamp");
    let session = Session::new(address, provider.clone(), SessionConfig::default());
    let registry = Arc::new(RecordingRegistry::default());
    let coordinator = LightCoordinator::new(
        device,
        session,
        registry.clone(),
        CoordinatorConfig::default(),
    );
    Harness {
        provider,
        link,
        registry,
        coordinator,
    }
}

async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// Keep the session in its connect phase for `duration`
async fn hold_connecting(h: &Harness, duration: Duration) {
    h.link.set_connect_delay(duration);
    let session = h.coordinator.session().clone();
    tokio::spawn(async move { session.connect().await });
    settle().await;
    assert!(h.coordinator.session().is_busy());
}

fn brightness_writes(link: &MockLink) -> Vec<String> {
    let prefix = &Command::brightness(1).to_hex()[..10];
    link.written()
        .into_iter()
        .filter(|frame| frame.starts_with(prefix))
        .collect()
}

// ---- Updates ----

#[tokio::test(start_paused = true)]
async fn test_update_applies_immediately_when_free() {
    let h = harness();

    let outcome = h.coordinator.update_state(StateUpdate::Power(false)).await;
    assert_eq!(outcome, Ok(UpdateOutcome::Applied));
    assert_eq!(h.link.written_commands(), vec![Command::off().to_hex()]);
    assert!(!h.coordinator.state().power);
    assert!(h.coordinator.is_fast_polling());
}

#[tokio::test(start_paused = true)]
async fn test_busy_updates_collapse_into_the_last_one() {
    let h = harness();
    hold_connecting(&h, Duration::from_secs(10)).await;

    for value in [10, 20, 30] {
        let outcome = h.coordinator.update_state(StateUpdate::Brightness(value)).await;
        assert_eq!(outcome, Ok(UpdateOutcome::Deferred));
    }
    assert_eq!(h.coordinator.pending_update(), Some(StateUpdate::Brightness(30)));
    assert_eq!(h.coordinator.deferral_count(), 3);

    sleep(Duration::from_secs(12)).await;

    assert_eq!(brightness_writes(&h.link), vec![Command::brightness(30).to_hex()]);
    assert_eq!(h.coordinator.state().brightness, 30);
    assert_eq!(h.coordinator.pending_update(), None);
    assert_eq!(h.coordinator.deferral_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_tenth_busy_update_is_forced_through() {
    let h = harness();
    hold_connecting(&h, Duration::from_secs(100)).await;

    for value in 1..=9 {
        let outcome = h.coordinator.update_state(StateUpdate::Brightness(value)).await;
        assert_eq!(outcome, Ok(UpdateOutcome::Deferred));
    }

    // joins the connect in flight and writes once it completes
    let outcome = h.coordinator.update_state(StateUpdate::Brightness(100)).await;
    assert_eq!(outcome, Ok(UpdateOutcome::Applied));
    assert_eq!(h.coordinator.deferral_count(), 0);
    assert_eq!(h.coordinator.pending_update(), None);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(brightness_writes(&h.link), vec![Command::brightness(100).to_hex()]);
}

#[tokio::test(start_paused = true)]
async fn test_forced_update_surfaces_busy_link() {
    let h = harness();
    let session = h.coordinator.session().clone();
    assert!(session.connect().await);

    h.link.set_write_delay(Duration::from_millis(900));
    let writer = session.clone();
    let pending = tokio::spawn(async move { writer.turn_on().await });
    settle().await;

    for _ in 0..9 {
        let outcome = h.coordinator.update_state(StateUpdate::Power(false)).await;
        assert_eq!(outcome, Ok(UpdateOutcome::Deferred));
    }
    let outcome = h.coordinator.update_state(StateUpdate::Power(false)).await;
    assert_eq!(outcome, Err(CoordinatorError::Busy));
    assert!(h.coordinator.state().power);

    pending.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_update_fails_when_connect_fails() {
    let h = harness();
    h.link.fail_next_connects(3);

    let outcome = h.coordinator.update_state(StateUpdate::Power(false)).await;
    assert!(matches!(outcome, Err(CoordinatorError::NotConnected { .. })));
    assert!(h.coordinator.state().power);
    assert!(!h.coordinator.is_fast_polling());
}

#[tokio::test(start_paused = true)]
async fn test_color_changes_reassert_brightness() {
    let h = harness();
    h.coordinator
        .update_state(StateUpdate::Brightness(80))
        .await
        .unwrap();

    h.coordinator
        .update_state(StateUpdate::ColorTemp(3200))
        .await
        .unwrap();
    h.coordinator
        .update_state(StateUpdate::Rgb(Rgb::new(1, 2, 3)))
        .await
        .unwrap();

    assert_eq!(
        h.link.written_commands(),
        vec![
            Command::brightness(80).to_hex(),
            Command::white_temp(5).to_hex(),
            Command::brightness(80).to_hex(),
            Command::rgb(1, 2, 3).to_hex(),
            Command::brightness(80).to_hex(),
        ]
    );

    let state = h.coordinator.state();
    assert_eq!(state.color_temp_kelvin, 3000);
    assert_eq!(state.rgb, Rgb::new(1, 2, 3));
    assert_eq!(state.brightness, 80);
}

#[tokio::test(start_paused = true)]
async fn test_status_between_color_and_brightness_still_reasserts() {
    let h = harness();
    // a poll leaves the link awaiting status with a disconnect deferred
    h.coordinator.refresh().await;
    assert!(h.coordinator.session().is_awaiting_status());

    let coordinator = Arc::clone(&h.coordinator);
    let update =
        tokio::spawn(async move { coordinator.update_state(StateUpdate::ColorTemp(3000)).await });
    settle().await;
    assert_eq!(h.link.written_commands(), vec![Command::white_temp(5).to_hex()]);

    // the light answers while the brightness re-assert is still waiting
    assert!(h.link.notify(&hex::decode(REFERENCE_STATUS).unwrap()));

    assert_eq!(update.await.unwrap(), Ok(UpdateOutcome::Applied));
    assert_eq!(
        h.link.written_commands(),
        vec![
            Command::white_temp(5).to_hex(),
            Command::brightness(255).to_hex()
        ]
    );
    assert_eq!(h.coordinator.state().color_temp_kelvin, 3000);
    assert_eq!(h.coordinator.session().consecutive_write_errors(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_first_update_on_answering_light_reaches_the_device() {
    let h = harness();
    h.link.reply_to_status_with(hex::decode(REFERENCE_STATUS).unwrap());

    let outcome = h.coordinator.update_state(StateUpdate::ColorTemp(3000)).await;
    assert_eq!(outcome, Ok(UpdateOutcome::Applied));
    assert_eq!(
        h.link.written_commands(),
        vec![
            Command::white_temp(5).to_hex(),
            Command::brightness(255).to_hex()
        ]
    );
    assert_eq!(h.coordinator.session().consecutive_write_errors(), 0);
    assert_eq!(h.coordinator.state().color_temp_kelvin, 3000);
}

#[tokio::test(start_paused = true)]
async fn test_scene_update_is_recorded() {
    let h = harness();
    h.coordinator.update_state(StateUpdate::Scene(12)).await.unwrap();
    assert_eq!(h.link.written_commands(), vec![Command::scene(12).unwrap().to_hex()]);
    assert_eq!(h.coordinator.state().scene, Some(12));
}

#[tokio::test(start_paused = true)]
async fn test_textual_updates() {
    let h = harness();

    assert_eq!(
        h.coordinator.update_key("effect", "rainbow").await,
        Ok(UpdateOutcome::NotHandled)
    );
    assert_eq!(
        h.coordinator.update_key("brightness", "300").await,
        Err(CoordinatorError::Validation(ValidationError::Brightness { value: 300 }))
    );
    assert_eq!(
        h.coordinator.update_key("scene", "0").await,
        Err(CoordinatorError::Validation(ValidationError::Scene { value: 0 }))
    );
    assert!(h.link.written_commands().is_empty());

    assert_eq!(
        h.coordinator.update_key("power", "off").await,
        Ok(UpdateOutcome::Applied)
    );
    assert!(!h.coordinator.state().power);
}

#[tokio::test(start_paused = true)]
async fn test_sleep_preset_sets_candle_light_then_dims() {
    let h = harness();

    let outcomes = h.coordinator.apply_preset(Preset::Sleep).await.unwrap();
    assert_eq!(outcomes, vec![UpdateOutcome::Applied, UpdateOutcome::Applied]);

    let state = h.coordinator.state();
    assert_eq!(state.color_temp_kelvin, 3000);
    assert_eq!(state.brightness, 4);
    assert_eq!(
        h.link.written_commands().last(),
        Some(&Command::brightness(4).to_hex())
    );
}

// ---- Polling ----

#[tokio::test(start_paused = true)]
async fn test_refresh_merges_reported_status() {
    let h = harness();
    h.link.reply_to_status_with(hex::decode(REFERENCE_STATUS).unwrap());
    let mut updates = h.coordinator.subscribe();

    h.coordinator.refresh().await;
    updates.changed().await.unwrap();
    settle().await;

    let state = h.coordinator.state();
    assert!(state.power);
    assert_eq!(state.brightness, 0xFF);
    assert_eq!(state.rgb, Rgb::new(0xAA, 0xAA, 0xAA));
    assert_eq!(state.color_temp_kelvin, 4000);

    // the link is released once the requested status arrived
    assert!(!h.coordinator.session().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_busy_refresh_skips_transport_and_polls_fast() {
    let h = harness();
    hold_connecting(&h, Duration::from_secs(10)).await;
    let before = h.coordinator.state();

    let state = h.coordinator.refresh().await;
    assert_eq!(state, before);
    assert!(h.coordinator.is_fast_polling());
    assert_eq!(h.link.connect_calls(), 1);
    assert!(h.link.written().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_two_fast_polls_follow_a_write() {
    let h = harness();
    let device = h.coordinator.device().clone();
    let fast = device.fast_poll_interval();
    let normal = device.normal_poll_interval();

    h.coordinator.update_state(StateUpdate::Power(true)).await.unwrap();
    assert_eq!(h.coordinator.poll_interval(), fast);

    h.coordinator.refresh().await;
    assert_eq!(h.coordinator.poll_interval(), fast);

    h.coordinator.refresh().await;
    assert_eq!(h.coordinator.poll_interval(), normal);
}

#[tokio::test(start_paused = true)]
async fn test_poller_rearms_after_a_write() {
    let h = harness();
    h.link.reply_to_status_with(hex::decode(REFERENCE_STATUS).unwrap());
    let fast = h.coordinator.device().fast_poll_interval();

    h.coordinator.start();
    settle().await;
    assert!(!h.coordinator.is_fast_polling());

    h.coordinator.update_state(StateUpdate::Power(false)).await.unwrap();
    assert!(h.coordinator.is_fast_polling());

    // first fast tick
    sleep(fast + Duration::from_millis(10)).await;
    assert!(h.coordinator.is_fast_polling());

    // second fast tick reverts to normal polling
    sleep(fast).await;
    assert!(!h.coordinator.is_fast_polling());

    h.coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_metadata_is_registered_once() {
    let h = harness();
    h.provider.set_advertisement(Advertisement {
        local_name: Some("iLink Lamp".into()),
        manufacturer_data: HashMap::from([(5101, vec![2, 0, 1, 7])]),
        services: Vec::new(),
    });

    h.coordinator.refresh().await;
    assert!(h.registry.updates.lock().is_empty());

    h.coordinator.refresh().await;
    h.coordinator.refresh().await;

    let updates = h.registry.updates.lock();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].1.hw_version.as_deref(), Some("2.0.1.7"));
    assert_eq!(updates[0].1.name.as_deref(), Some("iLink Lamp"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_forces_disconnect() {
    let h = harness();
    h.coordinator.refresh().await;
    assert!(h.coordinator.session().is_connected());
    assert!(h.coordinator.session().is_awaiting_status());

    h.coordinator.shutdown().await;
    assert!(!h.coordinator.session().is_connected());
    assert_eq!(h.link.disconnect_calls(), 1);
}

//! Poll and update coordinator for one light
//!
//! The coordinator decides when the session talks to the device. A
//! background poller refreshes the status on the adaptive schedule from
//! [`crate::poll`]; state changes requested while the link is busy are
//! debounced instead of dropped, last write wins. The merged
//! [`LogicalState`] is published on a watch channel.

use std::sync::{Arc, Weak};
use std::time::Duration;

use ilink_ble::Session;
use ilink_core::{
    ColorTempLevel, DeviceAddress, DeviceConfig, LogicalState, Preset, StateUpdate, StatusFrame,
};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::poll::PollSchedule;
use crate::registry::DeviceRegistry;

// ----------------------------------------------------------------------------
// Types
// ----------------------------------------------------------------------------

/// What happened to a requested state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Written to the device and merged into the logical state
    Applied,
    /// The link was busy; the write runs after the debounce delay
    Deferred,
    /// The key doesn't name a light attribute
    NotHandled,
}

struct DeferredUpdate {
    generation: u64,
    update: StateUpdate,
    task: JoinHandle<()>,
}

struct CoordinatorInner {
    poll: PollSchedule,
    initialized: bool,
    force_status_request: bool,
    deferred: Option<DeferredUpdate>,
    deferral_count: u32,
    generation: u64,
}

// ----------------------------------------------------------------------------
// Coordinator
// ----------------------------------------------------------------------------

/// Drives one [`Session`] and owns the light's logical state
pub struct LightCoordinator {
    device: DeviceConfig,
    config: CoordinatorConfig,
    session: Session,
    registry: Arc<dyn DeviceRegistry>,
    state_tx: watch::Sender<LogicalState>,
    inner: Mutex<CoordinatorInner>,
    reschedule: Notify,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl LightCoordinator {
    /// Create a coordinator and register it as the session's status observer
    pub fn new(
        device: DeviceConfig,
        session: Session,
        registry: Arc<dyn DeviceRegistry>,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(LogicalState::default());
        let coordinator = Arc::new(Self {
            inner: Mutex::new(CoordinatorInner {
                poll: PollSchedule::from_device(&device),
                initialized: false,
                force_status_request: true,
                deferred: None,
                deferral_count: 0,
                generation: 0,
            }),
            device,
            config,
            session,
            registry,
            state_tx,
            reschedule: Notify::new(),
            poller: Mutex::new(None),
        });

        let weak: Weak<Self> = Arc::downgrade(&coordinator);
        coordinator
            .session
            .set_observer(Arc::new(move |status: &StatusFrame| {
                if let Some(coordinator) = weak.upgrade() {
                    coordinator.on_status(status);
                }
            }));

        coordinator
    }

    pub fn address(&self) -> DeviceAddress {
        self.device.address
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current logical state
    pub fn state(&self) -> LogicalState {
        *self.state_tx.borrow()
    }

    /// Watch logical state changes
    pub fn subscribe(&self) -> watch::Receiver<LogicalState> {
        self.state_tx.subscribe()
    }

    /// Time until the next background poll
    pub fn poll_interval(&self) -> Duration {
        self.inner.lock().poll.interval()
    }

    pub fn is_fast_polling(&self) -> bool {
        self.inner.lock().poll.is_fast()
    }

    /// Consecutive writes deferred because the link was busy
    pub fn deferral_count(&self) -> u32 {
        self.inner.lock().deferral_count
    }

    /// Update waiting for the debounce delay, if any
    pub fn pending_update(&self) -> Option<StateUpdate> {
        self.inner.lock().deferred.as_ref().map(|d| d.update)
    }

    fn on_status(&self, status: &StatusFrame) {
        self.state_tx.send_modify(|state| state.apply_status(status));
        self.inner.lock().force_status_request = false;
        debug!("{} state merged from status", self.device.address);
    }

    fn set_poll_fast(&self) {
        self.inner.lock().poll.set_fast();
        // only wakes a sleeping poller; a refresh in progress picks the new interval up itself
        self.reschedule.notify_waiters();
    }

    // ---- Polling ----

    /// One poll cycle
    ///
    /// Skipped while the session is busy, in which case fast polling is
    /// re-armed so the next attempt comes soon.
    pub async fn refresh(&self) -> LogicalState {
        let address = self.device.address;
        if self.session.is_busy() {
            debug!("{} is busy, skipping refresh", address);
            self.set_poll_fast();
            return self.state();
        }

        let initialized = {
            let mut inner = self.inner.lock();
            inner.poll.record_tick();
            inner.initialized
        };

        if !initialized {
            if let Err(e) = self.register_device() {
                warn!("Failed to initialize {}: {}", address, e);
            }
        }

        let force = self.inner.lock().force_status_request;
        if !self.session.is_awaiting_status() || force {
            if self.session.connect().await {
                if let Err(e) = self.session.request_status().await {
                    debug!("Status request to {} skipped: {}", address, e);
                }
            }
        }

        // released as soon as the requested status arrives
        self.session.disconnect(false, false).await;

        // the next cycle always re-checks
        self.inner.lock().force_status_request = true;
        self.state()
    }

    /// Hand advertisement metadata to the registry once it is known
    ///
    /// Returns whether the device is registered.
    pub fn register_device(&self) -> Result<bool> {
        if self.inner.lock().initialized {
            return Ok(true);
        }
        let Some(metadata) = self.session.metadata() else {
            return Ok(false);
        };

        self.inner.lock().initialized = true;
        self.registry.update_device(&self.device.address, &metadata)?;
        info!("Registered {} ({:?})", self.device.address, metadata.name);
        Ok(true)
    }

    /// Run the background poller until [`LightCoordinator::shutdown`]
    pub fn start(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move {
            info!("Polling {} every {:?}", coordinator.device.address, coordinator.poll_interval());
            coordinator.refresh().await;
            loop {
                let interval = coordinator.poll_interval();
                tokio::select! {
                    _ = sleep(interval) => {
                        coordinator.refresh().await;
                    }
                    _ = coordinator.reschedule.notified() => {
                        debug!(
                            "Poll interval for {} changed to {:?}",
                            coordinator.device.address,
                            coordinator.poll_interval()
                        );
                    }
                }
            }
        });

        if let Some(previous) = self.poller.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stop polling, drop any deferred update and force the link down
    pub async fn shutdown(&self) {
        if let Some(poller) = self.poller.lock().take() {
            poller.abort();
        }
        self.cancel_deferred();
        self.session.close().await;
        info!("Coordinator for {} shut down", self.device.address);
    }

    // ---- Updates ----

    /// Request a state change
    ///
    /// Applied immediately when the link is free. While it is busy the
    /// change replaces any pending one and runs after the debounce delay;
    /// once too many changes in a row were deferred the next one is forced
    /// through so a persistent failure reaches the caller.
    pub async fn update_state(self: &Arc<Self>, update: StateUpdate) -> Result<UpdateOutcome> {
        update.validate()?;
        if let Some(superseded) = self.cancel_deferred() {
            debug!("{} superseded deferred update {:?}", self.device.address, superseded);
        }

        if !self.session.is_busy() {
            self.inner.lock().deferral_count = 0;
            self.apply_update(update).await?;
            return Ok(UpdateOutcome::Applied);
        }

        let forced = {
            let mut inner = self.inner.lock();
            inner.deferral_count += 1;
            if inner.deferral_count > self.config.max_deferrals {
                inner.deferral_count = 0;
                true
            } else {
                false
            }
        };

        if forced {
            warn!(
                "{} still busy after {} deferred updates, sending anyway",
                self.device.address, self.config.max_deferrals
            );
            self.apply_update(update).await?;
            return Ok(UpdateOutcome::Applied);
        }

        self.schedule_deferred(update);
        Ok(UpdateOutcome::Deferred)
    }

    /// Request a state change from a textual key and value
    pub async fn update_key(self: &Arc<Self>, key: &str, value: &str) -> Result<UpdateOutcome> {
        match StateUpdate::from_key_value(key, value)? {
            Some(update) => self.update_state(update).await,
            None => {
                debug!("{} ignoring unknown key {:?}", self.device.address, key);
                Ok(UpdateOutcome::NotHandled)
            }
        }
    }

    /// Apply a preset as its two dependent updates
    pub async fn apply_preset(self: &Arc<Self>, preset: Preset) -> Result<Vec<UpdateOutcome>> {
        let [first, second] = preset.updates();
        let first = self.update_state(first).await?;
        sleep(self.config.command_gap).await;
        let second = self.update_state(second).await?;
        Ok(vec![first, second])
    }

    fn schedule_deferred(self: &Arc<Self>, update: StateUpdate) {
        let weak = Arc::downgrade(self);
        let delay = self.config.debounce_delay;

        let mut inner = self.inner.lock();
        inner.generation += 1;
        let generation = inner.generation;
        let task = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(coordinator) = weak.upgrade() {
                coordinator.run_deferred(generation).await;
            }
        });
        inner.deferred = Some(DeferredUpdate {
            generation,
            update,
            task,
        });
        debug!("{} deferred update {:?}", self.device.address, update);
    }

    async fn run_deferred(&self, generation: u64) {
        let update = {
            let mut inner = self.inner.lock();
            let current = inner
                .deferred
                .as_ref()
                .is_some_and(|d| d.generation == generation);
            if !current {
                return;
            }
            inner.deferral_count = 0;
            match inner.deferred.take() {
                Some(deferred) => deferred.update,
                None => return,
            }
        };

        debug!("{} running deferred update {:?}", self.device.address, update);
        if let Err(e) = self.apply_update(update).await {
            warn!("Deferred update of {} failed: {}", self.device.address, e);
        }
    }

    fn cancel_deferred(&self) -> Option<StateUpdate> {
        let deferred = self.inner.lock().deferred.take()?;
        deferred.task.abort();
        Some(deferred.update)
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.session.connect().await {
            Ok(())
        } else {
            Err(CoordinatorError::NotConnected {
                address: self.device.address,
            })
        }
    }

    async fn apply_update(&self, update: StateUpdate) -> Result<()> {
        update.validate()?;
        self.inner.lock().force_status_request = true;
        self.ensure_connected().await?;

        match update {
            StateUpdate::Power(true) => self.session.turn_on().await?,
            StateUpdate::Power(false) => self.session.turn_off().await?,
            StateUpdate::Brightness(value) => self.session.set_brightness(value).await?,
            StateUpdate::ColorTemp(kelvin) => {
                let level = ColorTempLevel::from_kelvin(kelvin);
                self.session.set_white_temp(i64::from(level.get())).await?;
                // the device resets brightness on a temperature change
                self.reassert_brightness().await?;
            }
            StateUpdate::Rgb(rgb) => {
                self.session
                    .set_rgb(i64::from(rgb.r), i64::from(rgb.g), i64::from(rgb.b))
                    .await?;
                self.reassert_brightness().await?;
            }
            StateUpdate::Scene(id) => self.session.set_scene(id).await?,
        }

        self.state_tx.send_modify(|state| state.apply_update(&update));
        info!("Updated {} {}: {:?}", self.device.address, update.key(), update);
        self.set_poll_fast();
        Ok(())
    }

    async fn reassert_brightness(&self) -> Result<()> {
        sleep(self.config.command_gap).await;
        self.ensure_connected().await?;
        let brightness = self.state().brightness;
        self.session.set_brightness(i64::from(brightness)).await?;
        Ok(())
    }
}

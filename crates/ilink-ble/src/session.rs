//! Light session: the single owner of one device's connection
//!
//! The session arbitrates the link between callers. Connect attempts are
//! single-flight, writes are exclusive, and disconnects are deferred while a
//! write is outstanding or a requested status has not arrived. Transport
//! failures are logged and absorbed here; callers only see [`SessionError`].

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use ilink_core::{Command, DeviceAddress, DeviceMetadata, Rgb, StatusFrame, ValidationError};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{BleError, LinkResult, SessionError};
use crate::link::{LightLink, LinkProvider};
use crate::protocol::{ILINK_COMMAND_CHARACTERISTIC_UUID, ILINK_STATUS_CHARACTERISTIC_UUID};
use crate::state::{LinkActivity, SessionState};

// ----------------------------------------------------------------------------
// Status Observer
// ----------------------------------------------------------------------------

/// Receives every status frame the device reports
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, status: &StatusFrame);
}

impl<F> StatusObserver for F
where
    F: Fn(&StatusFrame) + Send + Sync,
{
    fn on_status(&self, status: &StatusFrame) {
        self(status)
    }
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

type ConnectFlight = Shared<BoxFuture<'static, bool>>;

/// Session to one light
///
/// Cloning is cheap and every clone drives the same link.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    address: DeviceAddress,
    config: SessionConfig,
    provider: Arc<dyn LinkProvider>,
    slot: Mutex<Slot>,
    write_errors: AtomicU32,
}

#[derive(Default)]
struct Slot {
    state: SessionState,
    link: Option<Arc<dyn LightLink>>,
    disconnect_pending: bool,
    last_status: Option<StatusFrame>,
    metadata: Option<DeviceMetadata>,
    observer: Option<Arc<dyn StatusObserver>>,
    connect_flight: Option<ConnectFlight>,
    notification_pump: Option<JoinHandle<()>>,
}

impl Session {
    /// Create a session for `address`; nothing is connected until [`Session::connect`]
    pub fn new(
        address: DeviceAddress,
        provider: Arc<dyn LinkProvider>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                address,
                config,
                provider,
                slot: Mutex::new(Slot::default()),
                write_errors: AtomicU32::new(0),
            }),
        }
    }

    /// Register the observer status frames are delivered to
    pub fn set_observer(&self, observer: Arc<dyn StatusObserver>) {
        self.inner.slot.lock().observer = Some(observer);
    }

    pub fn address(&self) -> DeviceAddress {
        self.inner.address
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.slot.lock().state
    }

    /// Latest status the device reported
    pub fn last_status(&self) -> Option<StatusFrame> {
        self.inner.slot.lock().last_status
    }

    /// Device metadata captured from the advertisement at connect time
    pub fn metadata(&self) -> Option<DeviceMetadata> {
        self.inner.slot.lock().metadata.clone()
    }

    /// Live state of the transport handle
    pub fn is_connected(&self) -> bool {
        self.inner
            .slot
            .lock()
            .link
            .as_ref()
            .is_some_and(|link| link.is_connected())
    }

    /// True while a connect is in flight or a write is outstanding on a live link
    pub fn is_busy(&self) -> bool {
        let slot = self.inner.slot.lock();
        Self::busy(&slot)
    }

    /// True while a requested status has not arrived
    pub fn is_awaiting_status(&self) -> bool {
        self.inner.slot.lock().state.is_awaiting_status()
    }

    /// Write failures since the last success or aggregated report
    pub fn consecutive_write_errors(&self) -> u32 {
        self.inner.write_errors.load(Ordering::Relaxed)
    }

    fn busy(slot: &Slot) -> bool {
        let live = slot.link.as_ref().is_some_and(|link| link.is_connected());
        slot.connect_flight.is_some() || (slot.state.is_writing() && live)
    }

    // ---- Connection ----

    /// Connect with the configured number of attempts
    pub async fn connect(&self) -> bool {
        self.connect_with_retries(self.inner.config.connect_retries)
            .await
    }

    /// Connect, joining the attempt already in flight if there is one
    ///
    /// Returns whether the session ends up connected. Exhausted retries are
    /// logged, never raised.
    pub async fn connect_with_retries(&self, max_retries: u32) -> bool {
        let flight = {
            let mut slot = self.inner.slot.lock();
            if let Some(flight) = slot.connect_flight.clone() {
                flight
            } else {
                if slot.link.as_ref().is_some_and(|link| link.is_connected()) {
                    if !slot.state.is_connected() {
                        slot.state = SessionState::Connected(LinkActivity::Idle);
                    }
                    // the caller is about to use the link
                    slot.disconnect_pending = false;
                    return true;
                }

                slot.state = SessionState::Connecting;
                let session = self.clone();
                // the attempt runs on its own task so a cancelled caller can't strand it
                let task = tokio::spawn(async move { session.run_connect(max_retries).await });
                let flight = async move { task.await.unwrap_or(false) }
                    .boxed()
                    .shared();
                slot.connect_flight = Some(flight.clone());
                flight
            }
        };
        flight.await
    }

    async fn run_connect(&self, max_retries: u32) -> bool {
        let address = self.inner.address;
        let attempts = max_retries.max(1);
        debug!("Connecting to {}", address);

        let mut connected = None;
        for attempt in 1..=attempts {
            match self.try_connect().await {
                Ok(link) => {
                    connected = Some(link);
                    break;
                }
                Err(e) if attempt == attempts => {
                    info!("Not able to connect to {}: {}", address, e);
                }
                Err(e) => {
                    debug!("Connect attempt {} to {} failed: {}, retrying", attempt, address, e);
                    sleep(self.inner.config.retry_delay).await;
                }
            }
        }

        if let Some(link) = &connected {
            info!("Connected to {}", address);
            self.initialize(link).await;
        }

        let mut slot = self.inner.slot.lock();
        slot.connect_flight = None;
        let live = slot.link.as_ref().is_some_and(|link| link.is_connected());
        if live {
            // disconnects deferred during setup belong to the initial status
            // request; the caller that connected still needs the link
            slot.disconnect_pending = false;
        } else {
            slot.state = SessionState::Idle;
        }
        live
    }

    async fn try_connect(&self) -> LinkResult<Arc<dyn LightLink>> {
        let existing = self.inner.slot.lock().link.clone();
        let link = match existing {
            Some(link) => link,
            None => self.inner.provider.resolve(&self.inner.address).await?,
        };

        timeout(self.inner.config.connect_timeout, link.connect())
            .await
            .map_err(|_| BleError::ConnectionTimeout)??;

        let mut slot = self.inner.slot.lock();
        slot.link = Some(Arc::clone(&link));
        slot.state = SessionState::Connected(LinkActivity::Idle);
        slot.disconnect_pending = false;
        Ok(link)
    }

    /// Post-connect setup: metadata, status subscription and initial status request
    async fn initialize(&self, link: &Arc<dyn LightLink>) {
        let address = self.inner.address;

        if let Some(advertisement) = self.inner.provider.advertisement(&address).await {
            let metadata = DeviceMetadata::from_advertisement(&advertisement);
            debug!("Advertisement metadata for {}: {:?}", address, metadata);
            if !metadata.is_empty() {
                self.inner.slot.lock().metadata = Some(metadata);
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = link.subscribe(ILINK_STATUS_CHARACTERISTIC_UUID, tx).await {
            warn!("Initialize error for {}: {}", address, e);
            return;
        }
        self.spawn_notification_pump(rx);

        let needs_status = self.inner.slot.lock().last_status.is_none();
        if needs_status {
            // a busy or dropped link only skips the initial request
            if let Err(e) = self.request_status().await {
                debug!("Initial status request to {} skipped: {}", address, e);
            }
        }
        debug!("Initialized {}", address);
    }

    fn spawn_notification_pump(&self, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let pump = tokio::spawn(async move {
            while let Some(data) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Session { inner }.handle_notification(&data).await;
            }
        });

        if let Some(previous) = self.inner.slot.lock().notification_pump.replace(pump) {
            previous.abort();
        }
    }

    /// Release the link
    ///
    /// Without `force` the disconnect is deferred while the link is busy or a
    /// status is awaited. `only_if_needed` makes this a no-op unless an
    /// earlier disconnect was deferred. Transport errors are only logged.
    pub async fn disconnect(&self, force: bool, only_if_needed: bool) {
        let address = self.inner.address;
        let link = {
            let mut slot = self.inner.slot.lock();
            if !force {
                if Self::busy(&slot) || slot.state.is_awaiting_status() {
                    if !slot.disconnect_pending {
                        debug!("Deferring disconnect of {}", address);
                    }
                    slot.disconnect_pending = true;
                    return;
                }
                if only_if_needed && !slot.disconnect_pending {
                    return;
                }
            }

            slot.disconnect_pending = false;
            slot.state = SessionState::Idle;

            let live = slot.link.as_ref().is_some_and(|link| link.is_connected());
            if !live {
                return;
            }
            // a device that never reported status gets a fresh handle next time
            if slot.last_status.is_some() {
                slot.link.clone()
            } else {
                slot.link.take()
            }
        };

        if let Some(link) = link {
            debug!("Disconnecting {}", address);
            if let Err(e) = link.disconnect().await {
                warn!("Error disconnecting {}: {}", address, e);
            }
        }
    }

    /// Force the link down and stop listening for notifications
    pub async fn close(&self) {
        self.disconnect(true, false).await;
        if let Some(pump) = self.inner.slot.lock().notification_pump.take() {
            pump.abort();
        }
    }

    // ---- Notifications ----

    /// Process one raw notification from the status characteristic
    pub async fn handle_notification(&self, data: &[u8]) {
        let address = self.inner.address;
        debug!("Notification from {}: {}", address, hex::encode(data));

        if let Some(status) = StatusFrame::parse(data) {
            info!("Status received from {}: {:?}", address, status);
            let observer = {
                let mut slot = self.inner.slot.lock();
                slot.last_status = Some(status);
                slot.state.status_received();
                slot.observer.clone()
            };
            if let Some(observer) = observer {
                observer.on_status(&status);
            }
        }

        self.disconnect(false, true).await;
    }

    // ---- Writes ----

    /// Write a command to the device
    ///
    /// Fails with [`SessionError::Busy`] while another write is outstanding
    /// and with [`SessionError::NotConnected`] when there is no live link.
    /// Transport failures on a live link are counted and logged.
    pub async fn send(&self, command: &Command) -> Result<(), SessionError> {
        self.write_command(command, false).await
    }

    /// Ask the device to report its status
    pub async fn request_status(&self) -> Result<(), SessionError> {
        debug!("Requesting status from {}", self.inner.address);
        self.write_command(&Command::status(), true).await
    }

    async fn write_command(&self, command: &Command, expect_status: bool) -> Result<(), SessionError> {
        let address = self.inner.address;
        debug!("Send command to {}: {}", address, command);

        let link = {
            let mut slot = self.inner.slot.lock();
            if slot.state.is_writing() {
                return Err(SessionError::Busy);
            }
            match slot.link.clone().filter(|link| link.is_connected()) {
                Some(link) => {
                    slot.state.begin_write(expect_status);
                    Some(link)
                }
                None => None,
            }
        };

        let Some(link) = link else {
            self.record_write_failure(&BleError::NotConnected);
            return Err(SessionError::NotConnected { address });
        };

        let result = timeout(
            self.inner.config.write_timeout,
            link.write(ILINK_COMMAND_CHARACTERISTIC_UUID, command.as_bytes(), true),
        )
        .await
        .map_err(|_| BleError::WriteTimeout)
        .and_then(|result| result);

        self.inner.slot.lock().state.finish_write();

        match result {
            Ok(()) => self.inner.write_errors.store(0, Ordering::Relaxed),
            Err(e) => self.record_write_failure(&e),
        }

        self.disconnect(false, true).await;
        Ok(())
    }

    fn record_write_failure(&self, error: &BleError) {
        let count = self.inner.write_errors.fetch_add(1, Ordering::Relaxed) + 1;
        if count > self.inner.config.write_error_threshold {
            warn!(
                "{} errors occurred sending commands to {}, last: {}",
                count, self.inner.address, error
            );
            self.inner.write_errors.store(0, Ordering::Relaxed);
        } else {
            debug!("Send command to {} failed: {}", self.inner.address, error);
        }
    }

    // ---- Semantic Commands ----

    pub async fn turn_on(&self) -> Result<(), SessionError> {
        debug!("turn_on {}", self.inner.address);
        self.send(&Command::on()).await
    }

    pub async fn turn_off(&self) -> Result<(), SessionError> {
        debug!("turn_off {}", self.inner.address);
        self.send(&Command::off()).await
    }

    /// Set raw brightness, `0..=255`
    pub async fn set_brightness(&self, value: i64) -> Result<(), SessionError> {
        if !(0..=0xFF).contains(&value) {
            return Err(ValidationError::Brightness { value }.into());
        }
        debug!("set_brightness {}: {}", self.inner.address, value);
        self.send(&Command::brightness(value)).await
    }

    /// Set white temperature level, `1..=5`
    pub async fn set_white_temp(&self, level: i64) -> Result<(), SessionError> {
        if !(1..=5).contains(&level) {
            return Err(ValidationError::WhiteTempLevel { value: level }.into());
        }
        debug!("set_white_temp {}: {}", self.inner.address, level);
        self.send(&Command::white_temp(level)).await
    }

    /// Set RGB color, each channel `0..=255`
    pub async fn set_rgb(&self, r: i64, g: i64, b: i64) -> Result<(), SessionError> {
        let rgb = Rgb::from_channels(r, g, b)?;
        debug!("set_rgb {}: {}", self.inner.address, rgb);
        self.send(&Command::rgb(rgb.r, rgb.g, rgb.b)).await
    }

    /// Start a built-in scene, `1..=93`
    pub async fn set_scene(&self, id: i64) -> Result<(), SessionError> {
        let command = Command::scene(id)?;
        debug!("set_scene {}: {}", self.inner.address, id);
        self.send(&command).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.inner.address)
            .field("state", &self.state())
            .finish()
    }
}

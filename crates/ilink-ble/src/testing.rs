//! Scripted in-memory transport for tests

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ilink_core::{Advertisement, Command, DeviceAddress};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{BleError, LinkResult};
use crate::link::{LightLink, LinkProvider, NotificationSender};

// ----------------------------------------------------------------------------
// Mock Link
// ----------------------------------------------------------------------------

/// In-memory light that records traffic and replays scripted behaviour
#[derive(Default)]
pub struct MockLink {
    connected: AtomicBool,
    connect_calls: AtomicU32,
    disconnect_calls: AtomicU32,
    connect_failures: AtomicU32,
    fail_writes: AtomicBool,
    connect_delay: Mutex<Duration>,
    write_delay: Mutex<Duration>,
    status_reply: Mutex<Option<Vec<u8>>>,
    writes: Mutex<Vec<Vec<u8>>>,
    sink: Mutex<Option<NotificationSender>>,
}

impl MockLink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `count` connect attempts fail
    pub fn fail_next_connects(&self, count: u32) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Answer every status request with `frame`
    pub fn reply_to_status_with(&self, frame: Vec<u8>) {
        *self.status_reply.lock() = Some(frame);
    }

    /// Push a notification to the subscriber, returning whether one was listening
    pub fn notify(&self, data: &[u8]) -> bool {
        match self.sink.lock().as_ref() {
            Some(sink) => sink.send(data.to_vec()).is_ok(),
            None => false,
        }
    }

    /// Simulate the device going out of range
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Every frame written so far, as hex
    pub fn written(&self) -> Vec<String> {
        self.writes.lock().iter().map(hex::encode).collect()
    }

    /// Written frames other than status requests, as hex
    pub fn written_commands(&self) -> Vec<String> {
        let status = Command::status().to_hex();
        self.written().into_iter().filter(|frame| *frame != status).collect()
    }
}

#[async_trait]
impl LightLink for MockLink {
    async fn connect(&self) -> LinkResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failures = self.connect_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.connect_failures.store(failures - 1, Ordering::SeqCst);
            return Err(BleError::ConnectionFailed("scripted failure".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> LinkResult<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn write(&self, _characteristic: Uuid, data: &[u8], _with_response: bool) -> LinkResult<()> {
        if !self.is_connected() {
            return Err(BleError::NotConnected);
        }
        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BleError::WriteFailed("scripted failure".into()));
        }

        self.writes.lock().push(data.to_vec());

        if data == Command::status().as_bytes() {
            let reply = self.status_reply.lock().clone();
            if let Some(frame) = reply {
                self.notify(&frame);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, _characteristic: Uuid, sink: NotificationSender) -> LinkResult<()> {
        *self.sink.lock() = Some(sink);
        Ok(())
    }
}

impl fmt::Debug for MockLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockLink")
            .field("connected", &self.is_connected())
            .field("connect_calls", &self.connect_calls())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Mock Provider
// ----------------------------------------------------------------------------

/// Provider that always resolves to the same [`MockLink`]
pub struct MockProvider {
    link: Arc<MockLink>,
    advertisement: Mutex<Option<Advertisement>>,
    resolve_calls: AtomicU32,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            link: MockLink::new(),
            advertisement: Mutex::new(None),
            resolve_calls: AtomicU32::new(0),
        })
    }

    pub fn link(&self) -> Arc<MockLink> {
        Arc::clone(&self.link)
    }

    pub fn set_advertisement(&self, advertisement: Advertisement) {
        *self.advertisement.lock() = Some(advertisement);
    }

    /// How many times a fresh handle was requested
    pub fn resolve_calls(&self) -> u32 {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkProvider for MockProvider {
    async fn resolve(&self, _address: &DeviceAddress) -> LinkResult<Arc<dyn LightLink>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let link: Arc<dyn LightLink> = self.link.clone();
        Ok(link)
    }

    async fn advertisement(&self, _address: &DeviceAddress) -> Option<Advertisement> {
        self.advertisement.lock().clone()
    }
}

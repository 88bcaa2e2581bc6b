//! btleplug-backed transport

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use ilink_core::{Advertisement, DeviceAddress};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BleError, LinkResult};
use crate::link::{LightLink, LinkProvider, NotificationSender};
use crate::protocol::ILINK_SERVICE_UUID;

// ----------------------------------------------------------------------------
// Provider
// ----------------------------------------------------------------------------

/// Resolves light addresses against the host's first BLE adapter
pub struct BtleplugProvider {
    adapter: Adapter,
}

impl BtleplugProvider {
    /// Initialize the first available adapter
    pub async fn new() -> LinkResult<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(BleError::AdapterNotAvailable)?;
        info!("BLE adapter initialized");
        Ok(Self { adapter })
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Listen for iLink advertisements so the adapter learns about nearby lights
    ///
    /// Resolution only looks at peripherals the adapter already knows.
    pub async fn listen(&self, window: Duration) -> LinkResult<()> {
        self.adapter
            .start_scan(ScanFilter {
                services: vec![ILINK_SERVICE_UUID],
            })
            .await?;
        debug!("Listening for advertisements for {:?}", window);
        tokio::time::sleep(window).await;
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn find(&self, address: &DeviceAddress) -> LinkResult<Option<Peripheral>> {
        let wanted = BDAddr::from(address.octets());
        Ok(self
            .adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|peripheral| peripheral.address() == wanted))
    }
}

#[async_trait]
impl LinkProvider for BtleplugProvider {
    async fn resolve(&self, address: &DeviceAddress) -> LinkResult<Arc<dyn LightLink>> {
        let peripheral = self.find(address).await?.ok_or_else(|| BleError::DeviceNotFound {
            address: address.to_string(),
        })?;
        let link = BtleplugLink::new(self.adapter.clone(), peripheral).await;
        Ok(Arc::new(link))
    }

    async fn advertisement(&self, address: &DeviceAddress) -> Option<Advertisement> {
        match self.find(address).await {
            Ok(Some(peripheral)) => advertisement_of(&peripheral).await,
            Ok(None) => None,
            Err(e) => {
                debug!("Advertisement lookup for {} failed: {}", address, e);
                None
            }
        }
    }
}

async fn advertisement_of(peripheral: &Peripheral) -> Option<Advertisement> {
    let properties = peripheral.properties().await.ok()??;
    Some(Advertisement {
        local_name: properties.local_name,
        manufacturer_data: properties.manufacturer_data,
        services: properties.services,
    })
}

// ----------------------------------------------------------------------------
// Link
// ----------------------------------------------------------------------------

/// GATT connection to one light
pub struct BtleplugLink {
    peripheral: Peripheral,
    connected: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl BtleplugLink {
    async fn new(adapter: Adapter, peripheral: Peripheral) -> Self {
        let connected = Arc::new(AtomicBool::new(
            peripheral.is_connected().await.unwrap_or(false),
        ));

        // adapter events keep the cached connection flag honest
        let watcher = match adapter.events().await {
            Ok(mut events) => {
                let id = peripheral.id();
                let flag = Arc::clone(&connected);
                Some(tokio::spawn(async move {
                    while let Some(event) = events.next().await {
                        match event {
                            CentralEvent::DeviceDisconnected(peer) if peer == id => {
                                flag.store(false, Ordering::SeqCst);
                            }
                            CentralEvent::DeviceConnected(peer) if peer == id => {
                                flag.store(true, Ordering::SeqCst);
                            }
                            _ => {}
                        }
                    }
                }))
            }
            Err(e) => {
                warn!("Failed to watch adapter events: {}", e);
                None
            }
        };

        Self {
            peripheral,
            connected,
            watcher,
        }
    }

    fn characteristic(&self, uuid: Uuid) -> LinkResult<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(BleError::CharacteristicNotFound {
                characteristic: uuid,
            })
    }
}

#[async_trait]
impl LightLink for BtleplugLink {
    async fn connect(&self) -> LinkResult<()> {
        if !self.peripheral.is_connected().await? {
            self.peripheral
                .connect()
                .await
                .map_err(|e| BleError::ConnectionFailed(e.to_string()))?;
        }
        self.peripheral
            .discover_services()
            .await
            .map_err(|e| BleError::ConnectionFailed(format!("Failed to discover services: {}", e)))?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> LinkResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| BleError::DisconnectFailed(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn write(&self, characteristic: Uuid, data: &[u8], with_response: bool) -> LinkResult<()> {
        let characteristic = self.characteristic(characteristic)?;
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral
            .write(&characteristic, data, write_type)
            .await
            .map_err(|e| BleError::WriteFailed(e.to_string()))
    }

    async fn subscribe(&self, characteristic: Uuid, sink: NotificationSender) -> LinkResult<()> {
        let target = self.characteristic(characteristic)?;
        self.peripheral
            .subscribe(&target)
            .await
            .map_err(|e| BleError::SubscriptionFailed(e.to_string()))?;

        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| BleError::SubscriptionFailed(e.to_string()))?;

        let address = self.peripheral.address();
        tokio::spawn(async move {
            while let Some(data) = notifications.next().await {
                if data.uuid != characteristic {
                    continue;
                }
                if sink.send(data.value).is_err() {
                    break;
                }
            }
            debug!("Notification handler for {} ended", address);
        });

        Ok(())
    }
}

impl fmt::Debug for BtleplugLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BtleplugLink")
            .field("address", &self.peripheral.address())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Drop for BtleplugLink {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

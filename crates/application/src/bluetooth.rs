use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use domain::adapter::{AdapterError, BluetoothAdapter};
use domain::{BluetoothError, Device, DeviceAddress, SessionStatus};

use crate::discovery::{DiscoveryEngine, ScanHandle};
use crate::event_bus::{EventBus, EventSubscription};
use crate::session::SessionManager;

/// Adapter power state plus the bonded devices when powered on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BluetoothStatus {
    pub enabled: bool,
    pub paired: Vec<Device>,
}

/// Caller-facing entry point: adapter power, discovery and the printer
/// session behind one handle.
#[derive(Clone)]
pub struct BluetoothManager {
    adapter: Arc<dyn BluetoothAdapter>,
    discovery: Arc<DiscoveryEngine>,
    session: SessionManager,
    events: Arc<EventBus>,
}

impl BluetoothManager {
    pub fn new(
        adapter: Arc<dyn BluetoothAdapter>,
        discovery: Arc<DiscoveryEngine>,
        session: SessionManager,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            adapter,
            discovery,
            session,
            events,
        }
    }

    pub async fn is_bluetooth_enabled(&self) -> Result<BluetoothStatus, BluetoothError> {
        let enabled = match self.adapter.is_enabled().await {
            Ok(enabled) => enabled,
            Err(AdapterError::Unsupported) => return Err(BluetoothError::BluetoothUnsupported),
            Err(e) => return Err(e.into()),
        };

        let paired = if enabled {
            self.discovery.refresh_paired().await
        } else {
            Vec::new()
        };
        Ok(BluetoothStatus { enabled, paired })
    }

    /// Power the adapter on; resolves with the bonded devices
    pub async fn enable_bluetooth(&self) -> Result<Vec<Device>, BluetoothError> {
        self.adapter.enable().await?;
        info!("Bluetooth enabled");
        Ok(self.discovery.refresh_paired().await)
    }

    /// Close any session, stop scanning and power the adapter off
    pub async fn disable_bluetooth(&self) -> Result<(), BluetoothError> {
        self.discovery.cancel_scan();
        self.session.disconnect().await;
        self.adapter.disable().await?;
        info!("Bluetooth disabled");
        Ok(())
    }

    pub async fn scan_devices(&self) -> Result<ScanHandle, BluetoothError> {
        self.discovery.scan().await
    }

    pub async fn connect(&self, address: &DeviceAddress) -> Result<Device, BluetoothError> {
        let mut device = self.session.connect(address).await?;
        // fill in the advertised name when the transport did not report one
        if device.name.is_none() {
            if let Some(known) = self.discovery.device(address) {
                device.name = known.name;
            }
        }
        Ok(device)
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    /// Remove the bond; a session to that device is torn down as well
    pub async fn unpair(&self, address: &DeviceAddress) -> Result<(), BluetoothError> {
        self.discovery.unpair(address).await?;
        if self.session.disconnect_device(address).await {
            warn!(address = %address, "Closed session to unpaired device");
        }
        Ok(())
    }

    pub fn is_device_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn connected_device_address(&self) -> Option<DeviceAddress> {
        self.session.connected_address()
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn known_devices(&self) -> Vec<Device> {
        self.discovery.known_devices()
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn shutdown(&self) {
        self.discovery.cancel_scan();
        self.session.shutdown();
    }
}

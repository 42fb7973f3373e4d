use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use domain::adapter::{AdapterError, BluetoothAdapter};
use domain::{BondState, Device, DeviceAddress};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulatedDevice {
    pub address: DeviceAddress,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub paired: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulatedAdapterConfig {
    /// false behaves like a host without a Bluetooth controller
    #[serde(default = "default_true")]
    pub present: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub devices: Vec<SimulatedDevice>,
    /// Pause before each discovery result
    #[serde(default = "default_discovery_interval_ms")]
    pub discovery_interval_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_discovery_interval_ms() -> u64 {
    200
}

impl Default for SimulatedAdapterConfig {
    fn default() -> Self {
        Self {
            present: true,
            enabled: true,
            devices: Vec::new(),
            discovery_interval_ms: default_discovery_interval_ms(),
        }
    }
}

/// Adapter backed by a fixed device list, for development without hardware
pub struct SimulatedAdapter {
    present: bool,
    enabled: AtomicBool,
    devices: Mutex<Vec<Device>>,
    interval: Duration,
}

impl SimulatedAdapter {
    pub fn new(config: SimulatedAdapterConfig) -> Self {
        let devices = config
            .devices
            .into_iter()
            .map(|d| {
                let bond_state = if d.paired {
                    BondState::Paired
                } else {
                    BondState::Unknown
                };
                Device::new(d.address, d.name, bond_state)
            })
            .collect();

        Self {
            present: config.present,
            enabled: AtomicBool::new(config.enabled),
            devices: Mutex::new(devices),
            interval: Duration::from_millis(config.discovery_interval_ms),
        }
    }

    pub fn devices(&self) -> Vec<Device> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Device>> {
        self.devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_present(&self) -> Result<(), AdapterError> {
        if self.present {
            Ok(())
        } else {
            Err(AdapterError::Unsupported)
        }
    }

    fn check_powered(&self) -> Result<(), AdapterError> {
        self.check_present()?;
        if self.enabled.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AdapterError::Disabled)
        }
    }
}

#[async_trait]
impl BluetoothAdapter for SimulatedAdapter {
    async fn is_enabled(&self) -> Result<bool, AdapterError> {
        self.check_present()?;
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    async fn enable(&self) -> Result<(), AdapterError> {
        self.check_present()?;
        self.enabled.store(true, Ordering::SeqCst);
        tracing::info!("Simulated adapter powered on");
        Ok(())
    }

    async fn disable(&self) -> Result<(), AdapterError> {
        self.check_present()?;
        self.enabled.store(false, Ordering::SeqCst);
        tracing::info!("Simulated adapter powered off");
        Ok(())
    }

    async fn paired_devices(&self) -> Result<Vec<Device>, AdapterError> {
        self.check_powered()?;
        Ok(self.lock().iter().filter(|d| d.is_paired()).cloned().collect())
    }

    async fn discover(&self) -> Result<BoxStream<'static, Device>, AdapterError> {
        self.check_powered()?;
        let devices = self.devices();
        let interval = self.interval;
        Ok(stream::iter(devices)
            .then(move |device| async move {
                tokio::time::sleep(interval).await;
                device
            })
            .boxed())
    }

    async fn remove_bond(&self, address: &DeviceAddress) -> Result<(), AdapterError> {
        self.check_powered()?;
        let mut devices = self.lock();
        let device = devices
            .iter_mut()
            .find(|d| &d.address == address)
            .ok_or_else(|| AdapterError::UnknownDevice(address.clone()))?;
        device.bond_state = BondState::Unknown;
        Ok(())
    }
}

pub mod bluetoothctl;
mod simulated;

pub use bluetoothctl::{BluetoothctlAdapter, BluetoothctlParser};
pub use simulated::{SimulatedAdapter, SimulatedAdapterConfig, SimulatedDevice};

use std::sync::Arc;
use std::time::Duration;

use domain::adapter::BluetoothAdapter;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    Bluetoothctl,
    Simulated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub kind: AdapterKind,
    #[serde(default)]
    pub simulated: SimulatedAdapterConfig,
}

/// Factory for the host adapter
pub struct AdapterFactory;

impl AdapterFactory {
    /// `scan_duration` bounds one discovery run of the real adapter
    pub fn create(config: &AdapterConfig, scan_duration: Duration) -> Arc<dyn BluetoothAdapter> {
        match config.kind {
            AdapterKind::Bluetoothctl => Arc::new(BluetoothctlAdapter::new(scan_duration)),
            AdapterKind::Simulated => Arc::new(SimulatedAdapter::new(config.simulated.clone())),
        }
    }
}

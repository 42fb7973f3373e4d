use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::device::{Device, DeviceAddress};
use crate::error::BluetoothError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("No Bluetooth adapter available")]
    Unsupported,
    #[error("Bluetooth adapter is powered off")]
    Disabled,
    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceAddress),
    #[error("Adapter command failed: {0}")]
    Command(String),
}

impl From<AdapterError> for BluetoothError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Unsupported => BluetoothError::BluetoothUnsupported,
            AdapterError::Disabled => BluetoothError::BluetoothDisabled,
            AdapterError::UnknownDevice(address) => BluetoothError::DeviceNotFound { address },
            AdapterError::Command(msg) => BluetoothError::Adapter(msg),
        }
    }
}

/// Host Bluetooth adapter: power, bonds and discovery
#[async_trait]
pub trait BluetoothAdapter: Send + Sync {
    /// Ok(false) when powered off; Err(Unsupported) when there is no adapter
    async fn is_enabled(&self) -> Result<bool, AdapterError>;

    async fn enable(&self) -> Result<(), AdapterError>;

    async fn disable(&self) -> Result<(), AdapterError>;

    /// Devices currently bonded with this host
    async fn paired_devices(&self) -> Result<Vec<Device>, AdapterError>;

    /// Start discovery. The stream yields devices as they are seen (possibly
    /// repeatedly) and ends when the discovery window closes. Dropping the
    /// stream cancels discovery.
    async fn discover(&self) -> Result<BoxStream<'static, Device>, AdapterError>;

    async fn remove_bond(&self, address: &DeviceAddress) -> Result<(), AdapterError>;
}

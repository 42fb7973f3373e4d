use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::DeviceAddress;

/// Domain-level validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    #[error("Invalid text options: {0}")]
    InvalidTextOptions(String),

    #[error("Invalid print instruction: {0}")]
    InvalidInstruction(String),

    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;

/// Why a connect attempt did not produce a session
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ConnectFailure {
    #[error("timed out")]
    Timeout,

    #[error("rejected by device: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors surfaced by the session manager, discovery engine and facades.
///
/// Every variant that originates from a device carries the address involved.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BluetoothError {
    #[error("No printer is connected")]
    NotConnected,

    #[error("Already connecting to {in_flight}; refusing to connect to {requested}")]
    AlreadyConnecting {
        in_flight: DeviceAddress,
        requested: DeviceAddress,
    },

    #[error("Connection to {address} failed: {reason}")]
    ConnectionFailed {
        address: DeviceAddress,
        reason: ConnectFailure,
    },

    #[error("Connection to {address} was lost")]
    ConnectionLost { address: DeviceAddress },

    #[error("Device {address} was never seen as paired")]
    DeviceNotFound { address: DeviceAddress },

    #[error("Connect to {address} was superseded")]
    Superseded { address: DeviceAddress },

    #[error("Write to {address} failed: {reason}")]
    TransportWriteFailed {
        address: DeviceAddress,
        reason: String,
    },

    #[error("Bluetooth is not supported on this host")]
    BluetoothUnsupported,

    #[error("Bluetooth adapter is not enabled")]
    BluetoothDisabled,

    #[error("Bluetooth adapter error: {0}")]
    Adapter(String),

    #[error("Session manager has shut down")]
    ManagerStopped,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod publisher;
pub use publisher::EventPublisher;

use crate::device::{Device, DeviceAddress};
use crate::error::ConnectFailure;

/// Events surfaced to callers. The serialized `type` tag is the stable event
/// name (see [`PrinterEvent::event_type`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PrinterEvent {
    /// Bonded devices, reported at the start of every scan
    DeviceAlreadyPaired {
        devices: Vec<Device>,
        timestamp: DateTime<Utc>,
    },

    /// A not-yet-bonded device seen for the first time in the current scan
    DeviceFound {
        device: Device,
        timestamp: DateTime<Utc>,
    },

    /// Discovery window closed
    DiscoveryDone {
        paired: Vec<Device>,
        found: Vec<Device>,
        timestamp: DateTime<Utc>,
    },

    /// No Bluetooth adapter on this host
    BluetoothUnsupported { timestamp: DateTime<Utc> },

    Connected {
        device: Device,
        timestamp: DateTime<Utc>,
    },

    UnableToConnect {
        address: DeviceAddress,
        reason: ConnectFailure,
        timestamp: DateTime<Utc>,
    },

    /// Link dropped underneath an established session
    ConnectionLost {
        device: Device,
        timestamp: DateTime<Utc>,
    },

    /// Session closed on request (disconnect, supersede, unpair)
    Disconnected {
        device: Device,
        timestamp: DateTime<Utc>,
    },
}

impl PrinterEvent {
    pub const DEVICE_ALREADY_PAIRED: &'static str = "device-already-paired";
    pub const DEVICE_FOUND: &'static str = "device-found";
    pub const DISCOVERY_DONE: &'static str = "discovery-done";
    pub const BLUETOOTH_UNSUPPORTED: &'static str = "bluetooth-unsupported";
    pub const CONNECTED: &'static str = "connected";
    pub const UNABLE_TO_CONNECT: &'static str = "unable-to-connect";
    pub const CONNECTION_LOST: &'static str = "connection-lost";
    pub const DISCONNECTED: &'static str = "disconnected";

    pub fn device_already_paired(devices: Vec<Device>) -> Self {
        Self::DeviceAlreadyPaired {
            devices,
            timestamp: Utc::now(),
        }
    }

    pub fn device_found(device: Device) -> Self {
        Self::DeviceFound {
            device,
            timestamp: Utc::now(),
        }
    }

    pub fn discovery_done(paired: Vec<Device>, found: Vec<Device>) -> Self {
        Self::DiscoveryDone {
            paired,
            found,
            timestamp: Utc::now(),
        }
    }

    pub fn bluetooth_unsupported() -> Self {
        Self::BluetoothUnsupported {
            timestamp: Utc::now(),
        }
    }

    pub fn connected(device: Device) -> Self {
        Self::Connected {
            device,
            timestamp: Utc::now(),
        }
    }

    pub fn unable_to_connect(address: DeviceAddress, reason: ConnectFailure) -> Self {
        Self::UnableToConnect {
            address,
            reason,
            timestamp: Utc::now(),
        }
    }

    pub fn connection_lost(device: Device) -> Self {
        Self::ConnectionLost {
            device,
            timestamp: Utc::now(),
        }
    }

    pub fn disconnected(device: Device) -> Self {
        Self::Disconnected {
            device,
            timestamp: Utc::now(),
        }
    }

    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::DeviceAlreadyPaired { timestamp, .. } => *timestamp,
            Self::DeviceFound { timestamp, .. } => *timestamp,
            Self::DiscoveryDone { timestamp, .. } => *timestamp,
            Self::BluetoothUnsupported { timestamp } => *timestamp,
            Self::Connected { timestamp, .. } => *timestamp,
            Self::UnableToConnect { timestamp, .. } => *timestamp,
            Self::ConnectionLost { timestamp, .. } => *timestamp,
            Self::Disconnected { timestamp, .. } => *timestamp,
        }
    }

    /// Stable event name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DeviceAlreadyPaired { .. } => Self::DEVICE_ALREADY_PAIRED,
            Self::DeviceFound { .. } => Self::DEVICE_FOUND,
            Self::DiscoveryDone { .. } => Self::DISCOVERY_DONE,
            Self::BluetoothUnsupported { .. } => Self::BLUETOOTH_UNSUPPORTED,
            Self::Connected { .. } => Self::CONNECTED,
            Self::UnableToConnect { .. } => Self::UNABLE_TO_CONNECT,
            Self::ConnectionLost { .. } => Self::CONNECTION_LOST,
            Self::Disconnected { .. } => Self::DISCONNECTED,
        }
    }

    /// Address the event is about, if any
    pub fn address(&self) -> Option<&DeviceAddress> {
        match self {
            Self::DeviceFound { device, .. }
            | Self::Connected { device, .. }
            | Self::ConnectionLost { device, .. }
            | Self::Disconnected { device, .. } => Some(&device.address),
            Self::UnableToConnect { address, .. } => Some(address),
            _ => None,
        }
    }
}

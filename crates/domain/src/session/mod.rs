mod connection_state;

pub use connection_state::ConnectionState;

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceAddress};

/// Point-in-time view of the session, published after every transition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: ConnectionState,
    /// Connected device, or the target of an in-flight connect
    pub device: Option<Device>,
}

impl SessionStatus {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connecting(device: Device) -> Self {
        Self {
            state: ConnectionState::Connecting,
            device: Some(device),
        }
    }

    pub fn connected(device: Device) -> Self {
        Self {
            state: ConnectionState::Connected,
            device: Some(device),
        }
    }

    pub fn failed(device: Device) -> Self {
        Self {
            state: ConnectionState::Failed,
            device: Some(device),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Address of the connected device; None unless Connected
    pub fn connected_address(&self) -> Option<&DeviceAddress> {
        if self.is_connected() {
            self.device.as_ref().map(|d| &d.address)
        } else {
            None
        }
    }
}

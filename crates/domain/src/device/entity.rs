use serde::{Deserialize, Serialize};

use super::DeviceAddress;

/// OS-level trust relationship between this host and a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondState {
    #[default]
    Unknown,
    Pairing,
    Paired,
    Failed,
}

/// A Bluetooth device as seen by discovery or the session manager.
///
/// Identity is the address; the name is advisory and may change between
/// scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub address: DeviceAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub bond_state: BondState,
}

impl Device {
    pub fn new(address: DeviceAddress, name: Option<String>, bond_state: BondState) -> Self {
        Self {
            address,
            name,
            bond_state,
        }
    }

    pub fn paired(address: DeviceAddress, name: Option<String>) -> Self {
        Self::new(address, name, BondState::Paired)
    }

    pub fn is_paired(&self) -> bool {
        self.bond_state == BondState::Paired
    }

    /// Label for logs and CLI output
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

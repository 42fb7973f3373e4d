use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Value object representing a Bluetooth hardware address
///
/// Rules:
/// - Colon-separated groups of exactly two hex digits
/// - Between 1 and 6 groups (full MACs have 6; simulated devices may use fewer)
/// - Normalized to upper case so `aa:bb` and `AA:BB` are the same device
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create a new DeviceAddress with validation
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        let trimmed = address.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidAddress(
                "Device address cannot be empty".to_string(),
            ));
        }

        let groups: Vec<&str> = trimmed.split(':').collect();
        if groups.len() > 6 {
            return Err(DomainError::InvalidAddress(format!(
                "{trimmed}: too many groups ({}, max 6)",
                groups.len()
            )));
        }

        if !groups
            .iter()
            .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(DomainError::InvalidAddress(format!(
                "{trimmed}: expected colon-separated two-digit hex groups"
            )));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for a complete six-group MAC address
    pub fn is_full_mac(&self) -> bool {
        self.0.split(':').count() == 6
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DeviceAddress> for String {
    fn from(address: DeviceAddress) -> Self {
        address.0
    }
}

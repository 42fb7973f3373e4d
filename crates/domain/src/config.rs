//! Tunables for the session manager and discovery, deserializable from the
//! agent configuration file

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on a single transport open
    pub connect_timeout_ms: u64,
    /// Upper bound on a single payload write
    pub write_timeout_ms: u64,
    /// Commands queued ahead of the actor before callers wait
    pub mailbox_capacity: usize,
    /// Connect to a different address while a connect is in flight:
    /// false rejects the new call with AlreadyConnecting,
    /// true resolves the in-flight call with Superseded and starts the new one
    pub supersede_pending_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            write_timeout_ms: 5_000,
            mailbox_capacity: 64,
            supersede_pending_connect: false,
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Hard cap on one discovery window
    pub scan_duration_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scan_duration_ms: 12_000,
        }
    }
}

impl DiscoveryConfig {
    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.scan_duration_ms)
    }
}

use config::{Config, ConfigError, Environment, File, FileFormat};
use domain::config::{DiscoveryConfig, SessionConfig};
use domain::{DeviceAddress, TextOptions};
use serde::{Deserialize, Serialize};

use crate::adapter::AdapterConfig;
use crate::transport::TransportConfig;

/// Defaults applied by the CLI when a command does not say otherwise
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PrinterDefaults {
    /// Printer used when `--address` is omitted
    #[serde(default)]
    pub address: Option<DeviceAddress>,
    #[serde(default)]
    pub text: TextOptions,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PrinterAgentConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub printer: PrinterDefaults,
}

impl PrinterAgentConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("transport.kind", "rfcomm")?
            .set_default("adapter.kind", "bluetoothctl")?
            // Local config file - e.g. config/default.toml
            // REQUIRED so the agent never starts half-configured
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(true))
            // Per-environment overrides, e.g. config/development.toml
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. BTPRINT__SESSION__CONNECT_TIMEOUT_MS=3000)
            .add_source(
                Environment::with_prefix("BTPRINT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Parse a TOML document on its own, without files or environment
    pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

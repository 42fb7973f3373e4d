//! Infrastructure layer - Host Bluetooth stack, transports and configuration

pub mod adapter;
pub mod config;
pub mod transport;

pub use adapter::{AdapterConfig, AdapterFactory, BluetoothctlAdapter, SimulatedAdapter};
pub use config::PrinterAgentConfig;
pub use transport::{MockTransport, RfcommTransport, TransportConfig, TransportFactory};

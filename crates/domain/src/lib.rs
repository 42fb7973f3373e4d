//! Domain layer - Pure types and collaborator contracts
//!
//! This crate contains:
//! - Entities and value objects (Device, DeviceAddress, TextOptions)
//! - Session state (ConnectionState, SessionStatus)
//! - Events surfaced to callers
//! - Collaborator interfaces (TransportChannel, BluetoothAdapter, EventPublisher)
//!
//! Principles:
//! - No dependencies on infrastructure or a runtime
//! - Validation enforced at construction
//! - Testable in isolation

pub mod adapter;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod printer;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use adapter::{AdapterError, BluetoothAdapter};
pub use config::{DiscoveryConfig, SessionConfig};
pub use device::{BondState, Device, DeviceAddress};
pub use error::{BluetoothError, ConnectFailure, DomainError};
pub use event::{EventPublisher, PrinterEvent};
pub use printer::{Alignment, BarcodeOptions, PrintInstruction, TextEncoding, TextOptions};
pub use session::{ConnectionState, SessionStatus};
pub use transport::{OpenChannel, TransportChannel, TransportError, TransportHandle};

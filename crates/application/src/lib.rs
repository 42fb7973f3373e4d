//! Application layer - Session, discovery and printing workflows

pub mod bluetooth;
pub mod discovery;
pub mod event_bus;
pub mod printer;
pub mod session;

pub use bluetooth::{BluetoothManager, BluetoothStatus};
pub use discovery::{DiscoveryConfig, DiscoveryEngine, ScanHandle, ScanResults};
pub use event_bus::{EventBus, EventSubscription};
pub use printer::{EscPosPrinter, ReceiptBuilder};
pub use session::{SessionConfig, SessionManager};

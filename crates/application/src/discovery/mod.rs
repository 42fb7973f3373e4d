mod engine;

pub use domain::config::DiscoveryConfig;
pub use engine::{DiscoveryEngine, ScanHandle, ScanResults};

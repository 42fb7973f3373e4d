mod mock;
mod rfcomm;

pub use mock::MockTransport;
pub use rfcomm::{RfcommBinding, RfcommConfig, RfcommTableParser, RfcommTransport};

use std::sync::Arc;

use domain::transport::TransportChannel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Rfcomm,
    Mock,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
    #[serde(default)]
    pub rfcomm: RfcommConfig,
}

/// Factory for the printer transport
pub struct TransportFactory;

impl TransportFactory {
    pub fn create(config: &TransportConfig) -> Arc<dyn TransportChannel> {
        match config.kind {
            TransportKind::Rfcomm => Arc::new(RfcommTransport::new(config.rfcomm.clone())),
            TransportKind::Mock => Arc::new(MockTransport::new()),
        }
    }
}

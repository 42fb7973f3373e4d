use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::device::DeviceAddress;
use crate::error::ConnectFailure;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection timed out")]
    Timeout,
    #[error("Connection rejected: {0}")]
    Rejected(String),
    #[error("I/O failed: {0}")]
    Io(String),
    #[error("Channel closed")]
    Closed,
}

impl From<TransportError> for ConnectFailure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => ConnectFailure::Timeout,
            TransportError::Rejected(msg) => ConnectFailure::Rejected(msg),
            other => ConnectFailure::Transport(other.to_string()),
        }
    }
}

/// Result of a successful open: the writable handle, the name the device
/// reported (if any), and a future that resolves once the link drops.
pub struct OpenChannel {
    pub handle: Box<dyn TransportHandle>,
    pub name: Option<String>,
    pub disconnected: BoxFuture<'static, ()>,
}

impl std::fmt::Debug for OpenChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenChannel")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Opens byte-stream channels to paired devices
#[async_trait]
pub trait TransportChannel: Send + Sync {
    /// Attempt to open a channel to the device at `address`
    async fn open(&self, address: &DeviceAddress) -> Result<OpenChannel, TransportError>;

    /// Identifier used in logs
    fn kind(&self) -> &str;
}

/// Exclusive handle on an open channel
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Write all bytes. Returns once the bytes are handed to the link.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Close the channel; must be safe to call more than once
    async fn close(&mut self) -> Result<(), TransportError>;
}

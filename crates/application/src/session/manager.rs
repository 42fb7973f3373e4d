use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use domain::event::EventPublisher;
use domain::transport::TransportChannel;
use domain::{BluetoothError, Device, DeviceAddress, SessionStatus};

use super::actor::{SessionActor, SessionCommand};
use domain::config::SessionConfig;

/// Cloneable handle to the session actor.
///
/// Requests are applied strictly in the order the actor receives them, so two
/// `send` calls never interleave on the wire. Status reads never wait on the
/// actor.
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
    cancel_token: CancellationToken,
}

impl SessionManager {
    /// Spawn the actor on the current runtime
    pub fn spawn(
        transport: Arc<dyn TransportChannel>,
        publisher: Arc<dyn EventPublisher>,
        config: SessionConfig,
    ) -> (Self, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(config.mailbox_capacity.max(1));
        let (status_tx, status_rx) = watch::channel(SessionStatus::disconnected());
        let cancel_token = CancellationToken::new();

        let actor = SessionActor::new(
            transport,
            publisher,
            config,
            status_tx,
            commands_rx,
            cancel_token.clone(),
        );
        let handle = tokio::spawn(actor.run());

        let manager = Self {
            commands: commands_tx,
            status: status_rx,
            cancel_token,
        };
        (manager, handle)
    }

    /// Resolve once `address` is connected. Idempotent for the current
    /// device; joins an in-flight connect to the same address.
    pub async fn connect(&self, address: &DeviceAddress) -> Result<Device, BluetoothError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            SessionCommand::Connect {
                address: address.clone(),
                reply,
            },
            rx,
        )
        .await
    }

    /// Close the active session or abort a pending one. No-op when idle.
    pub async fn disconnect(&self) {
        self.release(None).await;
    }

    /// Like `disconnect`, but only when the session targets `address`.
    /// Returns whether anything was released.
    pub async fn disconnect_device(&self, address: &DeviceAddress) -> bool {
        self.release(Some(address.clone())).await
    }

    /// Write one payload as a single uninterrupted transmission
    pub async fn send(&self, payload: impl Into<Vec<u8>>) -> Result<(), BluetoothError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            SessionCommand::Send {
                payload: payload.into(),
                reply,
            },
            rx,
        )
        .await
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    pub fn connected_address(&self) -> Option<DeviceAddress> {
        self.status.borrow().connected_address().cloned()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Stop the actor; an open session is closed first. Later requests fail
    /// with ManagerStopped.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    async fn release(&self, only: Option<DeviceAddress>) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .commands
            .send(SessionCommand::Disconnect { only, reply })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    async fn request<T>(
        &self,
        command: SessionCommand,
        rx: oneshot::Receiver<Result<T, BluetoothError>>,
    ) -> Result<T, BluetoothError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| BluetoothError::ManagerStopped)?;
        rx.await.map_err(|_| BluetoothError::ManagerStopped)?
    }
}

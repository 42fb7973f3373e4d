use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use domain::event::{EventPublisher, PrinterEvent};
use domain::transport::{OpenChannel, TransportChannel, TransportError, TransportHandle};
use domain::{BluetoothError, BondState, ConnectFailure, Device, DeviceAddress, SessionStatus};

use domain::config::SessionConfig;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, BluetoothError>>;

pub(crate) enum SessionCommand {
    Connect {
        address: DeviceAddress,
        reply: Reply<Device>,
    },
    /// `only`: release only when the active or pending session targets this address
    Disconnect {
        only: Option<DeviceAddress>,
        reply: oneshot::Sender<bool>,
    },
    Send {
        payload: Vec<u8>,
        reply: Reply<()>,
    },
}

/// Produced by tasks the actor spawned; tagged with the generation that
/// spawned them so late arrivals can be recognised
enum Notice {
    Opened {
        generation: u64,
        result: Result<OpenChannel, TransportError>,
    },
    LinkLost {
        generation: u64,
    },
}

struct PendingConnect {
    device: Device,
    generation: u64,
    waiters: Vec<Reply<Device>>,
    task: JoinHandle<()>,
}

struct Session {
    device: Device,
    generation: u64,
    handle: Box<dyn TransportHandle>,
    monitor: JoinHandle<()>,
}

enum Slot {
    Idle,
    Connecting(PendingConnect),
    Connected(Session),
}

/// Single owner of the printer session. Every mutation runs on this task,
/// one message at a time.
pub(crate) struct SessionActor {
    transport: Arc<dyn TransportChannel>,
    publisher: Arc<dyn EventPublisher>,
    config: SessionConfig,
    status: watch::Sender<SessionStatus>,
    commands: mpsc::Receiver<SessionCommand>,
    notices_tx: mpsc::UnboundedSender<Notice>,
    notices_rx: mpsc::UnboundedReceiver<Notice>,
    cancel_token: CancellationToken,
    slot: Slot,
    generation: u64,
}

impl SessionActor {
    pub(crate) fn new(
        transport: Arc<dyn TransportChannel>,
        publisher: Arc<dyn EventPublisher>,
        config: SessionConfig,
        status: watch::Sender<SessionStatus>,
        commands: mpsc::Receiver<SessionCommand>,
        cancel_token: CancellationToken,
    ) -> Self {
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            publisher,
            config,
            status,
            commands,
            notices_tx,
            notices_rx,
            cancel_token,
            slot: Slot::Idle,
            generation: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(transport = self.transport.kind(), "Session manager started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                Some(notice) = self.notices_rx.recv() => {
                    self.handle_notice(notice).await;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("All session handles dropped");
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { address, reply } => self.connect(address, reply).await,
            SessionCommand::Disconnect { only, reply } => {
                let released = self.disconnect(only.as_ref()).await;
                let _ = reply.send(released);
            }
            SessionCommand::Send { payload, reply } => self.send(payload, reply).await,
        }
    }

    async fn handle_notice(&mut self, notice: Notice) {
        match notice {
            Notice::Opened { generation, result } => self.on_opened(generation, result).await,
            Notice::LinkLost { generation } => self.on_link_lost(generation).await,
        }
    }

    async fn connect(&mut self, address: DeviceAddress, reply: Reply<Device>) {
        match &mut self.slot {
            Slot::Connected(session) if session.device.address == address => {
                debug!(address = %address, "Already connected; reusing session");
                let _ = reply.send(Ok(session.device.clone()));
                return;
            }
            Slot::Connecting(pending) if pending.device.address == address => {
                debug!(address = %address, "Joining in-flight connect");
                pending.waiters.push(reply);
                return;
            }
            Slot::Connecting(pending) if !self.config.supersede_pending_connect => {
                warn!(
                    in_flight = %pending.device.address,
                    requested = %address,
                    "Rejecting connect while another is in flight"
                );
                let _ = reply.send(Err(BluetoothError::AlreadyConnecting {
                    in_flight: pending.device.address.clone(),
                    requested: address,
                }));
                return;
            }
            _ => {}
        }

        self.release().await;
        self.start_connect(address, reply);
    }

    fn start_connect(&mut self, address: DeviceAddress, reply: Reply<Device>) {
        self.generation += 1;
        let generation = self.generation;
        let device = Device::new(address.clone(), None, BondState::Unknown);

        info!(address = %address, generation, "Connecting to printer");

        let transport = self.transport.clone();
        let notices = self.notices_tx.clone();
        let timeout = self.config.connect_timeout();
        let task = tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, transport.open(&address)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            };
            let _ = notices.send(Notice::Opened { generation, result });
        });

        self.set_status(SessionStatus::connecting(device.clone()));
        self.slot = Slot::Connecting(PendingConnect {
            device,
            generation,
            waiters: vec![reply],
            task,
        });
    }

    async fn on_opened(&mut self, generation: u64, result: Result<OpenChannel, TransportError>) {
        let pending = match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Connecting(pending) if pending.generation == generation => pending,
            other => {
                self.slot = other;
                if let Ok(mut channel) = result {
                    debug!(generation, "Closing channel opened by a superseded connect");
                    if let Err(e) = channel.handle.close().await {
                        warn!(generation, error = %e, "Failed to close stale channel");
                    }
                }
                return;
            }
        };

        let address = pending.device.address.clone();
        match result {
            Ok(channel) => {
                let device = Device::paired(address.clone(), channel.name);
                let monitor = self.spawn_monitor(generation, channel.disconnected);

                info!(address = %address, name = device.display_name(), "Printer connected");
                self.slot = Slot::Connected(Session {
                    device: device.clone(),
                    generation,
                    handle: channel.handle,
                    monitor,
                });
                self.set_status(SessionStatus::connected(device.clone()));
                self.emit(PrinterEvent::connected(device.clone())).await;

                for waiter in pending.waiters {
                    let _ = waiter.send(Ok(device.clone()));
                }
            }
            Err(err) => {
                let reason = ConnectFailure::from(err);
                warn!(address = %address, reason = %reason, "Connect failed");

                self.set_status(SessionStatus::failed(pending.device.clone()));
                self.set_status(SessionStatus::disconnected());
                self.emit(PrinterEvent::unable_to_connect(address.clone(), reason.clone()))
                    .await;

                for waiter in pending.waiters {
                    let _ = waiter.send(Err(BluetoothError::ConnectionFailed {
                        address: address.clone(),
                        reason: reason.clone(),
                    }));
                }
            }
        }
    }

    fn spawn_monitor(&self, generation: u64, disconnected: BoxFuture<'static, ()>) -> JoinHandle<()> {
        let notices = self.notices_tx.clone();
        tokio::spawn(async move {
            disconnected.await;
            let _ = notices.send(Notice::LinkLost { generation });
        })
    }

    async fn on_link_lost(&mut self, generation: u64) {
        let current = matches!(&self.slot, Slot::Connected(s) if s.generation == generation);
        if !current {
            debug!(generation, "Ignoring link-lost notice for a closed session");
            return;
        }

        if let Slot::Connected(session) = std::mem::replace(&mut self.slot, Slot::Idle) {
            self.drop_lost_session(session).await;
        }
    }

    async fn send(&mut self, payload: Vec<u8>, reply: Reply<()>) {
        let Slot::Connected(session) = &mut self.slot else {
            let _ = reply.send(Err(BluetoothError::NotConnected));
            return;
        };

        let address = session.device.address.clone();
        let timeout = self.config.write_timeout();
        let err = match tokio::time::timeout(timeout, session.handle.write(&payload)).await {
            Ok(Ok(())) => {
                debug!(address = %address, bytes = payload.len(), "Payload written");
                let _ = reply.send(Ok(()));
                return;
            }
            Ok(Err(TransportError::Closed)) => BluetoothError::ConnectionLost { address },
            Ok(Err(e)) => BluetoothError::TransportWriteFailed {
                address,
                reason: e.to_string(),
            },
            Err(_) => BluetoothError::TransportWriteFailed {
                address,
                reason: format!("write timed out after {:?}", timeout),
            },
        };

        error!(error = %err, "Write failed; dropping session");
        if let Slot::Connected(session) = std::mem::replace(&mut self.slot, Slot::Idle) {
            self.drop_lost_session(session).await;
        }
        let _ = reply.send(Err(err));
    }

    async fn disconnect(&mut self, only: Option<&DeviceAddress>) -> bool {
        let target = match &self.slot {
            Slot::Idle => return false,
            Slot::Connecting(pending) => &pending.device.address,
            Slot::Connected(session) => &session.device.address,
        };
        if only.is_some_and(|address| address != target) {
            return false;
        }

        self.release().await;
        true
    }

    /// Tear down whatever occupies the slot. Pending callers resolve with
    /// Superseded; an open session is closed and reported as disconnected.
    async fn release(&mut self) {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Idle => {}
            Slot::Connecting(pending) => {
                pending.task.abort();
                info!(address = %pending.device.address, "Pending connect superseded");
                self.set_status(SessionStatus::disconnected());
                for waiter in pending.waiters {
                    let _ = waiter.send(Err(BluetoothError::Superseded {
                        address: pending.device.address.clone(),
                    }));
                }
            }
            Slot::Connected(mut session) => {
                session.monitor.abort();
                close_quietly(&mut session).await;
                info!(address = %session.device.address, "Printer disconnected");
                self.set_status(SessionStatus::disconnected());
                self.emit(PrinterEvent::disconnected(session.device)).await;
            }
        }
    }

    async fn drop_lost_session(&mut self, mut session: Session) {
        session.monitor.abort();
        close_quietly(&mut session).await;
        warn!(address = %session.device.address, "Connection lost");
        self.set_status(SessionStatus::disconnected());
        self.emit(PrinterEvent::connection_lost(session.device)).await;
    }

    async fn shutdown(&mut self) {
        self.release().await;

        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            match command {
                SessionCommand::Connect { reply, .. } => {
                    let _ = reply.send(Err(BluetoothError::ManagerStopped));
                }
                SessionCommand::Send { reply, .. } => {
                    let _ = reply.send(Err(BluetoothError::ManagerStopped));
                }
                SessionCommand::Disconnect { reply, .. } => {
                    let _ = reply.send(false);
                }
            }
        }

        info!("Session manager stopped");
    }

    fn set_status(&self, status: SessionStatus) {
        let current = self.status.borrow().state;
        if let Err(reason) = current.advance_to(status.state) {
            error!(from = %current, to = %status.state, reason, "Rejected session state transition");
            return;
        }
        self.status.send_replace(status);
    }

    async fn emit(&self, event: PrinterEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            warn!("Failed to publish event: {}", e);
        }
    }
}

async fn close_quietly(session: &mut Session) {
    if let Err(e) = session.handle.close().await {
        warn!(address = %session.device.address, error = %e, "Error closing transport channel");
    }
}

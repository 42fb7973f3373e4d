use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use domain::adapter::{AdapterError, BluetoothAdapter};
use domain::config::DiscoveryConfig;
use domain::event::{EventPublisher, PrinterEvent};
use domain::{BluetoothError, Device, DeviceAddress};

/// Everything one scan reported
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResults {
    pub paired: Vec<Device>,
    pub found: Vec<Device>,
}

/// A running scan. The paired set is available immediately; discovered
/// devices arrive as the adapter reports them.
pub struct ScanHandle {
    paired: Vec<Device>,
    found_rx: mpsc::UnboundedReceiver<Device>,
    cancel_token: CancellationToken,
}

impl ScanHandle {
    pub fn paired(&self) -> &[Device] {
        &self.paired
    }

    /// Next newly discovered device; None once the scan ended or was cancelled
    pub async fn next_found(&mut self) -> Option<Device> {
        self.found_rx.recv().await
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Wait for the scan to end and collect what it reported
    pub async fn finished(mut self) -> ScanResults {
        let mut found = Vec::new();
        while let Some(device) = self.found_rx.recv().await {
            found.push(device);
        }
        ScanResults {
            paired: self.paired,
            found,
        }
    }
}

/// Runs scans against the host adapter and remembers what they saw.
///
/// At most one scan runs at a time; starting another cancels the previous
/// one. Dedup is per scan, so a later scan may report a device again.
pub struct DiscoveryEngine {
    adapter: Arc<dyn BluetoothAdapter>,
    publisher: Arc<dyn EventPublisher>,
    config: DiscoveryConfig,
    registry: Arc<DashMap<DeviceAddress, Device>>,
    known_paired: Arc<DashSet<DeviceAddress>>,
    current_scan: Mutex<Option<CancellationToken>>,
}

impl DiscoveryEngine {
    pub fn new(
        adapter: Arc<dyn BluetoothAdapter>,
        publisher: Arc<dyn EventPublisher>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            adapter,
            publisher,
            config,
            registry: Arc::new(DashMap::new()),
            known_paired: Arc::new(DashSet::new()),
            current_scan: Mutex::new(None),
        }
    }

    /// Start a scan. Fails when the host has no adapter or it is powered off.
    pub async fn scan(&self) -> Result<ScanHandle, BluetoothError> {
        match self.adapter.is_enabled().await {
            Ok(true) => {}
            Ok(false) => return Err(BluetoothError::BluetoothDisabled),
            Err(AdapterError::Unsupported) => {
                warn!("Scan requested but no Bluetooth adapter is present");
                self.emit(PrinterEvent::bluetooth_unsupported()).await;
                return Err(BluetoothError::BluetoothUnsupported);
            }
            Err(e) => warn!(error = %e, "Adapter state unknown; scanning anyway"),
        }

        let cancel_token = CancellationToken::new();
        if let Some(previous) = self.replace_current_scan(cancel_token.clone()) {
            debug!("Cancelling previous scan");
            previous.cancel();
        }

        let paired = self.refresh_paired().await;
        self.emit(PrinterEvent::device_already_paired(paired.clone()))
            .await;

        let (found_tx, found_rx) = mpsc::unbounded_channel();
        let task = ScanTask {
            adapter: self.adapter.clone(),
            publisher: self.publisher.clone(),
            registry: self.registry.clone(),
            paired: paired.clone(),
            duration: self.config.scan_duration(),
            cancel_token: cancel_token.clone(),
            found_tx,
        };
        tokio::spawn(task.run());

        info!(paired = paired.len(), "🔍 Scan started");
        Ok(ScanHandle {
            paired,
            found_rx,
            cancel_token,
        })
    }

    /// List bonded devices and record them as known. Listing errors are
    /// logged and yield an empty set.
    pub async fn refresh_paired(&self) -> Vec<Device> {
        let paired = match self.adapter.paired_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "Failed to list paired devices");
                Vec::new()
            }
        };

        for device in &paired {
            self.known_paired.insert(device.address.clone());
            self.registry.insert(device.address.clone(), device.clone());
        }
        paired
    }

    /// Remove the bond to a device previously seen as paired
    pub async fn unpair(&self, address: &DeviceAddress) -> Result<(), BluetoothError> {
        if !self.known_paired.contains(address) {
            return Err(BluetoothError::DeviceNotFound {
                address: address.clone(),
            });
        }

        self.adapter.remove_bond(address).await?;
        self.known_paired.remove(address);
        self.registry.remove(address);
        info!(address = %address, "Device unpaired");
        Ok(())
    }

    /// Cancel the running scan, if any
    pub fn cancel_scan(&self) {
        if let Some(token) = self.take_current_scan() {
            token.cancel();
        }
    }

    pub fn known_devices(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self
            .registry
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        devices.sort_by(|a, b| a.address.cmp(&b.address));
        devices
    }

    pub fn device(&self, address: &DeviceAddress) -> Option<Device> {
        self.registry.get(address).map(|entry| entry.value().clone())
    }

    pub fn is_known_paired(&self, address: &DeviceAddress) -> bool {
        self.known_paired.contains(address)
    }

    fn replace_current_scan(&self, token: CancellationToken) -> Option<CancellationToken> {
        let mut current = self
            .current_scan
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        current.replace(token)
    }

    fn take_current_scan(&self) -> Option<CancellationToken> {
        self.current_scan
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    async fn emit(&self, event: PrinterEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            warn!("Failed to publish event: {}", e);
        }
    }
}

struct ScanTask {
    adapter: Arc<dyn BluetoothAdapter>,
    publisher: Arc<dyn EventPublisher>,
    registry: Arc<DashMap<DeviceAddress, Device>>,
    paired: Vec<Device>,
    duration: Duration,
    cancel_token: CancellationToken,
    found_tx: mpsc::UnboundedSender<Device>,
}

impl ScanTask {
    async fn run(self) {
        let mut stream = match self.adapter.discover().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Failed to start discovery");
                futures::stream::empty().boxed()
            }
        };

        let paired: HashSet<&DeviceAddress> = self.paired.iter().map(|d| &d.address).collect();
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        let deadline = tokio::time::sleep(self.duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!(found = found.len(), "Scan cancelled");
                    return;
                }
                _ = &mut deadline => {
                    debug!("Scan window elapsed");
                    break;
                }
                next = stream.next() => match next {
                    Some(device) => {
                        if device.is_paired() || paired.contains(&device.address) {
                            continue;
                        }
                        if !seen.insert(device.address.clone()) {
                            continue;
                        }

                        debug!(address = %device.address, name = device.display_name(), "Device found");
                        self.registry.insert(device.address.clone(), device.clone());
                        self.emit(PrinterEvent::device_found(device.clone())).await;
                        let _ = self.found_tx.send(device.clone());
                        found.push(device);
                    }
                    None => break,
                }
            }
        }

        info!(found = found.len(), "🔍 Scan finished");
        self.emit(PrinterEvent::discovery_done(self.paired.clone(), found))
            .await;
    }

    async fn emit(&self, event: PrinterEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            warn!("Failed to publish event: {}", e);
        }
    }
}

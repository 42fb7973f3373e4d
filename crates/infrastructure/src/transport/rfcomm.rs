//! Bluetooth Serial Port Profile over the kernel RFCOMM tty layer.
//!
//! The printer address is bound to `/dev/rfcommN` (reusing an existing
//! binding from `/proc/net/rfcomm` when present) and the tty is driven with
//! tokio-serial. A reader task watches the tty; end of stream or a read error
//! is reported as link loss.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use domain::DeviceAddress;
use domain::transport::{OpenChannel, TransportChannel, TransportError, TransportHandle};

use crate::adapter::bluetoothctl;

const PROC_RFCOMM: &str = "/proc/net/rfcomm";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RfcommConfig {
    /// RFCOMM channel on the printer; 1 is standard for SPP
    #[serde(default = "default_channel")]
    pub channel: u8,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Bytes per write before pausing
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
    /// Run `rfcomm bind` when the address has no tty yet
    #[serde(default = "default_auto_bind")]
    pub auto_bind: bool,
    /// How long to wait for a freshly bound tty node to appear
    #[serde(default = "default_bind_settle_ms")]
    pub bind_settle_ms: u64,
    /// Program used for `bind` and `release`
    #[serde(default = "default_rfcomm_command")]
    pub rfcomm_command: String,
}

fn default_channel() -> u8 {
    1
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_chunk_size() -> usize {
    4096
}
fn default_chunk_delay_ms() -> u64 {
    2
}
fn default_auto_bind() -> bool {
    true
}
fn default_bind_settle_ms() -> u64 {
    2000
}
fn default_rfcomm_command() -> String {
    "rfcomm".to_string()
}

impl Default for RfcommConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            baud_rate: default_baud_rate(),
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay_ms(),
            auto_bind: default_auto_bind(),
            bind_settle_ms: default_bind_settle_ms(),
            rfcomm_command: default_rfcomm_command(),
        }
    }
}

/// One line of `/proc/net/rfcomm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfcommBinding {
    pub index: u8,
    pub address: String,
    pub channel: u8,
}

impl RfcommBinding {
    pub fn device_path(&self) -> String {
        format!("/dev/rfcomm{}", self.index)
    }
}

#[derive(Debug)]
pub struct RfcommTableParser {
    regex: Regex,
}

impl RfcommTableParser {
    pub fn new() -> Self {
        // "rfcomm0: 00:11:62:AA:BB:CC channel 1 clean"
        let regex = Regex::new(
            r"(?m)^rfcomm(\d+):\s+([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})\s+channel\s+(\d+)",
        )
        .expect("Invalid regex");
        Self { regex }
    }

    pub fn parse(&self, table: &str) -> Vec<RfcommBinding> {
        self.regex
            .captures_iter(table)
            .filter_map(|caps| {
                Some(RfcommBinding {
                    index: caps[1].parse().ok()?,
                    address: caps[2].to_uppercase(),
                    channel: caps[3].parse().ok()?,
                })
            })
            .collect()
    }
}

impl Default for RfcommTableParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowest tty index not taken by an existing binding
pub fn next_free_index(bindings: &[RfcommBinding]) -> Option<u8> {
    (0..=u8::MAX).find(|i| bindings.iter().all(|b| b.index != *i))
}

pub struct RfcommTransport {
    config: RfcommConfig,
    parser: RfcommTableParser,
}

impl RfcommTransport {
    pub fn new(config: RfcommConfig) -> Self {
        Self {
            config,
            parser: RfcommTableParser::new(),
        }
    }

    async fn bindings(&self) -> Vec<RfcommBinding> {
        match tokio::fs::read_to_string(PROC_RFCOMM).await {
            Ok(table) => self.parser.parse(&table),
            Err(e) => {
                debug!(error = %e, "RFCOMM table unavailable");
                Vec::new()
            }
        }
    }

    /// Existing tty for `address`, or a fresh binding. A binding made here
    /// comes back with the guard that releases it.
    async fn resolve_tty(
        &self,
        address: &DeviceAddress,
    ) -> Result<(RfcommBinding, Option<BindingGuard>), TransportError> {
        let bindings = self.bindings().await;
        if let Some(existing) = bindings.iter().find(|b| b.address == address.as_str()) {
            debug!(address = %address, tty = %existing.device_path(), "Reusing RFCOMM binding");
            return Ok((existing.clone(), None));
        }

        if !self.config.auto_bind {
            return Err(TransportError::Rejected(format!(
                "{address} has no RFCOMM binding and auto_bind is off"
            )));
        }

        let index = next_free_index(&bindings)
            .ok_or_else(|| TransportError::Io("no free RFCOMM tty index".to_string()))?;
        let binding = RfcommBinding {
            index,
            address: address.to_string(),
            channel: self.config.channel,
        };

        info!(address = %address, tty = %binding.device_path(), "Binding RFCOMM tty");
        // armed before the bind runs: a cancelled bind may still have taken the index
        let guard = BindingGuard::new(self.config.rfcomm_command.clone(), index);
        let output = match Command::new(&self.config.rfcomm_command)
            .arg("bind")
            .arg(index.to_string())
            .arg(address.as_str())
            .arg(self.config.channel.to_string())
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                guard.disarm();
                return Err(TransportError::Io(format!("failed to run rfcomm bind: {e}")));
            }
        };
        if !output.status.success() {
            guard.disarm();
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Rejected(format!(
                "rfcomm bind failed: {}",
                stderr.trim()
            )));
        }

        if let Err(e) = self.wait_for_node(&binding.device_path()).await {
            guard.release().await;
            return Err(e);
        }
        Ok((binding, Some(guard)))
    }

    async fn wait_for_node(&self, path: &str) -> Result<(), TransportError> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.config.bind_settle_ms);
        while !Path::new(path).exists() {
            if tokio::time::Instant::now() >= deadline {
                return Err(TransportError::Io(format!("{path} was not created")));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(())
    }
}

#[async_trait]
impl TransportChannel for RfcommTransport {
    async fn open(&self, address: &DeviceAddress) -> Result<OpenChannel, TransportError> {
        if !address.is_full_mac() {
            return Err(TransportError::Rejected(format!(
                "{address} is not a full Bluetooth MAC address"
            )));
        }

        let (binding, guard) = self.resolve_tty(address).await?;
        let path = binding.device_path();

        debug!(tty = %path, baud_rate = self.config.baud_rate, "Opening RFCOMM tty");
        // opening the tty is what establishes the baseband link
        let stream = match tokio_serial::new(&path, self.config.baud_rate).open_native_async() {
            Ok(stream) => stream,
            Err(e) => {
                warn!(tty = %path, error = %e, "Failed to open RFCOMM tty");
                if let Some(guard) = guard {
                    guard.release().await;
                }
                return Err(TransportError::Io(format!("failed to open {path}: {e}")));
            }
        };

        let name = bluetoothctl::device_name(address).await;
        let (reader, writer) = tokio::io::split(stream);
        let (lost_tx, lost_rx) = oneshot::channel();
        let reader_task = tokio::spawn(watch_link(reader, path.clone(), lost_tx));

        info!(address = %address, tty = %path, "RFCOMM channel open");
        Ok(OpenChannel {
            handle: Box::new(RfcommHandle {
                path,
                writer,
                reader_task,
                binding: guard,
                chunk_size: self.config.chunk_size.max(1),
                chunk_delay: Duration::from_millis(self.config.chunk_delay_ms),
            }),
            name,
            disconnected: async move {
                // Err: the handle was closed and took the watcher with it
                if lost_rx.await.is_err() {
                    futures::future::pending::<()>().await;
                }
            }
            .boxed(),
        })
    }

    fn kind(&self) -> &str {
        "rfcomm"
    }
}

/// Drain whatever the printer sends back; finishing means the link is gone
async fn watch_link(mut reader: ReadHalf<SerialStream>, path: String, lost: oneshot::Sender<()>) {
    let mut buf = [0u8; 256];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!(tty = %path, "RFCOMM tty reached end of stream");
                break;
            }
            Ok(n) => debug!(tty = %path, bytes = n, "Discarding printer status bytes"),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => {
                warn!(tty = %path, error = %e, "RFCOMM read failed");
                break;
            }
        }
    }
    let _ = lost.send(());
}

/// A tty binding this process created. Dropping it while still armed, for
/// instance when the open future is cancelled, releases it on the runtime.
struct BindingGuard {
    command: String,
    index: Option<u8>,
}

impl BindingGuard {
    fn new(command: String, index: u8) -> Self {
        Self {
            command,
            index: Some(index),
        }
    }

    /// Nothing was bound after all
    fn disarm(mut self) {
        self.index = None;
    }

    async fn release(mut self) {
        if let Some(index) = self.index.take() {
            release_binding(std::mem::take(&mut self.command), index).await;
        }
    }
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        let Some(index) = self.index.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(index, "Releasing RFCOMM binding of an abandoned channel");
                runtime.spawn(release_binding(std::mem::take(&mut self.command), index));
            }
            Err(_) => warn!(index, "No runtime left to release RFCOMM binding"),
        }
    }
}

async fn release_binding(command: String, index: u8) {
    match Command::new(&command)
        .arg("release")
        .arg(index.to_string())
        .kill_on_drop(true)
        .output()
        .await
    {
        Ok(output) if output.status.success() => debug!(index, "Released RFCOMM binding"),
        Ok(output) => warn!(
            index,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "rfcomm release failed"
        ),
        Err(e) => warn!(index, error = %e, "Failed to run rfcomm release"),
    }
}

fn map_io_error(err: std::io::Error) -> TransportError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => TransportError::Closed,
        _ => TransportError::Io(err.to_string()),
    }
}

struct RfcommHandle {
    path: String,
    writer: WriteHalf<SerialStream>,
    reader_task: JoinHandle<()>,
    binding: Option<BindingGuard>,
    chunk_size: usize,
    chunk_delay: Duration,
}

#[async_trait]
impl TransportHandle for RfcommHandle {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut chunks = bytes.chunks(self.chunk_size).peekable();
        while let Some(chunk) = chunks.next() {
            self.writer.write_all(chunk).await.map_err(map_io_error)?;
            if chunks.peek().is_some() && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }
        self.writer.flush().await.map_err(map_io_error)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.reader_task.abort();
        let result = self.writer.shutdown().await.map_err(map_io_error);
        if let Some(guard) = self.binding.take() {
            guard.release().await;
        }
        debug!(tty = %self.path, "RFCOMM channel closed");
        result
    }
}

impl Drop for RfcommHandle {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

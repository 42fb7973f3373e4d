//! Host adapter driven through the BlueZ `bluetoothctl` command line tool

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use domain::adapter::{AdapterError, BluetoothAdapter};
use domain::{BondState, Device, DeviceAddress};

/// Parses the human-oriented output of bluetoothctl
#[derive(Debug, Clone)]
pub struct BluetoothctlParser {
    powered: Regex,
    device: Regex,
    name: Regex,
}

impl BluetoothctlParser {
    pub fn new() -> Self {
        Self {
            powered: Regex::new(r"(?m)^\s*Powered:\s*(yes|no)").expect("Invalid regex"),
            // "Device 00:11:22:33:44:55 Printer" or "[NEW] Device 00:11:... Printer"
            device: Regex::new(
                r"(?m)^(?:\[(NEW|CHG)\]\s+)?Device\s+([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})(?:\s+(.*?))?\s*$",
            )
            .expect("Invalid regex"),
            name: Regex::new(r"(?m)^\s*Name:\s*(.+?)\s*$").expect("Invalid regex"),
        }
    }

    /// `Powered:` line of `bluetoothctl show`
    pub fn powered(&self, output: &str) -> Option<bool> {
        self.powered
            .captures(output)
            .map(|caps| &caps[1] == "yes")
    }

    /// Device lines of `bluetoothctl devices`
    pub fn devices(&self, output: &str, bond_state: BondState) -> Vec<Device> {
        output
            .lines()
            .filter_map(|line| self.device_line(line))
            .map(|(address, name)| Device::new(address, name, bond_state))
            .collect()
    }

    /// One line of `scan on` output; only `[NEW]` announcements and plain
    /// device lines count as sightings
    pub fn discovered(&self, line: &str) -> Option<Device> {
        let line = strip_ansi(line);
        let line = match line.split_once("]# ") {
            // "[bluetooth]# " prompt echoed in front of the event
            Some((prompt, rest)) if prompt.starts_with('[') && !prompt.contains(' ') => rest,
            _ => line.as_str(),
        };
        let caps = self.device.captures(line.trim())?;
        if caps.get(1).is_some_and(|tag| tag.as_str() != "NEW") {
            return None;
        }
        let address = DeviceAddress::new(&caps[2]).ok()?;
        let name = caps
            .get(3)
            .map(|m| m.as_str().to_string())
            .filter(|name| !looks_like_address(name));
        Some(Device::new(address, name, BondState::Unknown))
    }

    /// `Name:` line of `bluetoothctl info`
    pub fn name(&self, output: &str) -> Option<String> {
        self.name.captures(output).map(|caps| caps[1].to_string())
    }

    fn device_line(&self, line: &str) -> Option<(DeviceAddress, Option<String>)> {
        let caps = self.device.captures(line.trim())?;
        let address = DeviceAddress::new(&caps[2]).ok()?;
        let name = caps.get(3).map(|m| m.as_str().to_string());
        Some((address, name))
    }
}

impl Default for BluetoothctlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Unnamed devices are announced with their address dashed in place of a name
fn looks_like_address(name: &str) -> bool {
    let groups: Vec<&str> = name.split(['-', ':']).collect();
    groups.len() == 6 && groups.iter().all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// bluetoothctl colours its prompt even when piped
fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else if c != '\u{1}' && c != '\u{2}' {
            out.push(c);
        }
    }
    out
}

pub struct BluetoothctlAdapter {
    scan_duration: Duration,
    parser: BluetoothctlParser,
}

impl BluetoothctlAdapter {
    pub fn new(scan_duration: Duration) -> Self {
        Self {
            scan_duration,
            parser: BluetoothctlParser::new(),
        }
    }
}

async fn run(args: &[&str]) -> Result<String, AdapterError> {
    debug!(?args, "Running bluetoothctl");
    let output = Command::new("bluetoothctl")
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AdapterError::Unsupported,
            _ => AdapterError::Command(format!("failed to run bluetoothctl: {e}")),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if stdout.contains("No default controller available") {
        return Err(AdapterError::Unsupported);
    }
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AdapterError::Command(format!(
            "bluetoothctl {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(stdout)
}

/// Advertised name of a device the host knows about
pub async fn device_name(address: &DeviceAddress) -> Option<String> {
    match run(&["info", address.as_str()]).await {
        Ok(output) => BluetoothctlParser::new().name(&output),
        Err(e) => {
            debug!(address = %address, error = %e, "No device info");
            None
        }
    }
}

#[async_trait]
impl BluetoothAdapter for BluetoothctlAdapter {
    async fn is_enabled(&self) -> Result<bool, AdapterError> {
        let output = run(&["show"]).await?;
        self.parser
            .powered(&output)
            .ok_or_else(|| AdapterError::Command("no Powered line in bluetoothctl show".to_string()))
    }

    async fn enable(&self) -> Result<(), AdapterError> {
        run(&["power", "on"]).await?;
        info!("Adapter powered on");
        Ok(())
    }

    async fn disable(&self) -> Result<(), AdapterError> {
        run(&["power", "off"]).await?;
        info!("Adapter powered off");
        Ok(())
    }

    async fn paired_devices(&self) -> Result<Vec<Device>, AdapterError> {
        // BlueZ >= 5.65 takes a filter; older releases have paired-devices
        let output = match run(&["devices", "Paired"]).await {
            Ok(output) => output,
            Err(AdapterError::Command(_)) => run(&["paired-devices"]).await?,
            Err(e) => return Err(e),
        };
        Ok(self.parser.devices(&output, BondState::Paired))
    }

    async fn discover(&self) -> Result<BoxStream<'static, Device>, AdapterError> {
        let secs = self.scan_duration.as_secs().max(1).to_string();
        let mut child = Command::new("bluetoothctl")
            .args(["--timeout", secs.as_str(), "scan", "on"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdapterError::Command(format!("failed to start scan: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AdapterError::Command("scan output not captured".to_string()))?;

        let parser = Arc::new(self.parser.clone());
        let lines = BufReader::new(stdout).lines();
        // the child rides along in the stream state so dropping the stream kills it
        let stream = stream::unfold((lines, child), move |(mut lines, child)| {
            let parser = parser.clone();
            async move {
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if let Some(device) = parser.discovered(&line) {
                                return Some((device, (lines, child)));
                            }
                        }
                        Ok(None) => return None,
                        Err(e) => {
                            warn!(error = %e, "Scan output unreadable");
                            return None;
                        }
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn remove_bond(&self, address: &DeviceAddress) -> Result<(), AdapterError> {
        let output = run(&["remove", address.as_str()]).await?;
        if output.contains("not available") {
            return Err(AdapterError::UnknownDevice(address.clone()));
        }
        info!(address = %address, "Bond removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_powered() {
        let parser = BluetoothctlParser::new();
        let show = "Controller 00:1A:7D:DA:71:13 (public)\n\tName: host\n\tPowered: yes\n";
        assert_eq!(parser.powered(show), Some(true));
        assert_eq!(parser.powered("\tPowered: no\n"), Some(false));
        assert_eq!(parser.powered("garbage"), None);
    }

    #[test]
    fn test_paired_devices() {
        let parser = BluetoothctlParser::new();
        let output = "Device 00:11:62:AA:BB:CC MTP-II\nDevice 66:22:E1:00:00:01 Inner Printer\n";
        let devices = parser.devices(output, BondState::Paired);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name.as_deref(), Some("MTP-II"));
        assert_eq!(devices[1].name.as_deref(), Some("Inner Printer"));
        assert!(devices.iter().all(Device::is_paired));
    }

    #[test]
    fn test_discovered_lines() {
        let parser = BluetoothctlParser::new();

        let device = parser
            .discovered("[NEW] Device 00:11:62:AA:BB:CC MTP-II")
            .unwrap();
        assert_eq!(device.address.as_str(), "00:11:62:AA:BB:CC");
        assert_eq!(device.name.as_deref(), Some("MTP-II"));
        assert_eq!(device.bond_state, BondState::Unknown);

        let unnamed = parser
            .discovered("[NEW] Device 11:22:33:44:55:66 11-22-33-44-55-66")
            .unwrap();
        assert_eq!(unnamed.name, None);

        assert!(parser
            .discovered("[CHG] Device 00:11:62:AA:BB:CC RSSI: -60")
            .is_none());
        assert!(parser.discovered("Discovery started").is_none());
    }

    #[test]
    fn test_discovered_strips_prompt_colours() {
        let parser = BluetoothctlParser::new();
        let line = "\u{1b}[0;92m[NEW]\u{1b}[0m Device 00:11:62:AA:BB:CC MTP-II";
        assert!(parser.discovered(line).is_some());
    }

    #[test]
    fn test_info_name() {
        let parser = BluetoothctlParser::new();
        let info = "Device 00:11:62:AA:BB:CC (public)\n\tName: MTP-II\n\tAlias: MTP-II\n";
        assert_eq!(parser.name(info).as_deref(), Some("MTP-II"));
    }
}

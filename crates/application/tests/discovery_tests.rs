use std::sync::Arc;

use application::{DiscoveryConfig, DiscoveryEngine, EventBus, EventSubscription};
use async_trait::async_trait;
use domain::adapter::{AdapterError, BluetoothAdapter};
use domain::{BluetoothError, BondState, Device, DeviceAddress, PrinterEvent};
use futures::StreamExt;
use futures::stream::BoxStream;
use infrastructure::SimulatedAdapter;
use infrastructure::adapter::{SimulatedAdapterConfig, SimulatedDevice};
use mockall::mock;

mock! {
    pub Adapter {}

    #[async_trait]
    impl BluetoothAdapter for Adapter {
        async fn is_enabled(&self) -> Result<bool, AdapterError>;
        async fn enable(&self) -> Result<(), AdapterError>;
        async fn disable(&self) -> Result<(), AdapterError>;
        async fn paired_devices(&self) -> Result<Vec<Device>, AdapterError>;
        async fn discover(&self) -> Result<BoxStream<'static, Device>, AdapterError>;
        async fn remove_bond(&self, address: &DeviceAddress) -> Result<(), AdapterError>;
    }
}

const PAIRED: &str = "00:11:62:00:00:01";
const NEARBY: &str = "00:11:62:00:00:02";
const FARAWAY: &str = "00:11:62:00:00:03";

fn addr(s: &str) -> DeviceAddress {
    DeviceAddress::new(s).unwrap()
}

fn seen(address: &str, name: &str) -> Device {
    Device::new(addr(address), Some(name.to_string()), BondState::Unknown)
}

fn engine(adapter: impl BluetoothAdapter + 'static) -> (DiscoveryEngine, EventSubscription) {
    let bus = Arc::new(EventBus::new());
    let events = bus.subscribe();
    let engine = DiscoveryEngine::new(Arc::new(adapter), bus, DiscoveryConfig::default());
    (engine, events)
}

fn simulated(interval_ms: u64) -> SimulatedAdapter {
    SimulatedAdapter::new(SimulatedAdapterConfig {
        devices: vec![
            SimulatedDevice {
                address: addr(PAIRED),
                name: Some("Kitchen".to_string()),
                paired: true,
            },
            SimulatedDevice {
                address: addr(NEARBY),
                name: Some("Bar".to_string()),
                paired: false,
            },
        ],
        discovery_interval_ms: interval_ms,
        ..SimulatedAdapterConfig::default()
    })
}

fn event_types(events: &mut EventSubscription) -> Vec<&'static str> {
    events.drain().iter().map(PrinterEvent::event_type).collect()
}

#[tokio::test]
async fn test_scan_reports_paired_then_new_devices_once() {
    let mut adapter = MockAdapter::new();
    adapter.expect_is_enabled().returning(|| Ok(true));
    adapter
        .expect_paired_devices()
        .returning(|| Ok(vec![Device::paired(addr(PAIRED), Some("Kitchen".to_string()))]));
    adapter.expect_discover().returning(|| {
        Ok(futures::stream::iter(vec![
            seen(NEARBY, "Bar"),
            seen(NEARBY, "Bar"),
            seen(PAIRED, "Kitchen"),
            Device::paired(addr("00:11:62:00:00:09"), None),
            seen(FARAWAY, "Terrace"),
        ])
        .boxed())
    });
    let (engine, mut events) = engine(adapter);

    let handle = engine.scan().await.unwrap();
    assert_eq!(handle.paired().len(), 1);

    let results = handle.finished().await;
    let found: Vec<&str> = results.found.iter().map(|d| d.address.as_str()).collect();
    assert_eq!(found, vec![NEARBY, FARAWAY]);
    assert_eq!(results.paired[0].address, addr(PAIRED));

    assert_eq!(
        event_types(&mut events),
        vec![
            "device-already-paired",
            "device-found",
            "device-found",
            "discovery-done"
        ]
    );
    assert_eq!(engine.known_devices().len(), 3);
}

#[tokio::test]
async fn test_each_scan_starts_a_fresh_dedup_set() {
    let (engine, _events) = engine(simulated(0));

    let first = engine.scan().await.unwrap().finished().await;
    let second = engine.scan().await.unwrap().finished().await;

    assert_eq!(first.found, second.found);
    assert_eq!(first.found.len(), 1);
    assert_eq!(first.paired, second.paired);
}

#[tokio::test(start_paused = true)]
async fn test_new_scan_cancels_running_one() {
    let (engine, mut events) = engine(simulated(1_000));

    let first = engine.scan().await.unwrap();
    let second = engine.scan().await.unwrap();

    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
    assert!(first.finished().await.found.is_empty());
    assert_eq!(second.finished().await.found.len(), 1);

    let done = event_types(&mut events)
        .into_iter()
        .filter(|kind| *kind == PrinterEvent::DISCOVERY_DONE)
        .count();
    assert_eq!(done, 1);
}

#[tokio::test(start_paused = true)]
async fn test_scan_window_is_bounded() {
    let mut adapter = MockAdapter::new();
    adapter.expect_is_enabled().returning(|| Ok(true));
    adapter.expect_paired_devices().returning(|| Ok(vec![]));
    adapter
        .expect_discover()
        .returning(|| Ok(futures::stream::pending().boxed()));
    let (engine, _events) = engine(adapter);

    let results = engine.scan().await.unwrap().finished().await;

    assert!(results.found.is_empty());
}

#[tokio::test]
async fn test_unsupported_host() {
    let mut adapter = MockAdapter::new();
    adapter
        .expect_is_enabled()
        .returning(|| Err(AdapterError::Unsupported));
    adapter.expect_discover().never();
    let (engine, mut events) = engine(adapter);

    let err = engine.scan().await.err().unwrap();

    assert_eq!(err, BluetoothError::BluetoothUnsupported);
    assert_eq!(event_types(&mut events), vec!["bluetooth-unsupported"]);
}

#[tokio::test]
async fn test_disabled_adapter() {
    let mut adapter = MockAdapter::new();
    adapter.expect_is_enabled().returning(|| Ok(false));
    adapter.expect_discover().never();
    let (engine, mut events) = engine(adapter);

    let err = engine.scan().await.err().unwrap();

    assert_eq!(err, BluetoothError::BluetoothDisabled);
    assert!(event_types(&mut events).is_empty());
}

#[tokio::test]
async fn test_transient_adapter_errors_are_swallowed() {
    let mut adapter = MockAdapter::new();
    adapter.expect_is_enabled().returning(|| Ok(true));
    adapter
        .expect_paired_devices()
        .returning(|| Err(AdapterError::Command("dbus timeout".to_string())));
    adapter
        .expect_discover()
        .returning(|| Err(AdapterError::Command("busy".to_string())));
    let (engine, mut events) = engine(adapter);

    let results = engine.scan().await.unwrap().finished().await;

    assert!(results.paired.is_empty());
    assert!(results.found.is_empty());
    assert_eq!(
        event_types(&mut events),
        vec!["device-already-paired", "discovery-done"]
    );
}

#[tokio::test]
async fn test_unreadable_power_state_does_not_abort_scan() {
    let mut adapter = MockAdapter::new();
    adapter
        .expect_is_enabled()
        .returning(|| Err(AdapterError::Command("bluetoothctl show failed".to_string())));
    adapter
        .expect_paired_devices()
        .returning(|| Ok(vec![Device::paired(addr(PAIRED), None)]));
    adapter
        .expect_discover()
        .returning(|| Ok(futures::stream::iter(vec![seen(NEARBY, "Bar")]).boxed()));
    let (engine, mut events) = engine(adapter);

    let results = engine.scan().await.unwrap().finished().await;

    assert_eq!(results.paired.len(), 1);
    assert_eq!(results.found.len(), 1);
    assert_eq!(
        event_types(&mut events),
        vec!["device-already-paired", "device-found", "discovery-done"]
    );
}

#[tokio::test]
async fn test_unpair_requires_known_pairing() {
    let mut adapter = MockAdapter::new();
    adapter.expect_is_enabled().returning(|| Ok(true));
    adapter
        .expect_paired_devices()
        .returning(|| Ok(vec![Device::paired(addr(PAIRED), None)]));
    adapter
        .expect_discover()
        .returning(|| Ok(futures::stream::empty().boxed()));
    adapter
        .expect_remove_bond()
        .withf(|address| address.as_str() == PAIRED)
        .times(1)
        .returning(|_| Ok(()));
    let (engine, _events) = engine(adapter);

    assert_eq!(
        engine.unpair(&addr(PAIRED)).await.unwrap_err(),
        BluetoothError::DeviceNotFound {
            address: addr(PAIRED)
        }
    );

    engine.scan().await.unwrap().finished().await;
    engine.unpair(&addr(PAIRED)).await.unwrap();

    assert!(!engine.is_known_paired(&addr(PAIRED)));
    assert!(engine.device(&addr(PAIRED)).is_none());
    assert!(matches!(
        engine.unpair(&addr(PAIRED)).await,
        Err(BluetoothError::DeviceNotFound { .. })
    ));
}

#[tokio::test]
async fn test_unpair_surfaces_adapter_failure() {
    let mut adapter = MockAdapter::new();
    adapter
        .expect_paired_devices()
        .returning(|| Ok(vec![Device::paired(addr(PAIRED), None)]));
    adapter
        .expect_remove_bond()
        .returning(|_| Err(AdapterError::Command("permission denied".to_string())));
    let (engine, _events) = engine(adapter);
    engine.refresh_paired().await;

    let err = engine.unpair(&addr(PAIRED)).await.unwrap_err();

    assert_eq!(err, BluetoothError::Adapter("permission denied".to_string()));
    assert!(engine.is_known_paired(&addr(PAIRED)));
}

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use application::{EventBus, EventSubscription, SessionConfig, SessionManager};
use domain::transport::TransportError;
use domain::{
    BluetoothError, ConnectFailure, ConnectionState, DeviceAddress, PrinterEvent, SessionStatus,
};
use infrastructure::MockTransport;

const PRINTER: &str = "00:11:62:AA:BB:CC";
const OTHER: &str = "00:11:62:AA:BB:DD";

fn addr(s: &str) -> DeviceAddress {
    DeviceAddress::new(s).unwrap()
}

fn setup(config: SessionConfig) -> (SessionManager, MockTransport, EventSubscription) {
    let transport = MockTransport::new().with_device(addr(PRINTER), "MTP-II");
    let bus = Arc::new(EventBus::new());
    let events = bus.subscribe();
    let (manager, _handle) = SessionManager::spawn(Arc::new(transport.clone()), bus, config);
    (manager, transport, events)
}

async fn next_event(events: &mut EventSubscription) -> PrinterEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event bus closed")
}

fn event_types(events: &mut EventSubscription) -> Vec<&'static str> {
    events.drain().iter().map(PrinterEvent::event_type).collect()
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let (manager, transport, mut events) = setup(SessionConfig::default());

    let first = manager.connect(&addr(PRINTER)).await.unwrap();
    let second = manager.connect(&addr(PRINTER)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.name.as_deref(), Some("MTP-II"));
    assert_eq!(transport.open_count(), 1);
    assert_eq!(event_types(&mut events), vec!["connected"]);
    assert!(manager.is_connected());
    assert_eq!(manager.connected_address(), Some(addr(PRINTER)));
}

#[tokio::test]
async fn test_concurrent_connects_to_same_address_share_one_open() {
    let (manager, transport, _events) = setup(SessionConfig::default());
    transport.set_open_delay(Duration::from_millis(50));

    let (addr_a, addr_b) = (addr(PRINTER), addr(PRINTER));
    let (a, b) = tokio::join!(manager.connect(&addr_a), manager.connect(&addr_b));

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test]
async fn test_concurrent_sends_never_interleave() {
    let (manager, transport, _events) = setup(SessionConfig::default());
    manager.connect(&addr(PRINTER)).await.unwrap();
    // the mock yields after every byte, so interleaving would show up
    transport.set_write_chunk(Some(1));

    let mut tasks = Vec::new();
    for i in 0..10u8 {
        let manager = manager.clone();
        tasks.push(tokio::spawn(async move { manager.send(vec![i; 20]).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let data = transport.sent_data();
    assert_eq!(data.len(), 200);
    let mut seen = HashSet::new();
    for block in data.chunks(20) {
        assert!(block.iter().all(|b| *b == block[0]), "interleaved: {block:?}");
        seen.insert(block[0]);
    }
    assert_eq!(seen.len(), 10);
}

#[tokio::test]
async fn test_sends_are_written_in_acceptance_order() {
    let (manager, transport, _events) = setup(SessionConfig::default());
    manager.connect(&addr(PRINTER)).await.unwrap();

    for payload in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
        manager.send(payload).await.unwrap();
    }

    assert_eq!(
        transport.writes(),
        vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
    );
}

#[tokio::test]
async fn test_send_without_session_fails() {
    let (manager, transport, _events) = setup(SessionConfig::default());

    let err = manager.send(b"x".to_vec()).await.unwrap_err();

    assert_eq!(err, BluetoothError::NotConnected);
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn test_status_tracks_every_lifecycle_step() {
    let (manager, transport, mut events) = setup(SessionConfig::default());
    let mut status = manager.watch_status();

    transport.fail_next_open(TransportError::Timeout);
    manager.connect(&addr(PRINTER)).await.unwrap_err();
    assert_eq!(manager.status(), SessionStatus::disconnected());

    manager.connect(&addr(PRINTER)).await.unwrap();
    assert!(status.has_changed().unwrap());
    let snapshot = status.borrow_and_update().clone();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.connected_address(), Some(&addr(PRINTER)));
    events.drain();

    assert!(transport.drop_link());
    next_event(&mut events).await;
    assert_eq!(manager.status().state, ConnectionState::Disconnected);

    manager.connect(&addr(PRINTER)).await.unwrap();
    assert_eq!(manager.status().state, ConnectionState::Connected);
    assert_eq!(transport.open_count(), 3);
}

#[tokio::test]
async fn test_link_loss_is_reported_once() {
    let (manager, transport, mut events) = setup(SessionConfig::default());
    manager.connect(&addr(PRINTER)).await.unwrap();
    events.drain();

    assert!(transport.drop_link());
    let event = next_event(&mut events).await;

    assert_eq!(event.event_type(), PrinterEvent::CONNECTION_LOST);
    assert_eq!(event.address(), Some(&addr(PRINTER)));
    assert!(!manager.is_connected());
    assert_eq!(manager.connected_address(), None);
    assert_eq!(
        manager.send(b"x".to_vec()).await.unwrap_err(),
        BluetoothError::NotConnected
    );

    settle().await;
    assert!(event_types(&mut events).is_empty());
}

#[tokio::test]
async fn test_disconnect_when_idle_is_silent() {
    let (manager, transport, mut events) = setup(SessionConfig::default());

    manager.disconnect().await;
    settle().await;

    assert!(event_types(&mut events).is_empty());
    assert_eq!(transport.close_count(), 0);
    assert_eq!(manager.status().state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_disconnect_closes_session() {
    let (manager, transport, mut events) = setup(SessionConfig::default());
    manager.connect(&addr(PRINTER)).await.unwrap();

    manager.disconnect().await;

    assert!(!manager.is_connected());
    assert_eq!(transport.close_count(), 1);
    assert_eq!(event_types(&mut events), vec!["connected", "disconnected"]);
}

#[tokio::test]
async fn test_disconnect_device_only_matches_target() {
    let (manager, _transport, _events) = setup(SessionConfig::default());
    manager.connect(&addr(PRINTER)).await.unwrap();

    assert!(!manager.disconnect_device(&addr(OTHER)).await);
    assert!(manager.is_connected());

    assert!(manager.disconnect_device(&addr(PRINTER)).await);
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_switching_devices_disconnects_previous() {
    let (manager, transport, mut events) = setup(SessionConfig::default());
    manager.connect(&addr(PRINTER)).await.unwrap();

    let device = manager.connect(&addr(OTHER)).await.unwrap();

    assert_eq!(device.address, addr(OTHER));
    assert_eq!(transport.open_count(), 2);
    assert_eq!(transport.close_count(), 1);
    let events = events.drain();
    let kinds: Vec<_> = events.iter().map(PrinterEvent::event_type).collect();
    assert_eq!(kinds, vec!["connected", "disconnected", "connected"]);
    assert_eq!(events[1].address(), Some(&addr(PRINTER)));
}

#[tokio::test]
async fn test_open_failure_reports_unable_to_connect() {
    let (manager, transport, mut events) = setup(SessionConfig::default());
    transport.fail_next_open(TransportError::Rejected("host is down".to_string()));

    let err = manager.connect(&addr(PRINTER)).await.unwrap_err();

    assert_eq!(
        err,
        BluetoothError::ConnectionFailed {
            address: addr(PRINTER),
            reason: ConnectFailure::Rejected("host is down".to_string()),
        }
    );
    assert_eq!(manager.status().state, ConnectionState::Disconnected);
    assert_eq!(event_types(&mut events), vec!["unable-to-connect"]);

    // a later attempt starts from scratch
    assert!(manager.connect(&addr(PRINTER)).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout() {
    let config = SessionConfig {
        connect_timeout_ms: 1_000,
        ..SessionConfig::default()
    };
    let (manager, transport, mut events) = setup(config);
    transport.set_open_delay(Duration::from_secs(60));

    let err = manager.connect(&addr(PRINTER)).await.unwrap_err();

    assert_eq!(
        err,
        BluetoothError::ConnectionFailed {
            address: addr(PRINTER),
            reason: ConnectFailure::Timeout,
        }
    );
    assert_eq!(event_types(&mut events), vec!["unable-to-connect"]);
    assert!(!manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_supersedes_pending_connect() {
    let (manager, transport, mut events) = setup(SessionConfig::default());
    transport.set_open_delay(Duration::from_secs(2));

    let pending = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.connect(&addr(PRINTER)).await })
    };
    let mut status = manager.watch_status();
    status
        .wait_for(|s| s.state == ConnectionState::Connecting)
        .await
        .unwrap();

    manager.disconnect().await;

    assert_eq!(
        pending.await.unwrap().unwrap_err(),
        BluetoothError::Superseded {
            address: addr(PRINTER)
        }
    );
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!manager.is_connected());
    assert!(event_types(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_address_rejected_while_connecting() {
    let (manager, transport, _events) = setup(SessionConfig::default());
    transport.set_open_delay(Duration::from_secs(1));

    let pending = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.connect(&addr(PRINTER)).await })
    };
    manager
        .watch_status()
        .wait_for(|s| s.state == ConnectionState::Connecting)
        .await
        .unwrap();

    let err = manager.connect(&addr(OTHER)).await.unwrap_err();

    assert_eq!(
        err,
        BluetoothError::AlreadyConnecting {
            in_flight: addr(PRINTER),
            requested: addr(OTHER),
        }
    );
    assert!(pending.await.unwrap().is_ok());
    assert_eq!(manager.connected_address(), Some(addr(PRINTER)));
}

#[tokio::test(start_paused = true)]
async fn test_supersede_policy_replaces_pending_connect() {
    let config = SessionConfig {
        supersede_pending_connect: true,
        ..SessionConfig::default()
    };
    let (manager, transport, _events) = setup(config);
    transport.set_open_delay(Duration::from_secs(1));

    let pending = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.connect(&addr(PRINTER)).await })
    };
    manager
        .watch_status()
        .wait_for(|s| s.state == ConnectionState::Connecting)
        .await
        .unwrap();

    let device = manager.connect(&addr(OTHER)).await.unwrap();

    assert_eq!(device.address, addr(OTHER));
    assert_eq!(
        pending.await.unwrap().unwrap_err(),
        BluetoothError::Superseded {
            address: addr(PRINTER)
        }
    );
    assert_eq!(manager.connected_address(), Some(addr(OTHER)));
}

#[tokio::test]
async fn test_write_failure_drops_session() {
    let (manager, transport, mut events) = setup(SessionConfig::default());
    manager.connect(&addr(PRINTER)).await.unwrap();
    events.drain();
    transport.set_write_failure(Some(TransportError::Io("buffer overrun".to_string())));

    let err = manager.send(b"x".to_vec()).await.unwrap_err();

    assert_eq!(
        err,
        BluetoothError::TransportWriteFailed {
            address: addr(PRINTER),
            reason: "I/O failed: buffer overrun".to_string(),
        }
    );
    assert!(!manager.is_connected());
    assert_eq!(event_types(&mut events), vec!["connection-lost"]);
}

#[tokio::test(start_paused = true)]
async fn test_write_timeout_counts_as_failure() {
    let config = SessionConfig {
        write_timeout_ms: 500,
        ..SessionConfig::default()
    };
    let (manager, transport, _events) = setup(config);
    manager.connect(&addr(PRINTER)).await.unwrap();
    transport.set_write_delay(Duration::from_secs(30));

    let err = manager.send(b"x".to_vec()).await.unwrap_err();

    assert!(matches!(err, BluetoothError::TransportWriteFailed { .. }));
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_shutdown_closes_session_and_rejects_requests() {
    let (manager, transport, mut events) = setup(SessionConfig::default());
    manager.connect(&addr(PRINTER)).await.unwrap();

    manager.shutdown();
    let err = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match manager.connect(&addr(PRINTER)).await {
                Err(BluetoothError::ManagerStopped) => break BluetoothError::ManagerStopped,
                _ => tokio::task::yield_now().await,
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(err, BluetoothError::ManagerStopped);
    assert_eq!(transport.close_count(), 1);
    assert_eq!(event_types(&mut events), vec!["connected", "disconnected"]);
}

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::oneshot;

use domain::DeviceAddress;
use domain::transport::{OpenChannel, TransportChannel, TransportError, TransportHandle};

/// In-memory transport that records every write and lets tests script
/// failures, latency and link drops.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    opens: AtomicUsize,
    closes: AtomicUsize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    names: HashMap<DeviceAddress, String>,
    unreachable: HashSet<DeviceAddress>,
    open_failures: VecDeque<TransportError>,
    write_failure: Option<TransportError>,
    open_delay: Duration,
    write_delay: Duration,
    /// Split each write into pieces of this size, yielding between them
    write_chunk: Option<usize>,
    writes: Vec<Vec<u8>>,
    sent_data: Vec<u8>,
    links: Vec<(usize, oneshot::Sender<()>)>,
    dropped: HashSet<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name reported for `address` when it connects
    pub fn with_device(self, address: DeviceAddress, name: &str) -> Self {
        self.lock().names.insert(address, name.to_string());
        self
    }

    /// Every open to `address` is rejected
    pub fn set_unreachable(&self, address: DeviceAddress) {
        self.lock().unreachable.insert(address);
    }

    /// The next open fails with `error`, whatever the address
    pub fn fail_next_open(&self, error: TransportError) {
        self.lock().open_failures.push_back(error);
    }

    /// All writes fail with `error` until cleared with None
    pub fn set_write_failure(&self, error: Option<TransportError>) {
        self.lock().write_failure = error;
    }

    pub fn set_open_delay(&self, delay: Duration) {
        self.lock().open_delay = delay;
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.lock().write_delay = delay;
    }

    pub fn set_write_chunk(&self, chunk: Option<usize>) {
        self.lock().write_chunk = chunk;
    }

    /// Simulate the remote end going away on the most recent open channel
    pub fn drop_link(&self) -> bool {
        let mut inner = self.lock();
        match inner.links.pop() {
            Some((id, link)) => {
                inner.dropped.insert(id);
                let _ = link.send(());
                true
            }
            None => false,
        }
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// One entry per successful write call
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Every byte written, in arrival order
    pub fn sent_data(&self) -> Vec<u8> {
        self.lock().sent_data.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.state
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TransportChannel for MockTransport {
    async fn open(&self, address: &DeviceAddress) -> Result<OpenChannel, TransportError> {
        let id = self.state.opens.fetch_add(1, Ordering::SeqCst);
        let delay = self.lock().open_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        if let Some(err) = inner.open_failures.pop_front() {
            return Err(err);
        }
        if inner.unreachable.contains(address) {
            return Err(TransportError::Rejected(format!("{address} is not reachable")));
        }

        let (link_tx, link_rx) = oneshot::channel();
        inner.links.push((id, link_tx));
        let name = inner.names.get(address).cloned();
        drop(inner);

        tracing::debug!(address = %address, id, "Mock channel opened");
        Ok(OpenChannel {
            handle: Box::new(MockHandle {
                id,
                transport: self.clone(),
                closed: false,
            }),
            name,
            disconnected: async move {
                // a dropped sender means the channel was closed locally
                if link_rx.await.is_err() {
                    futures::future::pending::<()>().await;
                }
            }
            .boxed(),
        })
    }

    fn kind(&self) -> &str {
        "mock"
    }
}

struct MockHandle {
    id: usize,
    transport: MockTransport,
    closed: bool,
}

#[async_trait]
impl TransportHandle for MockHandle {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let (failure, delay, chunk) = {
            let inner = self.transport.lock();
            if self.closed || inner.dropped.contains(&self.id) {
                return Err(TransportError::Closed);
            }
            (inner.write_failure.clone(), inner.write_delay, inner.write_chunk)
        };
        if let Some(err) = failure {
            return Err(err);
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match chunk {
            Some(size) if size > 0 => {
                for piece in bytes.chunks(size) {
                    self.transport.lock().sent_data.extend_from_slice(piece);
                    tokio::task::yield_now().await;
                }
            }
            _ => self.transport.lock().sent_data.extend_from_slice(bytes),
        }
        self.transport.lock().writes.push(bytes.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.transport.state.closes.fetch_add(1, Ordering::SeqCst);
            self.transport.lock().links.retain(|(id, _)| *id != self.id);
        }
        Ok(())
    }
}

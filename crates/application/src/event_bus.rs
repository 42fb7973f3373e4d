use std::sync::Mutex;

use async_trait::async_trait;
use domain::event::{EventPublisher, PrinterEvent};
use tokio::sync::mpsc;

/// Fan-out of printer events to any number of subscribers.
///
/// Every subscriber owns an unbounded queue, so a slow consumer only grows
/// its own backlog. Delivery happens under one lock, which keeps the order
/// identical across subscribers even with concurrent publishers.
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<PrinterEvent>>>,
}

/// Receiving end of a bus subscription; dropping it unsubscribes
pub struct EventSubscription {
    rx: mpsc::UnboundedReceiver<PrinterEvent>,
}

impl EventSubscription {
    /// Next event in emission order; None once the bus is gone
    pub async fn recv(&mut self) -> Option<PrinterEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll
    pub fn try_recv(&mut self) -> Option<PrinterEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain everything already delivered
    pub fn drain(&mut self) -> Vec<PrinterEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        EventSubscription { rx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every live subscriber; closed ones are pruned
    pub fn emit(&self, event: PrinterEvent) {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());

        let pruned = before - subscribers.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Dropped closed event subscribers");
        }
        tracing::trace!(event = event.event_type(), "Event emitted");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<PrinterEvent>>> {
        // a panicking subscriber cannot hold this lock, but recover anyway
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(
        &self,
        event: PrinterEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.emit(event);
        Ok(())
    }
}

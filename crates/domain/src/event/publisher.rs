use crate::event::PrinterEvent;
use async_trait::async_trait;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        event: PrinterEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

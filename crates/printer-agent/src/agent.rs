use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use application::{
    BluetoothManager, DiscoveryEngine, EscPosPrinter, EventBus, SessionManager,
};
use infrastructure::{AdapterFactory, PrinterAgentConfig, TransportFactory};

/// Everything the CLI talks to, wired from configuration
pub struct Agent {
    pub bluetooth: BluetoothManager,
    pub printer: EscPosPrinter,
    session_task: JoinHandle<()>,
}

impl Agent {
    /// Build the collaborators and spawn the session actor; needs a runtime
    pub fn start(config: &PrinterAgentConfig) -> Self {
        let events = Arc::new(EventBus::new());
        let adapter = AdapterFactory::create(&config.adapter, config.discovery.scan_duration());
        let transport = TransportFactory::create(&config.transport);
        info!(
            adapter = ?config.adapter.kind,
            transport = transport.kind(),
            "Wiring printer agent"
        );

        let discovery = Arc::new(DiscoveryEngine::new(
            adapter.clone(),
            events.clone(),
            config.discovery.clone(),
        ));
        let (session, session_task) =
            SessionManager::spawn(transport, events.clone(), config.session.clone());
        let printer = EscPosPrinter::with_default_options(session.clone(), config.printer.text.clone());

        Self {
            bluetooth: BluetoothManager::new(adapter, discovery, session, events),
            printer,
            session_task,
        }
    }

    /// Close the session and wait for the actor to finish
    pub async fn stop(self) {
        self.bluetooth.shutdown();
        if let Err(e) = self.session_task.await {
            warn!(error = %e, "Session task ended abnormally");
        }
    }
}

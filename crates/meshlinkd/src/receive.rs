//! Receive loop.
//!
//! Sole consumer of the mesh event channel. Link events update the shared
//! mesh state; payloads and child departures go to the dispatcher, which
//! owns the node registry.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;

use meshlink_services::{
    DispatchOutcome, Dispatcher, EventReceiver, MeshEvent, MeshTransport, StateSender,
};

pub struct ReceiveLoop {
    events: EventReceiver,
    dispatcher: Dispatcher,
    transport: Arc<dyn MeshTransport>,
    state: StateSender,
    shutdown: broadcast::Receiver<()>,
}

impl ReceiveLoop {
    pub fn new(
        events: EventReceiver,
        dispatcher: Dispatcher,
        transport: Arc<dyn MeshTransport>,
        state: StateSender,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            events,
            dispatcher,
            transport,
            state,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("receive loop shutting down");
                    return Ok(());
                }
                event = self.events.recv() => match event {
                    Some(e) => e,
                    None => {
                        tracing::info!("event channel closed");
                        return Ok(());
                    }
                },
            };
            self.handle(event);
        }
    }

    /// Apply one event. Returns the dispatch outcome for payload and
    /// departure events.
    pub fn handle(&mut self, event: MeshEvent) -> Option<DispatchOutcome> {
        if self.state.send_if_modified(|s| s.apply(&event)) {
            let state = self.state.borrow();
            tracing::info!(
                event = event.name(),
                connected = state.connected,
                layer = ?state.layer,
                root = ?state.root.map(|r| r.canonical()),
                "mesh state changed"
            );
        }

        match event {
            MeshEvent::Message { from, payload } => {
                let outcome = self
                    .dispatcher
                    .handle_payload(self.transport.role(), from, &payload);
                Some(outcome)
            }
            MeshEvent::ChildDisconnected(address) => {
                Some(self.dispatcher.handle_disconnect(address))
            }
            MeshEvent::ChildConnected(address) => {
                tracing::debug!(peer = %address, "child connected");
                None
            }
            other => {
                tracing::debug!(event = other.name(), "mesh event");
                None
            }
        }
    }

    #[cfg(test)]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

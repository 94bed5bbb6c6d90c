//! Event router: forwards engine notifications to the caller's event
//! channel and settles the pending operations they acknowledge.

use crate::registry::OperationRegistry;
use tokio::sync::mpsc;
use voxbridge_core::{BridgeEvent, EngineEvent, OperationKind, Settlement};

/// Pipeline lifecycle transition observed through an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Started,
    Stopped,
}

pub struct EventRouter {
    events: mpsc::UnboundedSender<BridgeEvent>,
}

impl EventRouter {
    pub fn new(events: mpsc::UnboundedSender<BridgeEvent>) -> Self {
        Self { events }
    }

    pub fn emit(&self, event: BridgeEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            tracing::trace!(event = name, "no event listener, dropped");
        }
    }

    /// Surfaces an asynchronous failure: fails everything pending and
    /// reports the error once on the event channel.
    pub fn fail_all(&self, registry: &mut OperationRegistry, message: &str) {
        let failed = registry.fail_all(message);
        tracing::error!(failed, "{message}");
        self.emit(BridgeEvent::Error {
            error: message.to_string(),
        });
    }

    pub fn route(&self, event: EngineEvent, registry: &mut OperationRegistry) -> Option<Lifecycle> {
        match event {
            EngineEvent::Start => {
                registry.settle(OperationKind::Start, Settlement::Done);
                self.emit(BridgeEvent::Start);
                Some(Lifecycle::Started)
            }
            EngineEvent::Stop => {
                registry.settle(OperationKind::Stop, Settlement::Done);
                self.emit(BridgeEvent::Stop);
                Some(Lifecycle::Stopped)
            }
            EngineEvent::Activate => {
                registry.settle(OperationKind::Activate, Settlement::Done);
                self.emit(BridgeEvent::Activate);
                None
            }
            EngineEvent::Deactivate => {
                registry.settle(OperationKind::Deactivate, Settlement::Done);
                self.emit(BridgeEvent::Deactivate);
                None
            }
            EngineEvent::Timeout => {
                self.emit(BridgeEvent::Timeout);
                None
            }
            EngineEvent::Recognize(transcript) => {
                self.emit(BridgeEvent::Recognize { transcript });
                None
            }
            EngineEvent::PartialRecognize(transcript) => {
                self.emit(BridgeEvent::PartialRecognize { transcript });
                None
            }
            EngineEvent::PlayStart => {
                registry.settle(OperationKind::Speak, Settlement::Done);
                self.emit(BridgeEvent::Play { playing: true });
                None
            }
            EngineEvent::PlayStop => {
                self.emit(BridgeEvent::Play { playing: false });
                None
            }
            EngineEvent::Synthesized(url) => {
                if !registry.settle(OperationKind::Synthesize, Settlement::Audio(url)) {
                    tracing::debug!("synthesis result with no pending request");
                }
                None
            }
            EngineEvent::Classified(result) => {
                if !registry.settle(OperationKind::Classify, Settlement::Classification(result)) {
                    tracing::debug!("classification with no pending request");
                }
                None
            }
            EngineEvent::Trace(message) => {
                self.emit(BridgeEvent::Trace { message });
                None
            }
            EngineEvent::Error(message) => {
                self.fail_all(registry, &message);
                None
            }
        }
    }
}

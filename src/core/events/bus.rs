

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::base::Event;


pub type EventHandler = Arc<dyn Fn(Event) -> Result<(), String> + Send + Sync>;

/// Fire-and-forget dispatch of lifecycle side effects.
///
/// Every handler runs on its own spawned task. `emit` never waits for a
/// handler and never observes its outcome: a handler error is logged at debug
/// level and dropped.
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<EventHandler>>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    
    pub async fn register(&self, event_type: &str, handler: EventHandler) {
        let mut handlers = self.handlers.write().await;
        handlers
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
        debug!("Registered handler for event type: {}", event_type);
    }

    
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;

        if let Some(event_handlers) = handlers.get(&event.event_type) {
            for handler in event_handlers {
                let handler = Arc::clone(handler);
                let event = event.clone();

                tokio::spawn(async move {
                    let event_type = event.event_type.clone();
                    if let Err(e) = handler(event) {
                        debug!("Handler for {} failed (ignored): {}", event_type, e);
                    }
                });
            }
        } else {
            debug!("No handlers for event type: {}", event.event_type);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

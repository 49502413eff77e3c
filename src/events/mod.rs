use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::CompletionEvent;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Best-effort send; a closed channel is logged, never surfaced.
    pub async fn publish(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "Failed to publish event");
        }
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Lifecycle events published by the pickup services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    VendorAssigned {
        order_id: Uuid,
        vendor_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled(Uuid),
    OrderCompleted(CompletionEvent),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated(_) => "order_created",
            Event::VendorAssigned { .. } => "vendor_assigned",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::OrderCancelled(_) => "order_cancelled",
            Event::OrderCompleted(_) => "order_completed",
        }
    }
}

/// Handlers implementing this trait receive every event from the processing loop.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Drains the channel and hands each event to every registered handler.
/// Handler failures are logged and do not stop the loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!(handlers = handlers.len(), "Starting event processing loop");
    while let Some(event) = rx.recv().await {
        debug!(event = event.name(), "Received event");
        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                error!(event = event.name(), error = %e, "Event handler failed");
            }
        }
    }
    warn!("Event processing loop has ended");
}

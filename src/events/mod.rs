use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events published after a lifecycle operation commits. Consumers
/// are strictly outside the transactional boundary: losing an event never
/// affects order state or the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: String,
    },
    OfferAttached {
        order_id: String,
        supplier: String,
    },
    OrderSent {
        order_id: String,
    },
    ReceiptRegistered {
        order_id: String,
        synthetic: bool,
    },
    OrderAccepted {
        order_id: String,
    },
    DiscrepancyReported {
        order_id: String,
        ticket_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
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
}

/// Background consumer that logs every published event. Runs until the
/// sending side is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated { order_id } => {
                info!(order_id = %order_id, "event: order created");
            }
            Event::OfferAttached { order_id, supplier } => {
                info!(order_id = %order_id, supplier = %supplier, "event: offer attached");
            }
            Event::OrderSent { order_id } => {
                info!(order_id = %order_id, "event: order sent");
            }
            Event::ReceiptRegistered {
                order_id,
                synthetic,
            } => {
                if *synthetic {
                    warn!(order_id = %order_id, "event: receipt registered under synthetic id");
                } else {
                    info!(order_id = %order_id, "event: receipt registered");
                }
            }
            Event::OrderAccepted { order_id } => {
                info!(order_id = %order_id, "event: order accepted");
            }
            Event::DiscrepancyReported {
                order_id,
                ticket_id,
            } => {
                warn!(order_id = %order_id, ticket_id = %ticket_id, "event: discrepancy reported");
            }
        }
    }
    info!("Event channel closed; event processor stopping");
}

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order::OrderStatus;

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

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping domain event");
        }
    }
}

/// Domain events emitted by the order lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        grandtotal: i64,
    },
    /// The order rows exist but the gateway did not hand out a payment request.
    PaymentRequestFailed {
        order_id: Uuid,
        reason: String,
    },
    OrderPaid {
        order_id: Uuid,
        amount: i64,
    },
    OrderPaymentFailed {
        order_id: Uuid,
        previous_status: OrderStatus,
    },
    OrderCompleted(Uuid),
}

impl Event {
    pub fn order_id(&self) -> Uuid {
        match self {
            Event::OrderCreated { order_id, .. }
            | Event::PaymentRequestFailed { order_id, .. }
            | Event::OrderPaid { order_id, .. }
            | Event::OrderPaymentFailed { order_id, .. } => *order_id,
            Event::OrderCompleted(order_id) => *order_id,
        }
    }
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                grandtotal,
            } => {
                info!(%order_id, grandtotal, "Order created");
            }
            Event::PaymentRequestFailed { order_id, reason } => {
                warn!(
                    %order_id,
                    %reason,
                    "Order is awaiting payment without a payment request; operator retry required"
                );
            }
            Event::OrderPaid { order_id, amount } => {
                info!(%order_id, amount, "Order paid");
            }
            Event::OrderPaymentFailed {
                order_id,
                previous_status,
            } => {
                warn!(%order_id, %previous_status, "Payment failed; order awaiting payment again");
            }
            Event::OrderCompleted(order_id) => {
                info!(%order_id, "Order completed");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();

        sender.send(Event::OrderCompleted(order_id)).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.order_id(), order_id);
    }

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::OrderCompleted(Uuid::new_v4())).await.is_err());
        sender
            .send_or_log(Event::OrderCompleted(Uuid::new_v4()))
            .await;
    }
}

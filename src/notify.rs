use async_trait::async_trait;
use uuid::Uuid;

/// Customer-facing events the core emits. Template rendering and delivery
/// belong to the notification subsystem, which consumes these triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    PaymentCompleted,
    OrderCancelled,
    RefundSucceeded,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::PaymentCompleted => "payment_completed",
            NotificationEvent::OrderCancelled => "order_cancelled",
            NotificationEvent::RefundSucceeded => "refund_succeeded",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, order_id: Uuid, event: NotificationEvent);
}

/// Default sink: records the trigger in the log stream.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, order_id: Uuid, event: NotificationEvent) {
        tracing::info!(order_id = %order_id, event = event.as_str(), "customer notification trigger");
    }
}

use async_trait::async_trait;
use tokio::sync::Mutex;

use shopbot_core::domain::conversation::{Conversation, Message};
use shopbot_core::domain::order::Order;

/// Operator-dashboard notifications. Emission is fire-and-forget: the
/// pipeline never blocks or fails because a notification could not be
/// delivered, so the methods are infallible and implementations swallow
/// their own errors.
#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    /// A message was appended to an already-persisted conversation.
    async fn message_appended(&self, conversation: &Conversation, message: &Message);

    /// Conversation state changed (status, intent, manual mode).
    async fn conversation_updated(&self, conversation: &Conversation);

    /// A new order was persisted.
    async fn order_created(&self, order: &Order);
}

pub struct NoopNotificationEmitter;

#[async_trait]
impl NotificationEmitter for NoopNotificationEmitter {
    async fn message_appended(&self, _conversation: &Conversation, _message: &Message) {}
    async fn conversation_updated(&self, _conversation: &Conversation) {}
    async fn order_created(&self, _order: &Order) {}
}

/// Records emissions in order for assertions.
#[derive(Default)]
pub struct RecordingNotificationEmitter {
    pub events: Mutex<Vec<NotificationEvent>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NotificationEvent {
    MessageAppended { conversation_id: String, text: String },
    ConversationUpdated { conversation_id: String },
    OrderCreated { order_id: String },
}

impl RecordingNotificationEmitter {
    pub async fn recorded(&self) -> Vec<NotificationEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl NotificationEmitter for RecordingNotificationEmitter {
    async fn message_appended(&self, conversation: &Conversation, message: &Message) {
        self.events.lock().await.push(NotificationEvent::MessageAppended {
            conversation_id: conversation.id.0.to_string(),
            text: message.text.clone(),
        });
    }

    async fn conversation_updated(&self, conversation: &Conversation) {
        self.events.lock().await.push(NotificationEvent::ConversationUpdated {
            conversation_id: conversation.id.0.to_string(),
        });
    }

    async fn order_created(&self, order: &Order) {
        self.events
            .lock()
            .await
            .push(NotificationEvent::OrderCreated { order_id: order.id.0.to_string() });
    }
}

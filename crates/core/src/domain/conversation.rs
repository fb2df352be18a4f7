use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::customer::CustomerId;
use crate::domain::order::OrderId;
use crate::domain::store::StoreId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    WaitingForInfo,
    OrderCreated,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::WaitingForInfo => "waiting_for_info",
            Self::OrderCreated => "order_created",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "waiting_for_info" => Some(Self::WaitingForInfo),
            "order_created" => Some(Self::OrderCreated),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Browsing,
    Inquiry,
    Ordering,
    OrderStatus,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browsing => "browsing",
            Self::Inquiry => "inquiry",
            Self::Ordering => "ordering",
            Self::OrderStatus => "order_status",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "browsing" => Some(Self::Browsing),
            "inquiry" => Some(Self::Inquiry),
            "ordering" => Some(Self::Ordering),
            "order_status" => Some(Self::OrderStatus),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    Customer,
    Bot,
    Admin,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: MessageSender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Redelivery detection window. Transports redeliver within a short horizon,
/// so ids older than this many messages are forgotten rather than carried in
/// the row forever.
const SEEN_MESSAGE_IDS_LIMIT: usize = 64;

/// Per-(store, channel-conversation-id) state. That pair is the uniqueness
/// key; find-or-create must never produce two rows for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub channel_conversation_id: String,
    pub messages: Vec<Message>,
    pub status: ConversationStatus,
    pub current_intent: Intent,
    pub is_manual_mode: bool,
    pub order_ids: Vec<OrderId>,
    /// Transport message ids already ingested, used to drop redeliveries.
    #[serde(default)]
    pub seen_message_ids: Vec<String>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        store_id: StoreId,
        customer_id: CustomerId,
        channel_conversation_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            store_id,
            customer_id,
            channel_conversation_id: channel_conversation_id.into(),
            messages: Vec::new(),
            status: ConversationStatus::Active,
            current_intent: Intent::Browsing,
            is_manual_mode: false,
            order_ids: Vec::new(),
            seen_message_ids: Vec::new(),
            last_activity: now,
            created_at: now,
        }
    }

    pub fn add_message(
        &mut self,
        sender: MessageSender,
        text: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Message {
        let timestamp = Utc::now().max(self.last_activity);
        let message = Message { sender, text: text.into(), timestamp, metadata };
        self.messages.push(message.clone());
        self.last_activity = timestamp;
        message
    }

    /// The most recent `limit` turns, oldest first, excluding any message
    /// appended after the cutoff the caller already holds.
    pub fn recent_history(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    /// Whether the automated pipeline may act on this conversation. Manual
    /// mode and closed conversations only record inbound messages.
    pub fn allows_automation(&self) -> bool {
        !self.is_manual_mode && self.status != ConversationStatus::Closed
    }

    pub fn can_transition_to(&self, next: ConversationStatus) -> bool {
        use ConversationStatus::*;
        matches!(
            (self.status, next),
            (Active, WaitingForInfo)
                | (Active, OrderCreated)
                | (WaitingForInfo, OrderCreated)
                | (WaitingForInfo, Active)
                | (OrderCreated, Active)
                | (OrderCreated, WaitingForInfo)
                // Closing is an administrative action, accepted from any state.
                | (_, Closed)
                | (Closed, Active)
        ) || self.status == next
    }

    pub fn transition_to(&mut self, next: ConversationStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }
        Err(DomainError::InvalidConversationTransition { from: self.status, to: next })
    }

    /// Toggling manual mode in either direction forces the conversation back
    /// to `active`: ON so an operator sees it as live, OFF so the next
    /// inbound turn is processed automatically.
    pub fn set_manual_mode(&mut self, enabled: bool) {
        self.is_manual_mode = enabled;
        self.status = ConversationStatus::Active;
    }

    /// Records a transport message id; returns false when the id was already
    /// seen (a redelivery that must be dropped). The set is capped at
    /// [`SEEN_MESSAGE_IDS_LIMIT`] recent ids, oldest evicted first.
    pub fn record_message_id(&mut self, message_id: &str) -> bool {
        if self.seen_message_ids.iter().any(|seen| seen == message_id) {
            return false;
        }
        self.seen_message_ids.push(message_id.to_string());
        if self.seen_message_ids.len() > SEEN_MESSAGE_IDS_LIMIT {
            self.seen_message_ids.remove(0);
        }
        true
    }

    pub fn link_order(&mut self, order_id: OrderId) {
        if !self.order_ids.contains(&order_id) {
            self.order_ids.push(order_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Conversation, ConversationStatus, MessageSender};
    use crate::domain::customer::CustomerId;
    use crate::domain::store::StoreId;

    fn conversation() -> Conversation {
        Conversation::new(StoreId::new(), CustomerId::new(), "psid-1")
    }

    #[test]
    fn message_timestamps_are_monotonic() {
        let mut convo = conversation();
        convo.add_message(MessageSender::Customer, "first", None);
        convo.add_message(MessageSender::Bot, "second", None);
        let first = convo.messages[0].timestamp;
        let second = convo.messages[1].timestamp;
        assert!(second >= first);
        assert_eq!(convo.last_activity, second);
    }

    #[test]
    fn recent_history_returns_last_turns_oldest_first() {
        let mut convo = conversation();
        for index in 0..8 {
            convo.add_message(MessageSender::Customer, format!("m{index}"), None);
        }
        let history = convo.recent_history(5);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].text, "m3");
        assert_eq!(history[4].text, "m7");
    }

    #[test]
    fn order_created_can_revert_to_active_on_failed_validation() {
        let mut convo = conversation();
        convo.transition_to(ConversationStatus::OrderCreated).expect("active -> order_created");
        convo.transition_to(ConversationStatus::Active).expect("order_created -> active");
        assert_eq!(convo.status, ConversationStatus::Active);
    }

    #[test]
    fn closed_is_not_produced_but_always_accepted() {
        let mut convo = conversation();
        convo.transition_to(ConversationStatus::WaitingForInfo).expect("to waiting");
        convo.transition_to(ConversationStatus::Closed).expect("admin close");
        assert_eq!(convo.status, ConversationStatus::Closed);
        assert!(!convo.allows_automation());
    }

    #[test]
    fn disabling_manual_mode_returns_conversation_to_active() {
        let mut convo = conversation();
        convo.transition_to(ConversationStatus::WaitingForInfo).expect("to waiting");
        convo.set_manual_mode(true);
        assert!(!convo.allows_automation());
        assert_eq!(convo.status, ConversationStatus::Active);

        convo.set_manual_mode(false);
        assert!(convo.allows_automation());
        assert_eq!(convo.status, ConversationStatus::Active);
    }

    #[test]
    fn redelivered_message_ids_are_rejected() {
        let mut convo = conversation();
        assert!(convo.record_message_id("mid.1"));
        assert!(!convo.record_message_id("mid.1"));
        assert!(convo.record_message_id("mid.2"));
    }

    #[test]
    fn the_message_id_window_is_bounded() {
        let mut convo = conversation();
        for index in 0..super::SEEN_MESSAGE_IDS_LIMIT + 6 {
            assert!(convo.record_message_id(&format!("mid.{index}")));
        }
        assert_eq!(convo.seen_message_ids.len(), super::SEEN_MESSAGE_IDS_LIMIT);

        // The oldest id fell out of the window; recent ones are still caught.
        assert!(convo.record_message_id("mid.0"));
        assert!(!convo.record_message_id(&format!(
            "mid.{}",
            super::SEEN_MESSAGE_IDS_LIMIT + 5
        )));
    }
}

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use shopbot_agent::{ExtractionOracle, PromptContext, Responder};
use shopbot_core::catalog::{validate_items, CatalogSnapshot};
use shopbot_core::domain::conversation::{
    Conversation, ConversationId, ConversationStatus, MessageSender,
};
use shopbot_core::domain::customer::Customer;
use shopbot_core::domain::order::{Order, OrderId, OrderStatus};
use shopbot_core::domain::store::Store;
use shopbot_core::errors::{ApplicationError, DomainError};
use shopbot_core::extraction::{ExtractedItem, ExtractionIntent, ORDER_CONFIDENCE_THRESHOLD};
use shopbot_db::repositories::{
    ConversationRepository, CustomerRepository, OrderRepository, ProductRepository,
    RepositoryError, StoreRepository,
};
use shopbot_messenger::{InboundEvent, InboundKind, MessengerClient, NotificationEmitter};

use crate::assembler::{assemble_order, OrderDraft};
use crate::locks::ConversationLocks;
use crate::payment::PaymentClient;

/// Recent orders included in oracle context.
const RECENT_ORDERS_LIMIT: u32 = 3;

pub const GET_STARTED_PAYLOAD: &str = "GET_STARTED";

const ATTACHMENT_ACK: &str =
    "Зургийг хүлээн авлаа. Та хүссэн бүтээгдэхүүнийхээ нэрийг бичээрэй. 😊";

/// The inbound message pipeline: one turn takes a normalized channel event
/// through store resolution, dedup, extraction, catalog validation, and order
/// commitment.
///
/// Turns for the same (store, sender) pair are serialized through
/// [`ConversationLocks`]; everything else runs concurrently.
pub struct Pipeline {
    stores: Arc<dyn StoreRepository>,
    customers: Arc<dyn CustomerRepository>,
    conversations: Arc<dyn ConversationRepository>,
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
    oracle: ExtractionOracle,
    responder: Responder,
    messenger: Arc<dyn MessengerClient>,
    notifier: Arc<dyn NotificationEmitter>,
    payments: Arc<dyn PaymentClient>,
    payment_enabled: bool,
    locks: ConversationLocks,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        customers: Arc<dyn CustomerRepository>,
        conversations: Arc<dyn ConversationRepository>,
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
        oracle: ExtractionOracle,
        responder: Responder,
        messenger: Arc<dyn MessengerClient>,
        notifier: Arc<dyn NotificationEmitter>,
        payments: Arc<dyn PaymentClient>,
        payment_enabled: bool,
    ) -> Self {
        Self {
            stores,
            customers,
            conversations,
            products,
            orders,
            oracle,
            responder,
            messenger,
            notifier,
            payments,
            payment_enabled,
            locks: ConversationLocks::default(),
        }
    }

    /// Processes one inbound event end to end. Events for channels no store
    /// owns and redelivered message ids are dropped silently.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<(), ApplicationError> {
        let Some(store) =
            self.stores.find_by_channel_id(&event.channel_id).await.map_err(storage)?
        else {
            warn!(
                event_name = "unknown_channel",
                channel_id = %event.channel_id,
                "dropping event for a channel no store owns"
            );
            return Ok(());
        };

        let _guard = self.locks.acquire(&format!("{}:{}", store.id.0, event.sender_id)).await;

        let customer = self.resolve_customer(&event.sender_id).await?;
        let mut conversation = self
            .conversations
            .find_or_create(store.id, customer.id, &event.sender_id)
            .await
            .map_err(storage)?;

        if let Some(message_id) = &event.message_id {
            if !conversation.record_message_id(message_id) {
                debug!(event_name = "duplicate_message", message_id, "dropping redelivery");
                return Ok(());
            }
            self.conversations.save(conversation.clone()).await.map_err(storage)?;
        }

        match &event.kind {
            InboundKind::Postback(payload) => {
                self.handle_postback(&store, &mut conversation, payload).await
            }
            InboundKind::Attachment { attachment_type } => {
                self.handle_attachment(&mut conversation, attachment_type).await
            }
            InboundKind::Text(text) => {
                self.handle_text(&store, &customer, &mut conversation, text).await
            }
        }
    }

    /// An operator message, appended to the transcript and forwarded to the
    /// customer. Unlike bot replies a delivery failure here is surfaced.
    pub async fn send_admin_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), ApplicationError> {
        let mut conversation = self.load_conversation(conversation_id).await?;
        let message = conversation.add_message(MessageSender::Admin, text, None);
        self.conversations.save(conversation.clone()).await.map_err(storage)?;
        self.notifier.message_appended(&conversation, &message).await;

        self.messenger
            .send_text(&conversation.channel_conversation_id, text)
            .await
            .map_err(|error| ApplicationError::ExternalService(error.to_string()))
    }

    pub async fn set_manual_mode(
        &self,
        conversation_id: &ConversationId,
        enabled: bool,
    ) -> Result<Conversation, ApplicationError> {
        let mut conversation = self.load_conversation(conversation_id).await?;
        conversation.set_manual_mode(enabled);
        self.conversations.save(conversation.clone()).await.map_err(storage)?;
        self.notifier.conversation_updated(&conversation).await;
        Ok(conversation)
    }

    /// Confirms a pending order and reserves stock for its items. Stock is
    /// decremented at approval, not at creation, so abandoned pending orders
    /// never hold inventory.
    pub async fn approve_order(&self, order_id: &OrderId) -> Result<Order, ApplicationError> {
        let mut order = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(storage)?
            .ok_or_else(|| {
                DomainError::InvariantViolation(format!("order {} not found", order_id.0))
            })?;
        order.transition_to(OrderStatus::Confirmed)?;
        self.orders.save(order.clone()).await.map_err(storage)?;

        let catalog = self.products.active_for_store(&order.store_id).await.map_err(storage)?;
        for item in &order.items {
            if let Some(product) = catalog.iter().find(|product| product.name == item.name) {
                self.products
                    .adjust_stock(&product.id, -i64::from(item.quantity))
                    .await
                    .map_err(storage)?;
            }
        }

        info!(event_name = "order_approved", order_id = %order.id.0, "order confirmed");
        Ok(order)
    }

    async fn handle_text(
        &self,
        store: &Store,
        customer: &Customer,
        conversation: &mut Conversation,
        text: &str,
    ) -> Result<(), ApplicationError> {
        let inbound = conversation.add_message(MessageSender::Customer, text, None);
        self.conversations.save(conversation.clone()).await.map_err(storage)?;
        self.notifier.message_appended(conversation, &inbound).await;

        if !conversation.allows_automation() {
            debug!(
                event_name = "automation_suppressed",
                conversation_id = %conversation.id.0,
                manual_mode = conversation.is_manual_mode,
                "message recorded without an automated reply"
            );
            // The operator is watching exactly this conversation; keep the
            // dashboard feed current even without an automated turn.
            self.notifier.conversation_updated(conversation).await;
            return Ok(());
        }

        let recipient = conversation.channel_conversation_id.clone();
        let _ = self.messenger.set_typing(&recipient, true).await;

        // One snapshot per turn: extraction and validation see the same
        // catalog even if a sync lands mid-turn.
        let catalog = CatalogSnapshot::new(
            self.products.active_for_store(&store.id).await.map_err(storage)?,
        );
        let recent_orders = self
            .orders
            .recent_for_customer(&customer.id, RECENT_ORDERS_LIMIT)
            .await
            .map_err(storage)?;

        let turn = conversation.clone();
        let context = PromptContext {
            store,
            catalog: &catalog,
            conversation: &turn,
            recent_orders: &recent_orders,
        };
        let extraction = self.oracle.extract(&context, text).await;
        conversation.current_intent = extraction.intent.as_intent();

        let mut committed = false;
        if let ExtractionIntent::Ordering { items, phone, address } = &extraction.intent {
            // The oracle's readiness flag is advisory in one direction: when
            // it reports not-ready but every required field is independently
            // present, the pipeline overrides it.
            let ready =
                extraction.is_order_ready || ordering_fields_present(store, items, phone, address);
            if ready && extraction.confidence > ORDER_CONFIDENCE_THRESHOLD && !items.is_empty() {
                let outcome = validate_items(items, &catalog);
                if outcome.is_complete() {
                    let order = assemble_order(OrderDraft {
                        store,
                        customer_id: customer.id,
                        conversation_id: conversation.id,
                        items: &outcome.validated,
                        phone: phone.as_deref(),
                        address: address.as_deref(),
                        raw_message: text,
                        confidence: extraction.confidence,
                    });
                    self.commit_order(store, conversation, order).await?;
                } else {
                    conversation.transition_to(ConversationStatus::WaitingForInfo)?;
                    let reply = unknown_items_reply(&outcome.unknown);
                    self.deliver_reply(conversation, &reply).await?;
                    self.notifier.conversation_updated(conversation).await;
                }
                committed = true;
            }
        }

        if !committed {
            if matches!(extraction.intent, ExtractionIntent::Ordering { .. }) {
                conversation.transition_to(ConversationStatus::WaitingForInfo)?;
            }
            let reply = self.responder.reply(&context, text).await;
            self.deliver_reply(conversation, &reply).await?;
            self.notifier.conversation_updated(conversation).await;
        }

        let _ = self.messenger.set_typing(&recipient, false).await;
        Ok(())
    }

    /// Persists the order, links and transitions the conversation, sends the
    /// confirmation, and attaches an invoice when invoicing applies. Invoice
    /// failure leaves the committed order untouched.
    async fn commit_order(
        &self,
        store: &Store,
        conversation: &mut Conversation,
        mut order: Order,
    ) -> Result<(), ApplicationError> {
        self.orders.save(order.clone()).await.map_err(storage)?;
        conversation.link_order(order.id);
        conversation.transition_to(ConversationStatus::OrderCreated)?;
        self.conversations.save(conversation.clone()).await.map_err(storage)?;
        self.notifier.order_created(&order).await;
        self.notifier.conversation_updated(conversation).await;

        info!(
            event_name = "order_created",
            order_id = %order.id.0,
            store_id = %store.id.0,
            total = %order.total_amount,
            needs_review = order.ai_extraction.needs_review,
            "order committed"
        );

        let confirmation = confirmation_text(store, &order);
        self.deliver_reply(conversation, &confirmation).await?;

        if self.payment_enabled && store.accepts_invoicing && order.total_amount > Decimal::ZERO {
            match self.payments.create_invoice(&order).await {
                Ok(invoice) => {
                    order.payment_details.invoice_id = Some(invoice.invoice_id.clone());
                    order.payment_details.qr_payload = Some(invoice.qr_payload.clone());
                    self.orders.save(order.clone()).await.map_err(storage)?;
                    let follow_up =
                        format!("Төлбөрөө доорх QR кодоор хийнэ үү:\n{}", invoice.qr_payload);
                    self.deliver_reply(conversation, &follow_up).await?;
                }
                Err(error) => {
                    warn!(
                        event_name = "invoice_failed",
                        error = %error,
                        order_id = %order.id.0,
                        "order stands without an invoice"
                    );
                }
            }
        }
        Ok(())
    }

    async fn handle_postback(
        &self,
        store: &Store,
        conversation: &mut Conversation,
        payload: &str,
    ) -> Result<(), ApplicationError> {
        if payload != GET_STARTED_PAYLOAD {
            debug!(event_name = "unhandled_postback", payload, "ignoring postback");
            return Ok(());
        }
        let greeting = format!(
            "Сайн байна уу! {} дэлгүүрт тавтай морилно уу. 😊 Та юу сонирхож байна вэ?",
            store.name
        );
        self.deliver_reply(conversation, &greeting).await?;
        self.notifier.conversation_updated(conversation).await;
        Ok(())
    }

    async fn handle_attachment(
        &self,
        conversation: &mut Conversation,
        attachment_type: &str,
    ) -> Result<(), ApplicationError> {
        let metadata = serde_json::json!({ "attachment_type": attachment_type });
        let inbound = conversation.add_message(
            MessageSender::Customer,
            format!("[хавсралт: {attachment_type}]"),
            Some(metadata),
        );
        self.conversations.save(conversation.clone()).await.map_err(storage)?;
        self.notifier.message_appended(conversation, &inbound).await;
        self.notifier.conversation_updated(conversation).await;

        if !conversation.allows_automation() {
            return Ok(());
        }
        self.deliver_reply(conversation, ATTACHMENT_ACK).await
    }

    /// Appends the bot reply, persists, notifies, then sends. Outbound
    /// delivery is best-effort once the transcript is saved.
    async fn deliver_reply(
        &self,
        conversation: &mut Conversation,
        text: &str,
    ) -> Result<(), ApplicationError> {
        let message = conversation.add_message(MessageSender::Bot, text, None);
        self.conversations.save(conversation.clone()).await.map_err(storage)?;
        self.notifier.message_appended(conversation, &message).await;

        if let Err(error) =
            self.messenger.send_text(&conversation.channel_conversation_id, text).await
        {
            warn!(
                event_name = "send_failed",
                error = %error,
                conversation_id = %conversation.id.0,
                "outbound reply was not delivered"
            );
        }
        Ok(())
    }

    /// Known customers get a `last_seen` touch; first-time senders get a
    /// best-effort profile lookup and are served unnamed when it fails.
    async fn resolve_customer(&self, sender_id: &str) -> Result<Customer, ApplicationError> {
        if let Some(mut existing) =
            self.customers.find_by_channel_id(sender_id).await.map_err(storage)?
        {
            existing.last_seen = Utc::now();
            self.customers.save(existing.clone()).await.map_err(storage)?;
            return Ok(existing);
        }

        let name = match self.messenger.fetch_profile(sender_id).await {
            Ok(Some(profile)) => profile.full_name().unwrap_or_default(),
            Ok(None) => String::new(),
            Err(error) => {
                warn!(
                    event_name = "profile_fetch_failed",
                    error = %error,
                    "serving customer without a profile"
                );
                String::new()
            }
        };
        let fresh = Customer::new(sender_id, name);
        self.customers.save(fresh.clone()).await.map_err(storage)?;
        Ok(fresh)
    }

    async fn load_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Conversation, ApplicationError> {
        self.conversations
            .find_by_id(conversation_id)
            .await
            .map_err(storage)?
            .ok_or_else(|| {
                DomainError::InvariantViolation(format!(
                    "conversation {} not found",
                    conversation_id.0
                ))
                .into()
            })
    }
}

fn storage(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

/// Whether every field an order needs is present regardless of what the
/// oracle claimed. A delivery store additionally requires an address.
fn ordering_fields_present(
    store: &Store,
    items: &[ExtractedItem],
    phone: &Option<String>,
    address: &Option<String>,
) -> bool {
    !items.is_empty() && phone.is_some() && (!store.has_delivery || address.is_some())
}

fn unknown_items_reply(unknown: &[String]) -> String {
    format!(
        "Уучлаарай, \"{}\" манай бүтээгдэхүүний жагсаалтад олдсонгүй. Нэрийг нь шалгаад дахин бичээрэй. 😊",
        unknown.join("\", \"")
    )
}

fn confirmation_text(store: &Store, order: &Order) -> String {
    let mut text = String::from("Таны захиалга амжилттай бүртгэгдлээ! 🎉\n");
    for item in &order.items {
        let _ = writeln!(
            text,
            "• {} ×{} — {} {}",
            item.name, item.quantity, item.subtotal, store.currency
        );
    }
    let _ = writeln!(text, "Нийт дүн: {} {}", order.total_amount, store.currency);
    let _ = write!(text, "Захиалгын дугаар: #{}", order.id.short());
    text
}

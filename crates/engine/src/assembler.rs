use rust_decimal::Decimal;

use shopbot_core::catalog::ValidatedItem;
use shopbot_core::domain::conversation::ConversationId;
use shopbot_core::domain::customer::{is_valid_phone, CustomerId};
use shopbot_core::domain::order::{
    AiExtraction, Order, OrderId, OrderItem, OrderStatus, PaymentDetails, PaymentMethod,
    PaymentStatus,
};
use shopbot_core::domain::store::Store;

/// Below this confidence an order is still created but flagged for operator
/// review.
pub const REVIEW_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Inputs for building a pending order from a validated extraction.
pub struct OrderDraft<'a> {
    pub store: &'a Store,
    pub customer_id: CustomerId,
    pub conversation_id: ConversationId,
    pub items: &'a [ValidatedItem],
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
    pub raw_message: &'a str,
    pub confidence: f64,
}

/// Builds a pending order from validated items, applying the store's delivery
/// policy. Pickup-only stores record the pickup address regardless of what the
/// customer wrote. Totals are recomputed from catalog prices before returning.
pub fn assemble_order(draft: OrderDraft<'_>) -> Order {
    let phone_number = draft.phone.map(str::trim).unwrap_or_default().to_string();
    let (address, has_delivery) = if draft.store.has_delivery {
        (draft.address.map(str::trim).unwrap_or_default().to_string(), true)
    } else {
        (draft.store.pickup_address_or_default(), false)
    };

    let items = draft
        .items
        .iter()
        .map(|item| OrderItem {
            name: item.canonical_name.clone(),
            quantity: item.quantity,
            price: item.unit_price,
            subtotal: Decimal::ZERO,
        })
        .collect();

    let payment_method =
        if draft.store.accepts_invoicing { PaymentMethod::Qpay } else { PaymentMethod::Cash };
    // A missing delivery address flags the order for review instead of
    // blocking it; the operator can chase the address manually.
    let needs_review = !is_valid_phone(&phone_number)
        || draft.confidence < REVIEW_CONFIDENCE_THRESHOLD
        || (has_delivery && address.is_empty());

    let mut order = Order {
        id: OrderId::new(),
        store_id: draft.store.id,
        customer_id: draft.customer_id,
        conversation_id: draft.conversation_id,
        items,
        phone_number,
        address,
        has_delivery,
        status: OrderStatus::Pending,
        total_amount: Decimal::ZERO,
        payment_status: PaymentStatus::Pending,
        payment_method,
        payment_details: PaymentDetails::default(),
        ai_extraction: AiExtraction {
            raw_message: draft.raw_message.to_string(),
            confidence: draft.confidence,
            needs_review,
        },
        notes: None,
        created_at: chrono::Utc::now(),
    };
    order.recompute_total();
    order
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use shopbot_core::catalog::ValidatedItem;
    use shopbot_core::domain::conversation::ConversationId;
    use shopbot_core::domain::customer::CustomerId;
    use shopbot_core::domain::order::{OrderStatus, PaymentMethod};
    use shopbot_core::domain::product::ProductId;
    use shopbot_core::domain::store::{ColumnMapping, Store, StoreId};

    use super::{assemble_order, OrderDraft};

    fn store(has_delivery: bool, accepts_invoicing: bool) -> Store {
        Store {
            id: StoreId::new(),
            name: "Shop".to_string(),
            channel_ids: vec!["page-1".to_string()],
            spreadsheet_id: None,
            has_delivery,
            pickup_address: Some("СБД 1-р хороо".to_string()),
            accepts_invoicing,
            persona: String::new(),
            column_mapping: ColumnMapping::default(),
            currency: "MNT".to_string(),
            is_active: true,
        }
    }

    fn items() -> Vec<ValidatedItem> {
        vec![
            ValidatedItem {
                product_id: ProductId::new(),
                canonical_name: "хар цамц".to_string(),
                quantity: 2,
                unit_price: Decimal::from(45_000),
            },
            ValidatedItem {
                product_id: ProductId::new(),
                canonical_name: "хар өмд".to_string(),
                quantity: 1,
                unit_price: Decimal::from(55_000),
            },
        ]
    }

    fn draft<'a>(store: &'a Store, items: &'a [ValidatedItem]) -> OrderDraft<'a> {
        OrderDraft {
            store,
            customer_id: CustomerId::new(),
            conversation_id: ConversationId::new(),
            items,
            phone: Some("99112233"),
            address: Some("БЗД 14-р хороо"),
            raw_message: "хар цамц 2ш, хар өмд 1ш",
            confidence: 0.9,
        }
    }

    #[test]
    fn totals_come_from_catalog_prices() {
        let store = store(true, true);
        let items = items();
        let order = assemble_order(draft(&store, &items));
        assert_eq!(order.total_amount, Decimal::from(145_000));
        assert_eq!(order.items[0].subtotal, Decimal::from(90_000));
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(!order.ai_extraction.needs_review);
    }

    #[test]
    fn delivery_orders_keep_the_customer_address() {
        let store = store(true, true);
        let items = items();
        let order = assemble_order(draft(&store, &items));
        assert!(order.has_delivery);
        assert_eq!(order.address, "БЗД 14-р хороо");
    }

    #[test]
    fn pickup_only_stores_override_the_address() {
        let store = store(false, true);
        let items = items();
        let order = assemble_order(draft(&store, &items));
        assert!(!order.has_delivery);
        assert_eq!(order.address, "СБД 1-р хороо");
    }

    #[test]
    fn invoicing_selects_qpay_otherwise_cash() {
        let invoicing = store(true, true);
        let cash_only = store(true, false);
        let items = items();
        assert_eq!(assemble_order(draft(&invoicing, &items)).payment_method, PaymentMethod::Qpay);
        assert_eq!(assemble_order(draft(&cash_only, &items)).payment_method, PaymentMethod::Cash);
    }

    #[test]
    fn suspicious_phone_or_low_confidence_flags_review() {
        let store = store(true, true);
        let items = items();

        let mut bad_phone = draft(&store, &items);
        bad_phone.phone = Some("12345");
        assert!(assemble_order(bad_phone).ai_extraction.needs_review);

        let mut low_confidence = draft(&store, &items);
        low_confidence.confidence = 0.65;
        assert!(assemble_order(low_confidence).ai_extraction.needs_review);

        let mut no_address = draft(&store, &items);
        no_address.address = None;
        let order = assemble_order(no_address);
        assert!(order.ai_extraction.needs_review);
        assert_eq!(order.total_amount, Decimal::from(145_000));
    }
}

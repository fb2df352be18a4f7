use std::fmt::Write as _;

use shopbot_core::catalog::CatalogSnapshot;
use shopbot_core::domain::conversation::{Conversation, MessageSender};
use shopbot_core::domain::order::Order;
use shopbot_core::domain::store::Store;

/// Conversation turns included in each prompt.
pub const HISTORY_LIMIT: usize = 5;

/// Everything the oracle and responder are allowed to see for one turn: the
/// store's policy, one catalog snapshot, recent history, and recent orders.
pub struct PromptContext<'a> {
    pub store: &'a Store,
    pub catalog: &'a CatalogSnapshot,
    pub conversation: &'a Conversation,
    pub recent_orders: &'a [Order],
}

impl PromptContext<'_> {
    pub fn extraction_prompt(&self, inbound: &str) -> String {
        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "You are an order-extraction assistant for the online shop \"{}\".",
            self.store.name
        );
        let _ = writeln!(prompt, "The customer writes in Mongolian.\n");

        prompt.push_str(&self.catalog_section());
        prompt.push_str(&self.business_rules());
        prompt.push_str(&self.history_section());
        prompt.push_str(&self.orders_section());

        let _ = writeln!(prompt, "Customer message: {inbound}\n");
        prompt.push_str(
            "Respond with strict JSON only, no prose and no code fences, shaped as:\n\
             {\n\
             \x20 \"intent\": \"browsing\" | \"inquiry\" | \"ordering\" | \"order_status\",\n\
             \x20 \"isOrderReady\": boolean,\n\
             \x20 \"data\": {\n\
             \x20   \"items\": [{\"name\": string, \"quantity\": number}],\n\
             \x20   \"phone\": string | null,\n\
             \x20   \"full_address\": string | null\n\
             \x20 },\n\
             \x20 \"missingFields\": [string],\n\
             \x20 \"confidence\": number between 0 and 1\n\
             }\n\
             Set isOrderReady to true only when items, phone",
        );
        if self.store.has_delivery {
            prompt.push_str(", and a delivery address are all present.\n");
        } else {
            prompt.push_str(" are present; this shop is pickup only, never require an address.\n");
        }
        prompt.push_str("Item names must be copied from the product list verbatim when possible.\n");
        prompt
    }

    pub fn reply_prompt(&self, inbound: &str) -> String {
        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "You are the sales assistant of the online shop \"{}\".",
            self.store.name
        );
        if !self.store.persona.trim().is_empty() {
            let _ = writeln!(prompt, "Persona: {}", self.store.persona.trim());
        }
        let _ = writeln!(
            prompt,
            "Reply in Mongolian, warm and concise, at most three sentences.\n"
        );

        prompt.push_str(&self.catalog_section());
        prompt.push_str(&self.business_rules());
        prompt.push_str(&self.history_section());
        prompt.push_str(&self.orders_section());

        let _ = writeln!(prompt, "Customer message: {inbound}");
        prompt.push_str("Write only the reply text.\n");
        prompt
    }

    fn catalog_section(&self) -> String {
        if self.catalog.is_empty() {
            return "The shop currently has no products listed.\n\n".to_string();
        }

        let mut section = String::from("Products:\n");
        for product in self.catalog.products() {
            let _ = write!(
                section,
                "- {} — {} {} (stock: {})",
                product.name, product.price, self.store.currency, product.stock
            );
            if let Some(description) = &product.description {
                let _ = write!(section, " — {description}");
            }
            for (key, value) in &product.attributes {
                let _ = write!(section, ", {key}: {value}");
            }
            section.push('\n');
        }
        section.push('\n');
        section
    }

    fn business_rules(&self) -> String {
        let mut section = String::from("Shop policy:\n");
        if self.store.has_delivery {
            section.push_str("- Delivery is available; orders need a full delivery address.\n");
        } else {
            let _ = writeln!(
                section,
                "- Pickup only at: {}. Never ask for a delivery address.",
                self.store.pickup_address_or_default()
            );
        }
        if self.store.accepts_invoicing {
            section.push_str("- A payment invoice with a QR code is sent after each order.\n");
        } else {
            section.push_str("- Payment is settled on delivery or pickup.\n");
        }
        section.push('\n');
        section
    }

    fn history_section(&self) -> String {
        let history = self.conversation.recent_history(HISTORY_LIMIT);
        if history.is_empty() {
            return String::new();
        }

        let mut section = String::from("Recent conversation:\n");
        for message in history {
            let speaker = match message.sender {
                MessageSender::Customer => "customer",
                MessageSender::Bot => "assistant",
                MessageSender::Admin => "operator",
            };
            let _ = writeln!(section, "{speaker}: {}", message.text);
        }
        section.push('\n');
        section
    }

    fn orders_section(&self) -> String {
        if self.recent_orders.is_empty() {
            return String::new();
        }

        let mut section = String::from("Customer's recent orders:\n");
        for order in self.recent_orders {
            let _ = writeln!(
                section,
                "- #{} — {} — {} {}",
                order.id.short(),
                order.status.as_str(),
                order.total_amount,
                self.store.currency
            );
        }
        section.push('\n');
        section
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use shopbot_core::catalog::CatalogSnapshot;
    use shopbot_core::domain::conversation::{Conversation, MessageSender};
    use shopbot_core::domain::customer::CustomerId;
    use shopbot_core::domain::product::{Product, ProductId};
    use shopbot_core::domain::store::{ColumnMapping, Store, StoreId};

    use super::PromptContext;

    fn store(has_delivery: bool) -> Store {
        Store {
            id: StoreId::new(),
            name: "Mandukhai Fashion".to_string(),
            channel_ids: vec!["page-1".to_string()],
            spreadsheet_id: None,
            has_delivery,
            pickup_address: Some("СБД 1-р хороо".to_string()),
            accepts_invoicing: true,
            persona: "Найрсаг худалдагч".to_string(),
            column_mapping: ColumnMapping::default(),
            currency: "MNT".to_string(),
            is_active: true,
        }
    }

    fn catalog(store_id: StoreId) -> CatalogSnapshot {
        let mut attributes = BTreeMap::new();
        attributes.insert("Өнгө".to_string(), "Хар".to_string());
        CatalogSnapshot::new(vec![Product {
            id: ProductId::new(),
            store_id,
            name: "хар цамц".to_string(),
            category: "цамц".to_string(),
            description: None,
            price: Decimal::from(45_000),
            stock: 10,
            is_active: true,
            attributes,
            updated_at: Utc::now(),
        }])
    }

    #[test]
    fn extraction_prompt_includes_catalog_and_policy() {
        let store = store(true);
        let catalog = catalog(store.id);
        let conversation = Conversation::new(store.id, CustomerId::new(), "psid-1");
        let context = PromptContext {
            store: &store,
            catalog: &catalog,
            conversation: &conversation,
            recent_orders: &[],
        };

        let prompt = context.extraction_prompt("хар цамц авъя");
        assert!(prompt.contains("хар цамц — 45000 MNT"));
        assert!(prompt.contains("Өнгө: Хар"));
        assert!(prompt.contains("delivery address"));
        assert!(prompt.contains("\"confidence\""));
    }

    #[test]
    fn pickup_only_shops_never_require_an_address() {
        let store = store(false);
        let catalog = catalog(store.id);
        let conversation = Conversation::new(store.id, CustomerId::new(), "psid-1");
        let context = PromptContext {
            store: &store,
            catalog: &catalog,
            conversation: &conversation,
            recent_orders: &[],
        };

        let prompt = context.extraction_prompt("захиалга өгье");
        assert!(prompt.contains("pickup only"));
        assert!(prompt.contains("СБД 1-р хороо"));
    }

    #[test]
    fn history_is_truncated_to_the_most_recent_turns() {
        let store = store(true);
        let catalog = CatalogSnapshot::default();
        let mut conversation = Conversation::new(store.id, CustomerId::new(), "psid-1");
        for index in 0..8 {
            conversation.add_message(MessageSender::Customer, format!("msg-{index}"), None);
        }
        let context = PromptContext {
            store: &store,
            catalog: &catalog,
            conversation: &conversation,
            recent_orders: &[],
        };

        let prompt = context.reply_prompt("сайн уу");
        assert!(!prompt.contains("msg-2"));
        assert!(prompt.contains("msg-3"));
        assert!(prompt.contains("msg-7"));
    }
}

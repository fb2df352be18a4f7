use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::context::PromptContext;
use crate::llm::LlmClient;

/// Sent when reply generation fails; the customer always hears something.
pub const FALLBACK_REPLY: &str = "Уучлаарай, түр хүлээгээрэй. 😊";

pub struct Responder {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl Responder {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn reply(&self, context: &PromptContext<'_>, inbound: &str) -> String {
        let prompt = context.reply_prompt(inbound);

        match tokio::time::timeout(self.timeout, self.llm.complete(&prompt)).await {
            Ok(Ok(reply)) => {
                let trimmed = reply.trim();
                if trimmed.is_empty() {
                    FALLBACK_REPLY.to_string()
                } else {
                    trimmed.to_string()
                }
            }
            Ok(Err(error)) => {
                warn!(event_name = "responder_failed", error = %error, "reply generation failed");
                FALLBACK_REPLY.to_string()
            }
            Err(_) => {
                warn!(event_name = "responder_timeout", "reply generation timed out");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use shopbot_core::catalog::CatalogSnapshot;
    use shopbot_core::domain::conversation::Conversation;
    use shopbot_core::domain::customer::CustomerId;
    use shopbot_core::domain::store::{ColumnMapping, Store, StoreId};

    use super::{Responder, FALLBACK_REPLY};
    use crate::context::PromptContext;
    use crate::llm::{FailingLlmClient, ScriptedLlmClient};

    fn store() -> Store {
        Store {
            id: StoreId::new(),
            name: "Shop".to_string(),
            channel_ids: vec!["page-1".to_string()],
            spreadsheet_id: None,
            has_delivery: true,
            pickup_address: None,
            accepts_invoicing: false,
            persona: String::new(),
            column_mapping: ColumnMapping::default(),
            currency: "MNT".to_string(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn replies_are_passed_through_trimmed() {
        let llm = Arc::new(ScriptedLlmClient::with_responses(["  Сайн байна уу! 😊  "]));
        let responder = Responder::new(llm, Duration::from_secs(5));

        let store = store();
        let catalog = CatalogSnapshot::default();
        let conversation = Conversation::new(store.id, CustomerId::new(), "psid-1");
        let context = PromptContext {
            store: &store,
            catalog: &catalog,
            conversation: &conversation,
            recent_orders: &[],
        };

        let reply = responder.reply(&context, "сайн уу").await;
        assert_eq!(reply, "Сайн байна уу! 😊");
    }

    #[tokio::test]
    async fn failures_fall_back_to_the_apology_reply() {
        let responder = Responder::new(Arc::new(FailingLlmClient), Duration::from_secs(5));

        let store = store();
        let catalog = CatalogSnapshot::default();
        let conversation = Conversation::new(store.id, CustomerId::new(), "psid-1");
        let context = PromptContext {
            store: &store,
            catalog: &catalog,
            conversation: &conversation,
            recent_orders: &[],
        };

        let reply = responder.reply(&context, "сайн уу").await;
        assert_eq!(reply, FALLBACK_REPLY);
    }
}

use std::sync::Arc;
use std::time::Duration;

use shopbot_core::extraction::ExtractionResult;
use tracing::warn;

use crate::context::PromptContext;
use crate::llm::LlmClient;

/// Turns one inbound message into a structured [`ExtractionResult`].
///
/// Every failure mode collapses to [`ExtractionResult::safe_default`]: a
/// transport error, a timeout, or a response that is not valid JSON must
/// never surface as an error to the pipeline, and must never produce an
/// order.
pub struct ExtractionOracle {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl ExtractionOracle {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn extract(&self, context: &PromptContext<'_>, inbound: &str) -> ExtractionResult {
        let prompt = context.extraction_prompt(inbound);

        let raw = match tokio::time::timeout(self.timeout, self.llm.complete(&prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(error)) => {
                warn!(event_name = "oracle_failed", error = %error, "extraction failed");
                return ExtractionResult::safe_default();
            }
            Err(_) => {
                warn!(
                    event_name = "oracle_timeout",
                    timeout_secs = self.timeout.as_secs(),
                    "extraction timed out"
                );
                return ExtractionResult::safe_default();
            }
        };

        match parse_json_payload(&raw) {
            Some(value) => ExtractionResult::from_oracle_json(&value),
            None => {
                warn!(event_name = "oracle_unparseable", "extraction response was not json");
                ExtractionResult::safe_default()
            }
        }
    }
}

/// Pulls the first JSON object out of the completion, tolerating code fences
/// and surrounding prose.
fn parse_json_payload(raw: &str) -> Option<serde_json::Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use shopbot_core::catalog::CatalogSnapshot;
    use shopbot_core::domain::conversation::Conversation;
    use shopbot_core::domain::customer::CustomerId;
    use shopbot_core::domain::store::{ColumnMapping, Store, StoreId};
    use shopbot_core::extraction::ExtractionIntent;

    use super::ExtractionOracle;
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
            accepts_invoicing: true,
            persona: String::new(),
            column_mapping: ColumnMapping::default(),
            currency: "MNT".to_string(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn valid_json_with_code_fences_is_parsed() {
        let llm = Arc::new(ScriptedLlmClient::with_responses([
            "```json\n{\"intent\": \"ordering\", \"isOrderReady\": true, \
             \"data\": {\"items\": [{\"name\": \"хар цамц\", \"quantity\": 2}], \
             \"phone\": \"99112233\", \"full_address\": \"БЗД\"}, \
             \"missingFields\": [], \"confidence\": 0.9}\n```",
        ]));
        let oracle = ExtractionOracle::new(llm, Duration::from_secs(5));

        let store = store();
        let catalog = CatalogSnapshot::default();
        let conversation = Conversation::new(store.id, CustomerId::new(), "psid-1");
        let context = PromptContext {
            store: &store,
            catalog: &catalog,
            conversation: &conversation,
            recent_orders: &[],
        };

        let result = oracle.extract(&context, "хар цамц 2ш авъя").await;
        assert!(result.is_order_ready);
        assert!(matches!(result.intent, ExtractionIntent::Ordering { .. }));
    }

    #[tokio::test]
    async fn llm_failure_collapses_to_the_safe_default() {
        let oracle = ExtractionOracle::new(Arc::new(FailingLlmClient), Duration::from_secs(5));

        let store = store();
        let catalog = CatalogSnapshot::default();
        let conversation = Conversation::new(store.id, CustomerId::new(), "psid-1");
        let context = PromptContext {
            store: &store,
            catalog: &catalog,
            conversation: &conversation,
            recent_orders: &[],
        };

        let result = oracle.extract(&context, "сайн уу").await;
        assert_eq!(result.intent, ExtractionIntent::Browsing);
        assert!(!result.is_order_ready);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn non_json_responses_collapse_to_the_safe_default() {
        let llm =
            Arc::new(ScriptedLlmClient::with_responses(["Уучлаарай, би ойлгосонгүй."]));
        let oracle = ExtractionOracle::new(llm, Duration::from_secs(5));

        let store = store();
        let catalog = CatalogSnapshot::default();
        let conversation = Conversation::new(store.id, CustomerId::new(), "psid-1");
        let context = PromptContext {
            store: &store,
            catalog: &catalog,
            conversation: &conversation,
            recent_orders: &[],
        };

        let result = oracle.extract(&context, "юу байна").await;
        assert!(!result.is_order_ready);
        assert_eq!(result.confidence, 0.0);
    }
}

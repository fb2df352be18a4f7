use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::Intent;

/// Oracle confidence must strictly exceed this before an order is committed.
pub const ORDER_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// A line item as the oracle extracted it. The price, when present, is the
/// oracle's guess and is never trusted for pricing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

/// The oracle's JSON response is a duck-typed variant of several intents.
/// It is validated into this tagged union at the adapter boundary so
/// downstream code cannot read fields that do not apply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum ExtractionIntent {
    Browsing,
    Inquiry,
    Ordering {
        items: Vec<ExtractedItem>,
        phone: Option<String>,
        address: Option<String>,
    },
    OrderStatus,
}

impl ExtractionIntent {
    pub fn as_intent(&self) -> Intent {
        match self {
            Self::Browsing => Intent::Browsing,
            Self::Inquiry => Intent::Inquiry,
            Self::Ordering { .. } => Intent::Ordering,
            Self::OrderStatus => Intent::OrderStatus,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub intent: ExtractionIntent,
    pub is_order_ready: bool,
    pub missing_fields: Vec<String>,
    pub confidence: f64,
}

impl ExtractionResult {
    /// The fallback for any oracle failure or timeout. The pipeline must
    /// never fabricate an order from a failed extraction.
    pub fn safe_default() -> Self {
        Self {
            intent: ExtractionIntent::Browsing,
            is_order_ready: false,
            missing_fields: Vec::new(),
            confidence: 0.0,
        }
    }

    /// Validates a raw oracle response. Unknown intents collapse to browsing,
    /// confidence is clamped to [0, 1], quantities default to 1, and ordering
    /// data is only read when the intent is actually `ordering`.
    pub fn from_oracle_json(raw: &serde_json::Value) -> Self {
        let intent_label = raw.get("intent").and_then(|value| value.as_str()).unwrap_or("browsing");
        let confidence = raw
            .get("confidence")
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let is_order_ready =
            raw.get("isOrderReady").and_then(|value| value.as_bool()).unwrap_or(false);
        let missing_fields = raw
            .get("missingFields")
            .and_then(|value| value.as_array())
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|field| field.as_str())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let intent = match intent_label {
            "inquiry" => ExtractionIntent::Inquiry,
            "order_status" => ExtractionIntent::OrderStatus,
            "ordering" => {
                let data = raw.get("data");
                let items = data
                    .and_then(|data| data.get("items"))
                    .and_then(|items| items.as_array())
                    .map(|items| items.iter().filter_map(parse_item).collect::<Vec<_>>())
                    .unwrap_or_default();
                let phone = data
                    .and_then(|data| data.get("phone"))
                    .and_then(|value| value.as_str())
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string);
                let address = data
                    .and_then(|data| data.get("full_address"))
                    .and_then(|value| value.as_str())
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string);
                ExtractionIntent::Ordering { items, phone, address }
            }
            _ => ExtractionIntent::Browsing,
        };

        Self { intent, is_order_ready, missing_fields, confidence }
    }
}

fn parse_item(raw: &serde_json::Value) -> Option<ExtractedItem> {
    let name = raw.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    let quantity = raw
        .get("quantity")
        .and_then(|value| value.as_u64())
        .map(|value| value.min(u32::MAX as u64) as u32)
        .filter(|value| *value > 0)
        .unwrap_or(1);
    let price = raw
        .get("price")
        .and_then(|value| value.as_f64())
        .and_then(|value| Decimal::try_from(value).ok());
    Some(ExtractedItem { name: name.to_string(), quantity, price })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ExtractionIntent, ExtractionResult};

    #[test]
    fn ordering_response_parses_items_phone_and_address() {
        let raw = json!({
            "intent": "ordering",
            "isOrderReady": true,
            "data": {
                "items": [{"name": "хар цамц", "quantity": 2, "price": 40000}],
                "phone": "99112233",
                "full_address": "БЗД 14-р хороо"
            },
            "missingFields": [],
            "confidence": 0.92
        });

        let result = ExtractionResult::from_oracle_json(&raw);
        assert!(result.is_order_ready);
        assert!((result.confidence - 0.92).abs() < f64::EPSILON);
        match result.intent {
            ExtractionIntent::Ordering { items, phone, address } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].name, "хар цамц");
                assert_eq!(items[0].quantity, 2);
                assert_eq!(phone.as_deref(), Some("99112233"));
                assert_eq!(address.as_deref(), Some("БЗД 14-р хороо"));
            }
            other => panic!("expected ordering intent, got {other:?}"),
        }
    }

    #[test]
    fn ordering_fields_are_ignored_for_non_ordering_intents() {
        let raw = json!({
            "intent": "inquiry",
            "isOrderReady": true,
            "data": {"items": [{"name": "гутал", "quantity": 1}]},
            "confidence": 0.8
        });

        let result = ExtractionResult::from_oracle_json(&raw);
        assert_eq!(result.intent, ExtractionIntent::Inquiry);
    }

    #[test]
    fn unknown_intent_and_garbage_fields_collapse_to_safe_shape() {
        let raw = json!({"intent": "complaint", "confidence": 7.5});
        let result = ExtractionResult::from_oracle_json(&raw);
        assert_eq!(result.intent, ExtractionIntent::Browsing);
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
        assert!(!result.is_order_ready);
    }

    #[test]
    fn blank_item_names_and_zero_quantities_are_sanitized() {
        let raw = json!({
            "intent": "ordering",
            "data": {"items": [
                {"name": "  ", "quantity": 3},
                {"name": "цамц", "quantity": 0}
            ]}
        });

        let result = ExtractionResult::from_oracle_json(&raw);
        match result.intent {
            ExtractionIntent::Ordering { items, .. } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].quantity, 1);
            }
            other => panic!("expected ordering intent, got {other:?}"),
        }
    }

    #[test]
    fn safe_default_never_signals_readiness() {
        let fallback = ExtractionResult::safe_default();
        assert_eq!(fallback.intent, ExtractionIntent::Browsing);
        assert!(!fallback.is_order_ready);
        assert_eq!(fallback.confidence, 0.0);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub Uuid);

impl CustomerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A messaging-channel identity. Customers are keyed by the channel's sender
/// id and do not belong to any single store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub channel_id: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Customer {
    pub fn new(channel_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CustomerId::new(),
            channel_id: channel_id.into(),
            name: name.into(),
            phone_number: None,
            address: None,
            first_seen: now,
            last_seen: now,
        }
    }
}

/// Validates an 8-digit Mongolian mobile number (leading digit 6-9) after
/// stripping non-digit characters. Used for review flagging, never to block
/// order creation.
pub fn is_valid_phone(raw: &str) -> bool {
    let digits: String = raw.chars().filter(|ch| ch.is_ascii_digit()).collect();
    digits.len() == 8 && matches!(digits.as_bytes()[0], b'6'..=b'9')
}

use serde::Deserialize;

/// Raw webhook body as the messaging platform delivers it. Everything not
/// needed downstream is ignored during deserialization.
#[derive(Clone, Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WebhookEntry {
    /// The page id the event was delivered for; routes to a store.
    pub id: String,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MessagingEvent {
    pub sender: Participant,
    #[serde(default)]
    pub message: Option<InboundMessage>,
    #[serde(default)]
    pub postback: Option<Postback>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Participant {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Echoes of the page's own outbound messages; dropped.
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type", default)]
    pub attachment_type: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postback {
    #[serde(default)]
    pub payload: String,
}

/// One normalized inbound event, detached from the webhook wire shape.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundEvent {
    /// Page id; resolves the tenant store.
    pub channel_id: String,
    /// Sender id; doubles as the channel conversation id.
    pub sender_id: String,
    /// Transport message id when the platform supplied one, for dedup.
    pub message_id: Option<String>,
    pub kind: InboundKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InboundKind {
    Text(String),
    Postback(String),
    Attachment { attachment_type: String },
}

/// Flattens a webhook envelope into normalized events, dropping echoes and
/// entries with nothing actionable.
pub fn normalize_envelope(envelope: &WebhookEnvelope) -> Vec<InboundEvent> {
    let mut events = Vec::new();

    for entry in &envelope.entry {
        for messaging in &entry.messaging {
            if let Some(postback) = &messaging.postback {
                events.push(InboundEvent {
                    channel_id: entry.id.clone(),
                    sender_id: messaging.sender.id.clone(),
                    message_id: None,
                    kind: InboundKind::Postback(postback.payload.clone()),
                });
                continue;
            }

            let Some(message) = &messaging.message else {
                continue;
            };
            if message.is_echo {
                continue;
            }

            if let Some(text) = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                events.push(InboundEvent {
                    channel_id: entry.id.clone(),
                    sender_id: messaging.sender.id.clone(),
                    message_id: message.mid.clone(),
                    kind: InboundKind::Text(text.to_string()),
                });
            } else if let Some(attachment) = message.attachments.first() {
                events.push(InboundEvent {
                    channel_id: entry.id.clone(),
                    sender_id: messaging.sender.id.clone(),
                    message_id: message.mid.clone(),
                    kind: InboundKind::Attachment {
                        attachment_type: attachment.attachment_type.clone(),
                    },
                });
            }
        }
    }

    events
}

pub mod events;
pub mod notify;
pub mod outbound;

pub use events::{normalize_envelope, InboundEvent, InboundKind, WebhookEnvelope};
pub use notify::{
    NoopNotificationEmitter, NotificationEmitter, NotificationEvent, RecordingNotificationEmitter,
};
pub use outbound::{
    HttpMessengerClient, MessengerClient, NoopMessengerClient, OutboundError,
    RecordingMessengerClient, UserProfile,
};

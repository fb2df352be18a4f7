use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("platform rejected the request: {0}")]
    Api(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserProfile {
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }
}

#[async_trait]
pub trait MessengerClient: Send + Sync {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), OutboundError>;
    async fn set_typing(&self, recipient_id: &str, on: bool) -> Result<(), OutboundError>;
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, OutboundError>;
}

/// Graph-API send client.
pub struct HttpMessengerClient {
    client: reqwest::Client,
    base_url: String,
    page_access_token: SecretString,
}

impl HttpMessengerClient {
    pub fn new(base_url: impl Into<String>, page_access_token: SecretString) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), page_access_token }
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        page_access_token: SecretString,
        timeout: std::time::Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, base_url: base_url.into(), page_access_token }
    }

    async fn post_message(&self, body: serde_json::Value) -> Result<(), OutboundError> {
        let url = format!("{}/me/messages", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", self.page_access_token.expose_secret())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(OutboundError::Api(format!("{status}: {detail}")));
        }
        Ok(())
    }
}

#[async_trait]
impl MessengerClient for HttpMessengerClient {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), OutboundError> {
        self.post_message(json!({
            "recipient": {"id": recipient_id},
            "message": {"text": text},
        }))
        .await
    }

    async fn set_typing(&self, recipient_id: &str, on: bool) -> Result<(), OutboundError> {
        self.post_message(json!({
            "recipient": {"id": recipient_id},
            "sender_action": if on { "typing_on" } else { "typing_off" },
        }))
        .await
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, OutboundError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), user_id);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", "first_name,last_name"),
                ("access_token", self.page_access_token.expose_secret()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            // Profile lookups are best-effort enrichment.
            return Ok(None);
        }

        let payload: serde_json::Value = response.json().await?;
        Ok(Some(UserProfile {
            first_name: payload
                .get("first_name")
                .and_then(|value| value.as_str())
                .map(str::to_string),
            last_name: payload
                .get("last_name")
                .and_then(|value| value.as_str())
                .map(str::to_string),
        }))
    }
}

/// Discards everything; used when outbound messaging is disabled.
pub struct NoopMessengerClient;

#[async_trait]
impl MessengerClient for NoopMessengerClient {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), OutboundError> {
        debug!(event_name = "noop_send_text", recipient_id, text, "dropping outbound message");
        Ok(())
    }

    async fn set_typing(&self, _recipient_id: &str, _on: bool) -> Result<(), OutboundError> {
        Ok(())
    }

    async fn fetch_profile(&self, _user_id: &str) -> Result<Option<UserProfile>, OutboundError> {
        Ok(None)
    }
}

/// Records every outbound call for assertions.
#[derive(Default)]
pub struct RecordingMessengerClient {
    pub sent: Mutex<Vec<(String, String)>>,
    pub typing: Mutex<Vec<(String, bool)>>,
    pub profile: Option<UserProfile>,
}

impl RecordingMessengerClient {
    pub fn with_profile(profile: UserProfile) -> Self {
        Self { profile: Some(profile), ..Self::default() }
    }

    pub async fn sent_texts(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessengerClient for RecordingMessengerClient {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), OutboundError> {
        self.sent.lock().await.push((recipient_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn set_typing(&self, recipient_id: &str, on: bool) -> Result<(), OutboundError> {
        self.typing.lock().await.push((recipient_id.to_string(), on));
        Ok(())
    }

    async fn fetch_profile(&self, _user_id: &str) -> Result<Option<UserProfile>, OutboundError> {
        Ok(self.profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::UserProfile;

    #[test]
    fn full_name_joins_available_parts() {
        let both = UserProfile {
            first_name: Some("Бат".to_string()),
            last_name: Some("Дорж".to_string()),
        };
        assert_eq!(both.full_name().as_deref(), Some("Бат Дорж"));

        let first_only = UserProfile { first_name: Some("Бат".to_string()), last_name: None };
        assert_eq!(first_only.full_name().as_deref(), Some("Бат"));

        assert_eq!(UserProfile::default().full_name(), None);
    }
}

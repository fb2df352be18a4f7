use std::collections::VecDeque;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::Mutex;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_retries: u32,
}

impl HttpLlmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            max_retries,
        }
    }

    async fn complete_once(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.3,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("llm request failed")?
            .error_for_status()
            .context("llm returned an error status")?;

        let payload: serde_json::Value =
            response.json().await.context("llm response was not json")?;
        payload
            .pointer("/choices/0/message/content")
            .and_then(|content| content.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("llm response had no completion content"))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;
        for _ in 0..=self.max_retries {
            match self.complete_once(prompt).await {
                Ok(content) => return Ok(content),
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("llm completion failed")))
    }
}

/// Returns queued responses in order; errors once the script runs out.
#[derive(Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedLlmClient {
    pub fn with_responses(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        let mut responses = self.responses.lock().await;
        responses.pop_front().ok_or_else(|| anyhow!("scripted llm client has no responses left"))
    }
}

/// Always fails. Exercises the oracle's safe-default path.
pub struct FailingLlmClient;

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!("llm unavailable"))
    }
}

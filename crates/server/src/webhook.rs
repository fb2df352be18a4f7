use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use shopbot_engine::Pipeline;
use shopbot_messenger::{normalize_envelope, WebhookEnvelope};

#[derive(Clone)]
pub struct WebhookState {
    pub pipeline: Arc<Pipeline>,
    pub verify_token: SecretString,
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/webhook", get(verify).post(receive)).with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Subscription handshake: echo the challenge only for a matching token.
async fn verify(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    let token_matches =
        params.verify_token.as_deref() == Some(state.verify_token.expose_secret());
    if params.mode.as_deref() == Some("subscribe") && token_matches {
        info!(event_name = "webhook_verified", "webhook subscription verified");
        return (StatusCode::OK, params.challenge.unwrap_or_default());
    }
    warn!(event_name = "webhook_verification_rejected", "verify token mismatch");
    (StatusCode::FORBIDDEN, String::new())
}

/// The transport expects a fast 200 regardless of downstream outcome, so
/// events are processed in spawned tasks after acknowledgment.
async fn receive(
    State(state): State<WebhookState>,
    Json(envelope): Json<WebhookEnvelope>,
) -> StatusCode {
    for event in normalize_envelope(&envelope) {
        let pipeline = Arc::clone(&state.pipeline);
        tokio::spawn(async move {
            if let Err(error) = pipeline.handle_event(event).await {
                warn!(
                    event_name = "event_failed",
                    error = %error,
                    "inbound event was not processed"
                );
            }
        });
    }
    StatusCode::OK
}

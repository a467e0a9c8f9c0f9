//! Subscriber registration
//!
//! Writes straight to the registry; the poll loop picks the new URL up on
//! its next subscriber refresh.

use axum::{extract::State, response::Json, routing::post, Router};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::{AppError, AppResult, AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSubscriptionRequest {
    pub stream: String,
    /// Subscriber id, unique within the stream; re-registering replaces the URL
    pub id: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterSubscriptionResponse {
    pub status: String,
}

/// Create subscription routes
pub fn create_subscriptions_router() -> Router<AppState> {
    Router::new().route("/subscriptions", post(register_subscription))
}

/// POST /subscriptions
pub async fn register_subscription(
    State(state): State<AppState>,
    Json(req): Json<RegisterSubscriptionRequest>,
) -> AppResult<Json<RegisterSubscriptionResponse>> {
    validate(&req)?;

    state.registry.register(&req.stream, &req.id, &req.url).await?;

    tracing::info!(stream = %req.stream, id = %req.id, "Subscriber registered");
    Ok(Json(RegisterSubscriptionResponse {
        status: "registered".to_string(),
    }))
}

fn validate(req: &RegisterSubscriptionRequest) -> AppResult<()> {
    if req.stream.trim().is_empty() {
        return Err(AppError::bad_request("stream must not be empty"));
    }
    if req.id.trim().is_empty() {
        return Err(AppError::bad_request("id must not be empty"));
    }

    let url = Url::parse(&req.url)
        .map_err(|e| AppError::bad_request(format!("invalid url: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AppError::bad_request("url must be an http(s) URL"));
    }

    Ok(())
}

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::Value;

use crate::auth::verify_github_signature;
use crate::dispatch::NotifyResponse;
use crate::error::AppError;
use crate::state::AppState;

/// POST /api/v1/webhooks/github: handle a native GitHub webhook delivery.
pub async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<NotifyResponse>, AppError> {
    // Verify HMAC signature if secret is configured
    if let Some(ref secret) = state.auth.github_webhook_secret {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing signature header".to_string()))?;

        if !verify_github_signature(signature, secret, &body) {
            return Err(AppError::Unauthorized("Invalid signature".to_string()));
        }
    } else if state.auth.require_webhook_signature {
        return Err(AppError::Unauthorized(
            "Webhook signature required but no secret configured".to_string(),
        ));
    } else {
        tracing::warn!("GitHub webhook accepted without HMAC verification (no secret configured)");
    }

    let gh_event = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let delivery = headers
        .get("x-github-delivery")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?;

    if gh_event == "ping" {
        tracing::info!(delivery, "GitHub webhook ping received");
        return Ok(Json(NotifyResponse {
            notified: false,
            kind: None,
        }));
    }

    let event = state.coordinator.handle_webhook(gh_event, &payload).await;
    tracing::debug!(
        delivery,
        github_event = gh_event,
        notified = event.is_some(),
        "GitHub webhook handled"
    );
    Ok(Json(NotifyResponse::from(event.as_ref())))
}

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::Serialize;

use jarvis_core::NotificationEvent;

use crate::error::AppError;
use crate::state::AppState;

/// Outcome of one payload-driven run.
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub notified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl From<Option<&NotificationEvent>> for NotifyResponse {
    fn from(event: Option<&NotificationEvent>) -> Self {
        Self {
            notified: event.is_some(),
            kind: event.map(NotificationEvent::kind),
        }
    }
}

/// POST /api/v1/dispatch: handle one dispatch payload.
///
/// A payload that yields no event (malformed JSON, unknown `event_type`)
/// is still a 200 with `notified: false`.
pub async fn dispatch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NotifyResponse>, AppError> {
    let raw = std::str::from_utf8(&body)
        .map_err(|_| AppError::BadRequest("Body is not valid UTF-8".to_string()))?;
    let event = state.coordinator.handle_payload_str(raw).await;
    Ok(Json(NotifyResponse::from(event.as_ref())))
}

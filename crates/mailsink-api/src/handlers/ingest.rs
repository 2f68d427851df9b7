//! Webhook ingestion handler with verification, normalization, and
//! persistence.
//!
//! Accepts one provider webhook per call and issues exactly one store
//! write (insert or open-aggregation upsert) for every accepted payload.
//! The caller gives no transport guarantee: replays of the same open event
//! increment the counter again by design.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use mailsink_core::{normalize, EventType, MailsinkError};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{crypto, AppState};

/// Header carrying the provider's HMAC signature.
const SIGNATURE_HEADER: &str = "webhook-signature";

/// Response for a successfully persisted event.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Always `"success"`.
    pub status: &'static str,
    /// Names the event type and whether it was stored or updated.
    pub message: String,
}

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message.
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable error code (E1001-E9999).
    pub code: String,
    /// Human-readable error description.
    pub message: String,
}

/// Ingests an email lifecycle event webhook.
///
/// Pipeline: signature verification (when a secret is configured), JSON
/// parse, normalization, then persistence. `email.opened` events with an
/// `email_id` aggregate atomically into any existing open record; every
/// other event type inserts a new immutable row.
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 400: malformed JSON or missing event type (rejected before storage)
/// - 401: signature verification failed
/// - 500: storage failure, including an insert returning no record
#[instrument(
    name = "ingest_email_event",
    skip(state, headers, body),
    fields(payload_size = body.len())
)]
pub async fn ingest_email_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process(&state, &headers, &body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => {
            warn!(code = error.code(), error = %error, "webhook rejected");
            error_response(&error)
        },
    }
}

async fn process(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<IngestResponse, MailsinkError> {
    if let Some(secret) = &state.config.webhook_secret {
        let signature =
            headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).unwrap_or("");
        crypto::verify_signature(body, signature, secret)
            .map_err(|e| MailsinkError::InvalidSignature(e.to_string()))?;
    }

    let payload: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| MailsinkError::InvalidJson(e.to_string()))?;

    let processed_at: DateTime<Utc> = state.clock.now_system().into();
    let event = normalize(&payload, processed_at)?;
    let event_type = event.event_type.clone();

    let updated = if event_type == EventType::Opened && event.email_id.is_some() {
        state.store.record_open(event).await?.updated
    } else {
        state.store.insert(event).await?;
        false
    };

    let action = if updated { "Updated" } else { "Stored" };
    info!(event_type = %event_type, action, "email event persisted");

    Ok(IngestResponse {
        status: "success",
        message: format!("{action} {event_type} event"),
    })
}

/// Maps a service error to its HTTP status and JSON body.
fn error_response(error: &MailsinkError) -> Response {
    let status = match error {
        MailsinkError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = ErrorResponse {
        error: ErrorDetail { code: error.code().to_string(), message: error.to_string() },
    };

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use mailsink_core::CoreError;

    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        let response = error_response(&MailsinkError::MissingEventType);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(&MailsinkError::InvalidJson("eof".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(&MailsinkError::InvalidSignature("mismatch".into()));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn storage_errors_map_to_500() {
        let error = MailsinkError::Storage(CoreError::Database("connection reset".into()));
        let response = error_response(&error);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

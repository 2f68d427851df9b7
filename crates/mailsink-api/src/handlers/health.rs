//! Health and diagnostic handlers for service monitoring.
//!
//! Liveness is a static check that the process responds; the diagnostic
//! endpoint performs a trivial store read and reports which configuration
//! values are present as booleans. Secret values themselves are never
//! returned, and the displayed database URL is masked.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::AppState;

/// Diagnostic response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status.
    pub status: HealthStatus,
    /// Timestamp when the check was performed.
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks.
    pub checks: HealthChecks,
    /// Which configuration values are present (booleans only).
    pub config: ConfigPresence,
    /// Service version information.
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Critical systems failing.
    Unhealthy,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Store connectivity via a trivial read.
    pub database: ComponentHealth,
}

/// Health status for an individual component.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status.
    pub status: ComponentStatus,
    /// Optional error message if unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds.
    pub response_time_ms: u64,
}

/// Component-level health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy.
    Up,
    /// Component is experiencing issues.
    Down,
}

/// Configuration presence flags for operational visibility.
///
/// Booleans only; the identifier shown is the masked database URL.
#[derive(Debug, Serialize)]
pub struct ConfigPresence {
    /// Whether a database URL is configured.
    pub database_url_configured: bool,
    /// Masked database URL with the credential redacted.
    pub database_url: String,
    /// Whether webhook signature verification is configured.
    pub webhook_secret_configured: bool,
}

/// Store-connectivity diagnostic endpoint.
///
/// Attempts a trivial store read and reports per-component status along
/// with configuration presence flags. Called by orchestration systems, so
/// it avoids expensive operations.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Response {
    debug!("performing store connectivity check");

    let timestamp = DateTime::<Utc>::from(state.clock.now_system());
    let start = state.clock.now();

    let database = match state.store.health_check().await {
        Ok(()) => ComponentHealth {
            status: ComponentStatus::Up,
            message: None,
            response_time_ms: elapsed_ms(&state, start),
        },
        Err(e) => {
            error!(error = %e, "store connectivity check failed");
            ComponentHealth {
                status: ComponentStatus::Down,
                message: Some(format!("store connection failed: {e}")),
                response_time_ms: elapsed_ms(&state, start),
            }
        },
    };

    let status = match database.status {
        ComponentStatus::Up => HealthStatus::Healthy,
        ComponentStatus::Down => HealthStatus::Unhealthy,
    };

    let status_code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        timestamp,
        checks: HealthChecks { database },
        config: ConfigPresence {
            database_url_configured: !state.config.database_url.is_empty(),
            database_url: state.config.database_url_masked(),
            webhook_secret_configured: state.config.webhook_secret.is_some(),
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response)).into_response()
}

/// Liveness endpoint.
///
/// Returns a fixed healthy payload without touching external
/// dependencies; only confirms the HTTP server is responding.
#[instrument(name = "liveness_check", skip(state))]
pub async fn liveness_check(State(state): State<AppState>) -> Response {
    let response = serde_json::json!({
        "status": "healthy",
        "service": "mailsink",
        "timestamp": DateTime::<Utc>::from(state.clock.now_system()),
    });

    (StatusCode::OK, Json(response)).into_response()
}

fn elapsed_ms(state: &AppState, start: std::time::Instant) -> u64 {
    let elapsed = state.clock.now().duration_since(start);
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

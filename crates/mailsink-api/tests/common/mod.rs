//! Shared test infrastructure: an in-memory event store mirroring the
//! Postgres upsert semantics, plus router and request helpers.

#![allow(dead_code)]

use std::{
    future::{ready, Future},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::{Duration, UNIX_EPOCH},
};

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use mailsink_api::{AppState, Config};
use mailsink_core::{
    storage::EventStore, CoreError, EmailEvent, EventId, EventType, NewEmailEvent, OpenOutcome,
    Result, TestClock,
};
use sqlx::types::Json;
use tower::ServiceExt;

/// In-memory `EventStore` fake.
///
/// `record_open` reproduces the atomic upsert semantics of the Postgres
/// repository: increment the counter, preserve `first_opened_at`, replace
/// `last_opened_at` and the latest-open snapshots.
#[derive(Default)]
pub struct InMemoryStore {
    events: Mutex<Vec<EmailEvent>>,
    /// Simulates an insert that produces no created record.
    pub fail_inserts: AtomicBool,
    /// Simulates a store that is unreachable for connectivity checks.
    pub fail_health: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of all stored events.
    pub fn events(&self) -> Vec<EmailEvent> {
        self.events.lock().unwrap().clone()
    }

    fn materialize(event: NewEmailEvent) -> EmailEvent {
        EmailEvent {
            id: EventId::new(),
            event_type: event.event_type,
            created_at: event.created_at,
            email_id: event.email_id,
            from_email: event.from_email,
            to_email: event.to_email,
            subject: event.subject,
            tags: Json(event.tags),
            raw_payload: Json(event.raw_payload),
            processed_at: event.processed_at,
            bounce_type: event.bounce_type,
            bounce_subtype: event.bounce_subtype,
            bounce_message: event.bounce_message,
            click_ip: event.click_ip,
            click_link: event.click_link,
            click_user_agent: event.click_user_agent,
            click_timestamp: event.click_timestamp,
            opened_count: event.opened_count,
            first_opened_at: event.first_opened_at,
            last_opened_at: event.last_opened_at,
            device_info: event.device_info.map(Json),
            location_info: event.location_info.map(Json),
        }
    }

    fn do_insert(&self, event: NewEmailEvent) -> Result<EmailEvent> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(CoreError::Database("insert returned no created record".to_string()));
        }

        let stored = Self::materialize(event);
        self.events.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    fn do_record_open(&self, event: NewEmailEvent) -> Result<OpenOutcome> {
        if event.email_id.is_none() {
            let stored = self.do_insert(event)?;
            return Ok(OpenOutcome { event: stored, updated: false });
        }

        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(CoreError::Database("upsert returned no record".to_string()));
        }

        let mut events = self.events.lock().unwrap();
        let existing = events.iter_mut().find(|e| {
            e.event_type == EventType::Opened && e.email_id == event.email_id
        });

        if let Some(row) = existing {
            row.opened_count = Some(row.opened_count.unwrap_or(0) + 1);
            if row.first_opened_at.is_none() {
                row.first_opened_at = event.first_opened_at.clone();
            }
            row.last_opened_at = event.last_opened_at.clone();
            row.device_info = event.device_info.map(Json);
            row.location_info = event.location_info.map(Json);
            row.raw_payload = Json(event.raw_payload);
            row.processed_at = event.processed_at;
            return Ok(OpenOutcome { event: row.clone(), updated: true });
        }

        let stored = Self::materialize(event);
        events.push(stored.clone());
        Ok(OpenOutcome { event: stored, updated: false })
    }
}

impl EventStore for InMemoryStore {
    fn insert(
        &self,
        event: NewEmailEvent,
    ) -> Pin<Box<dyn Future<Output = Result<EmailEvent>> + Send + '_>> {
        Box::pin(ready(self.do_insert(event)))
    }

    fn record_open(
        &self,
        event: NewEmailEvent,
    ) -> Pin<Box<dyn Future<Output = Result<OpenOutcome>> + Send + '_>> {
        Box::pin(ready(self.do_record_open(event)))
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let result = if self.fail_health.load(Ordering::SeqCst) {
            Err(CoreError::Database("connection refused".to_string()))
        } else {
            Ok(())
        };
        Box::pin(ready(result))
    }
}

/// Builds application state around the fake store with a test clock.
pub fn test_state(store: Arc<InMemoryStore>, config: Config) -> (AppState, TestClock) {
    let clock = TestClock::with_start_time(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    let state = AppState::new(store, Arc::new(clock.clone()), Arc::new(config));
    (state, clock)
}

/// Router over the fake store with default configuration.
pub fn test_router(store: Arc<InMemoryStore>) -> Router {
    let (state, _clock) = test_state(store, Config::default());
    mailsink_api::create_router(state)
}

/// Sends a JSON webhook to the ingest endpoint.
pub async fn post_webhook(app: &Router, payload: &serde_json::Value) -> Response<Body> {
    post_webhook_raw(app, serde_json::to_vec(payload).unwrap(), None).await
}

/// Sends a raw body to the ingest endpoint, optionally signed.
pub async fn post_webhook_raw(
    app: &Router,
    body: Vec<u8>,
    signature: Option<&str>,
) -> Response<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri("/webhooks/email")
        .header("content-type", "application/json");

    if let Some(signature) = signature {
        request = request.header("webhook-signature", signature);
    }

    app.clone()
        .oneshot(request.body(Body::from(body)).expect("build request"))
        .await
        .expect("execute request")
}

/// Reads a response body as JSON.
pub async fn response_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response is JSON")
}

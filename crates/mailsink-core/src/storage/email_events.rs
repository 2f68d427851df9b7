//! Repository for email event database operations.
//!
//! Provides inserts for immutable event types and the atomic upsert that
//! aggregates repeated opened events per email. A partial unique index on
//! `(email_id, event_type)` for opened rows backs the upsert, guaranteeing
//! at most one stored open record per email.

use std::sync::Arc;

use sqlx::{types::Json, PgPool};
use tracing::debug;

use crate::{
    error::{CoreError, Result},
    models::{EmailEvent, EventId, NewEmailEvent, OpenOutcome},
};

const RETURNING_COLUMNS: &str = r"
    id, event_type, created_at, email_id, from_email, to_email, subject,
    tags, raw_payload, processed_at,
    bounce_type, bounce_subtype, bounce_message,
    click_ip, click_link, click_user_agent, click_timestamp,
    opened_count, first_opened_at, last_opened_at, device_info, location_info
";

/// Repository for email event database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Inserts a normalized event as a new row and returns it.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the insert fails or produces no
    /// created row, and `CoreError::ConstraintViolation` when a constraint
    /// is violated.
    pub async fn insert(&self, event: NewEmailEvent) -> Result<EmailEvent> {
        let id = EventId::new();
        debug!(event_id = %id, event_type = %event.event_type, "inserting email event");

        let sql = format!(
            r"
            INSERT INTO email_events (
                id, event_type, created_at, email_id, from_email, to_email, subject,
                tags, raw_payload, processed_at,
                bounce_type, bounce_subtype, bounce_message,
                click_ip, click_link, click_user_agent, click_timestamp,
                opened_count, first_opened_at, last_opened_at, device_info, location_info
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
            )
            RETURNING {RETURNING_COLUMNS}
            "
        );

        let row = bind_event(sqlx::query_as::<_, EmailEvent>(&sql), id, &event)
            .fetch_optional(&*self.pool)
            .await?;

        row.ok_or_else(|| CoreError::Database("insert returned no created record".to_string()))
    }

    /// Records an opened event with atomic per-email aggregation.
    ///
    /// A single `INSERT ... ON CONFLICT DO UPDATE` either creates the first
    /// open record or increments the existing one server-side:
    /// `opened_count` grows by one, `first_opened_at` keeps its original
    /// value, `last_opened_at` and the device/location snapshots take the
    /// incoming event's values. There is no read-modify-write window, so
    /// concurrent opens for the same email never lose an increment.
    ///
    /// Opened events without an `email_id` have no correlation key and are
    /// stored as plain inserts.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the upsert fails or produces no
    /// row.
    pub async fn record_open(&self, event: NewEmailEvent) -> Result<OpenOutcome> {
        if event.email_id.is_none() {
            let stored = self.insert(event).await?;
            return Ok(OpenOutcome { event: stored, updated: false });
        }

        let id = EventId::new();
        debug!(event_id = %id, email_id = ?event.email_id, "recording opened event");

        let sql = format!(
            r"
            INSERT INTO email_events (
                id, event_type, created_at, email_id, from_email, to_email, subject,
                tags, raw_payload, processed_at,
                bounce_type, bounce_subtype, bounce_message,
                click_ip, click_link, click_user_agent, click_timestamp,
                opened_count, first_opened_at, last_opened_at, device_info, location_info
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
            )
            ON CONFLICT (email_id, event_type)
                WHERE event_type = 'email.opened' AND email_id IS NOT NULL
            DO UPDATE SET
                opened_count = COALESCE(email_events.opened_count, 0) + 1,
                first_opened_at = COALESCE(email_events.first_opened_at, EXCLUDED.first_opened_at),
                last_opened_at = EXCLUDED.last_opened_at,
                device_info = EXCLUDED.device_info,
                location_info = EXCLUDED.location_info,
                raw_payload = EXCLUDED.raw_payload,
                processed_at = EXCLUDED.processed_at
            RETURNING {RETURNING_COLUMNS}
            "
        );

        let row = bind_event(sqlx::query_as::<_, EmailEvent>(&sql), id, &event)
            .fetch_optional(&*self.pool)
            .await?;

        let stored = row
            .ok_or_else(|| CoreError::Database("upsert returned no record".to_string()))?;

        // A row that conflicted carries the incremented counter.
        let updated = stored.opened_count.unwrap_or(1) > 1;
        Ok(OpenOutcome { event: stored, updated })
    }
}

type PgQueryAs<'q> = sqlx::query::QueryAs<
    'q,
    sqlx::Postgres,
    EmailEvent,
    sqlx::postgres::PgArguments,
>;

/// Binds the full normalized event in column order.
fn bind_event<'q>(query: PgQueryAs<'q>, id: EventId, event: &NewEmailEvent) -> PgQueryAs<'q> {
    query
        .bind(id)
        .bind(event.event_type.to_string())
        .bind(event.created_at.clone())
        .bind(event.email_id.clone())
        .bind(event.from_email.clone())
        .bind(event.to_email.clone())
        .bind(event.subject.clone())
        .bind(Json(event.tags.clone()))
        .bind(Json(event.raw_payload.clone()))
        .bind(event.processed_at)
        .bind(event.bounce_type.clone())
        .bind(event.bounce_subtype.clone())
        .bind(event.bounce_message.clone())
        .bind(event.click_ip.clone())
        .bind(event.click_link.clone())
        .bind(event.click_user_agent.clone())
        .bind(event.click_timestamp.clone())
        .bind(event.opened_count)
        .bind(event.first_opened_at.clone())
        .bind(event.last_opened_at.clone())
        .bind(event.device_info.clone().map(Json))
        .bind(event.location_info.clone().map(Json))
}

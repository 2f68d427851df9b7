//! Database access layer implementing the repository pattern for email
//! event persistence.
//!
//! The repository layer translates between domain models and the database
//! schema. All SQL lives in this module; direct queries elsewhere are
//! forbidden to keep the schema evolvable.
//!
//! The [`EventStore`] trait abstracts the operations the ingest handler
//! depends on, so handler tests can inject an in-memory fake instead of a
//! live database.

use std::{future::Future, pin::Pin, sync::Arc};

use sqlx::PgPool;

pub mod email_events;

use crate::{
    error::Result,
    models::{EmailEvent, NewEmailEvent, OpenOutcome},
};

/// Store operations required by the ingest path.
///
/// Production uses the Postgres-backed [`Storage`]; tests provide
/// lightweight fakes mirroring the same semantics.
pub trait EventStore: Send + Sync + 'static {
    /// Inserts a normalized event as a new row.
    ///
    /// Returns the created row; an insert that produces no row is a
    /// storage failure, never a silent success.
    fn insert(
        &self,
        event: NewEmailEvent,
    ) -> Pin<Box<dyn Future<Output = Result<EmailEvent>> + Send + '_>>;

    /// Records an opened event, aggregating into an existing row when one
    /// exists for the same `(email_id, event_type)`.
    ///
    /// The aggregation is a single atomic statement: the open counter is
    /// incremented server-side, `first_opened_at` is preserved, and
    /// `last_opened_at` takes the incoming event's timestamp. Concurrent
    /// opens for the same email cannot lose an increment.
    fn record_open(
        &self,
        event: NewEmailEvent,
    ) -> Pin<Box<dyn Future<Output = Result<OpenOutcome>> + Send + '_>>;

    /// Performs a trivial read to verify store connectivity.
    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Container for repository instances providing unified database access.
#[derive(Clone)]
pub struct Storage {
    /// Repository for email event operations.
    pub email_events: Arc<email_events::Repository>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { email_events: Arc::new(email_events::Repository::new(Arc::new(pool))) }
    }

    /// Verifies database connectivity with a trivial query.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the connection is unhealthy.
    pub async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.email_events.pool()).await?;

        Ok(())
    }
}

impl EventStore for Storage {
    fn insert(
        &self,
        event: NewEmailEvent,
    ) -> Pin<Box<dyn Future<Output = Result<EmailEvent>> + Send + '_>> {
        Box::pin(async move { self.email_events.insert(event).await })
    }

    fn record_open(
        &self,
        event: NewEmailEvent,
    ) -> Pin<Box<dyn Future<Output = Result<OpenOutcome>> + Send + '_>> {
        Box::pin(async move { self.email_events.record_open(event).await })
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(Storage::health_check(self))
    }
}

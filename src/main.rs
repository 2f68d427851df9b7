//! Mailsink email event webhook sink.
//!
//! Main entry point for the service. Loads configuration, establishes the
//! database pool, ensures the schema exists, and serves the HTTP API until
//! shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use mailsink_api::{AppState, Config};
use mailsink_core::{RealClock, Storage};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting mailsink email event sink");

    let config = Config::load()?;
    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        signature_verification = config.webhook_secret.is_some(),
        "Configuration loaded"
    );

    let pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    run_migrations(&pool).await?;
    info!("Database schema ensured");

    let addr = config.parse_server_addr()?;
    let state = AppState::new(
        Arc::new(Storage::new(pool.clone())),
        Arc::new(RealClock::new()),
        Arc::new(config),
    );

    info!(%addr, "Mailsink is ready to receive webhooks");
    mailsink_api::start_server(state, addr).await.context("HTTP server failed")?;

    pool.close().await;
    info!("Database connections closed, shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,mailsink=debug,tower_http=debug"))
        .expect("Invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with bounded connect retries.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "Database connection failed, retrying..."
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}

/// Ensures the email_events schema exists.
///
/// The partial unique index backs the atomic open-aggregation upsert:
/// at most one stored row per (email_id, email.opened).
async fn run_migrations(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS email_events (
            id UUID PRIMARY KEY,
            event_type TEXT NOT NULL,
            created_at TEXT,
            email_id TEXT,
            from_email TEXT,
            to_email TEXT,
            subject TEXT,
            tags JSONB NOT NULL DEFAULT '[]'::jsonb,
            raw_payload JSONB NOT NULL,
            processed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            bounce_type TEXT,
            bounce_subtype TEXT,
            bounce_message TEXT,
            click_ip TEXT,
            click_link TEXT,
            click_user_agent TEXT,
            click_timestamp TEXT,
            opened_count INTEGER,
            first_opened_at TEXT,
            last_opened_at TEXT,
            device_info JSONB,
            location_info JSONB
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create email_events table")?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_email_events_open_per_email
        ON email_events (email_id, event_type)
        WHERE event_type = 'email.opened' AND email_id IS NOT NULL
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create open aggregation index")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_email_events_email_id
        ON email_events (email_id, processed_at DESC)
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create email_id lookup index")?;

    Ok(())
}

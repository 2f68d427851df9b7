//! HTTP request handlers for the mailsink API.
//!
//! Handlers follow a consistent pattern: input validation with stable
//! error codes, tracing for observability, and standardized JSON error
//! responses. Client errors are rejected before any store access.
//!
//! - `ingest` - webhook ingestion endpoint
//! - `health` - liveness and store-connectivity diagnostics

pub mod health;
pub mod ingest;

pub use health::{health_check, liveness_check};
pub use ingest::ingest_email_event;

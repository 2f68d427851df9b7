//! Mailsink HTTP API.
//!
//! Receives email-delivery provider webhooks, verifies signatures,
//! normalizes payloads, and persists them through the core storage layer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use mailsink_core::{storage::EventStore, time::Clock};

pub mod config;
pub mod crypto;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use server::{create_router, start_server};

/// Shared application state injected into every handler.
///
/// The store and clock are trait objects so tests can swap in fakes; the
/// configuration is read once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    /// Event persistence backend.
    pub store: Arc<dyn EventStore>,
    /// Time source for processing timestamps.
    pub clock: Arc<dyn Clock>,
    /// Immutable service configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates application state from its collaborators.
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, config: Arc<Config>) -> Self {
        Self { store, clock, config }
    }
}

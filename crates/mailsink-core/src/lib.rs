//! Core domain for the mailsink email event sink.
//!
//! Provides the normalized event model, payload normalization, the error
//! taxonomy, the storage layer, and the clock abstraction. The HTTP crate
//! depends on these foundational types; it contains no SQL of its own.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod normalize;
pub mod storage;
pub mod time;

pub use error::{CoreError, MailsinkError, Result};
pub use models::{EmailEvent, EventId, EventType, NewEmailEvent, OpenOutcome};
pub use normalize::normalize;
pub use storage::{EventStore, Storage};
pub use time::{Clock, RealClock, TestClock};

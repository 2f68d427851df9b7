//! Core domain models and strongly-typed identifiers.
//!
//! Defines the normalized email event record, the provider event type
//! vocabulary, and newtype ID wrappers for compile-time type safety.
//! Includes database serialization traits for the sqlx/Postgres layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Strongly-typed email event identifier.
///
/// Wraps a UUID to prevent mixing with other ID types. Assigned at ingest
/// time; the provider's own `email_id` is a separate correlation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for EventId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for EventId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for EventId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Email lifecycle event types from the delivery provider.
///
/// The known vocabulary covers the provider's documented lifecycle. Any
/// other value is accepted generically via `Other` and round-trips through
/// storage unchanged; unknown types are never an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Message accepted by the provider.
    Sent,
    /// Message accepted by the recipient's server.
    Delivered,
    /// Delivery temporarily deferred by the recipient's server.
    DeliveryDelayed,
    /// Recipient marked the message as spam.
    Complained,
    /// Recipient's server rejected the message.
    Bounced,
    /// Recipient clicked a link in the message.
    Clicked,
    /// Recipient opened the message. The only type with an update path:
    /// repeated opens are aggregated into a single stored record.
    Opened,
    /// Any event type outside the known vocabulary.
    Other(String),
}

impl EventType {
    /// The wire representation of this event type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sent => "email.sent",
            Self::Delivered => "email.delivered",
            Self::DeliveryDelayed => "email.delivery_delayed",
            Self::Complained => "email.complained",
            Self::Bounced => "email.bounced",
            Self::Clicked => "email.clicked",
            Self::Opened => "email.opened",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "email.sent" => Self::Sent,
            "email.delivered" => Self::Delivered,
            "email.delivery_delayed" => Self::DeliveryDelayed,
            "email.complained" => Self::Complained,
            "email.bounced" => Self::Bounced,
            "email.clicked" => Self::Clicked,
            "email.opened" => Self::Opened,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

impl sqlx::Type<PgDb> for EventType {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for EventType {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self::from(s))
    }
}

/// A normalized email event ready for persistence.
///
/// Built by the normalization layer from an inbound webhook payload.
/// Carries no identity: the storage layer assigns the `EventId` on insert.
/// All provider-supplied fields are extracted leniently; absence of any
/// individual field stores NULL rather than failing the request.
#[derive(Debug, Clone)]
pub struct NewEmailEvent {
    /// Provider event type; unknown values pass through as `Other`.
    pub event_type: EventType,

    /// Provider-supplied timestamp string, stored unvalidated.
    pub created_at: Option<String>,

    /// Provider's email identifier; the aggregation correlation key.
    pub email_id: Option<String>,

    /// Sender address.
    pub from_email: Option<String>,

    /// First recipient from the provider's `to` list.
    pub to_email: Option<String>,

    /// Message subject.
    pub subject: Option<String>,

    /// Opaque provider tags, defaulting to an empty list.
    pub tags: serde_json::Value,

    /// Complete inbound payload, retained for audit and debugging.
    pub raw_payload: serde_json::Value,

    /// Ingest-time timestamp (clock time, not provider time).
    pub processed_at: DateTime<Utc>,

    /// Bounce classification (`email.bounced` only).
    pub bounce_type: Option<String>,
    /// Bounce sub-classification.
    pub bounce_subtype: Option<String>,
    /// Human-readable bounce diagnostic.
    pub bounce_message: Option<String>,

    /// Click source address (`email.clicked` only).
    pub click_ip: Option<String>,
    /// Clicked link target.
    pub click_link: Option<String>,
    /// Clicking client's user agent.
    pub click_user_agent: Option<String>,
    /// Provider click timestamp.
    pub click_timestamp: Option<String>,

    /// Open counter seed (`email.opened` only); always 1 for a new event.
    pub opened_count: Option<i32>,
    /// First open timestamp; immutable once stored.
    pub first_opened_at: Option<String>,
    /// Most recent open timestamp.
    pub last_opened_at: Option<String>,
    /// Opening device details, passed through opaquely.
    pub device_info: Option<serde_json::Value>,
    /// Opening location details, passed through opaquely.
    pub location_info: Option<serde_json::Value>,
}

/// A persisted email event row.
///
/// For a given `(email_id, email.opened)` pair at most one row exists;
/// all other event types are immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmailEvent {
    /// Unique identifier assigned at ingest.
    pub id: EventId,

    /// Provider event type.
    pub event_type: EventType,

    /// Provider-supplied timestamp string.
    pub created_at: Option<String>,

    /// Provider's email identifier.
    pub email_id: Option<String>,

    /// Sender address.
    pub from_email: Option<String>,

    /// First recipient.
    pub to_email: Option<String>,

    /// Message subject.
    pub subject: Option<String>,

    /// Opaque provider tags.
    pub tags: Json<serde_json::Value>,

    /// Complete inbound payload.
    pub raw_payload: Json<serde_json::Value>,

    /// When this record was processed (most recent processing for
    /// aggregated opens).
    pub processed_at: DateTime<Utc>,

    /// Bounce classification.
    pub bounce_type: Option<String>,
    /// Bounce sub-classification.
    pub bounce_subtype: Option<String>,
    /// Bounce diagnostic.
    pub bounce_message: Option<String>,

    /// Click source address.
    pub click_ip: Option<String>,
    /// Clicked link target.
    pub click_link: Option<String>,
    /// Clicking client's user agent.
    pub click_user_agent: Option<String>,
    /// Provider click timestamp.
    pub click_timestamp: Option<String>,

    /// Aggregated open count; monotonically non-decreasing.
    pub opened_count: Option<i32>,
    /// First open timestamp; never changes after the first open.
    pub first_opened_at: Option<String>,
    /// Timestamp of the most recent open.
    pub last_opened_at: Option<String>,
    /// Opening device details from the latest open.
    pub device_info: Option<Json<serde_json::Value>>,
    /// Opening location details from the latest open.
    pub location_info: Option<Json<serde_json::Value>>,
}

/// Result of recording an opened event.
#[derive(Debug, Clone)]
pub struct OpenOutcome {
    /// The stored row after the operation.
    pub event: EmailEvent,
    /// True when an existing open record was aggregated into, false when
    /// this was the first open for the email.
    pub updated: bool,
}

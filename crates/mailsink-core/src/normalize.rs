//! Payload normalization for inbound provider webhooks.
//!
//! Maps the provider's `{type, created_at, data: {...}}` shape into the
//! normalized record persisted per event. Extraction is best-effort: every
//! field except the event type may be absent, and unknown event types
//! produce a record with only the common fields.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    error::MailsinkError,
    models::{EventType, NewEmailEvent},
};

/// Normalizes an inbound webhook payload into a persistable event.
///
/// `processed_at` is the ingest-time clock reading, distinct from the
/// provider's own `created_at`.
///
/// # Errors
///
/// Returns `MailsinkError::MissingEventType` when the payload has no
/// string `type` field. This is the only rejection; absence of `data` or
/// any individual field within it stores NULL instead of failing.
pub fn normalize(
    payload: &Value,
    processed_at: DateTime<Utc>,
) -> Result<NewEmailEvent, MailsinkError> {
    let event_type = payload
        .get("type")
        .and_then(Value::as_str)
        .map(EventType::from)
        .ok_or(MailsinkError::MissingEventType)?;

    let created_at = payload.get("created_at").and_then(Value::as_str).map(String::from);

    static EMPTY: Value = Value::Null;
    let data = payload.get("data").filter(|d| d.is_object()).unwrap_or(&EMPTY);

    let mut event = NewEmailEvent {
        event_type: event_type.clone(),
        created_at: created_at.clone(),
        email_id: string_field(data, "email_id"),
        from_email: string_field(data, "from"),
        to_email: first_recipient(data),
        subject: string_field(data, "subject"),
        tags: data.get("tags").cloned().unwrap_or_else(|| Value::Array(Vec::new())),
        raw_payload: payload.clone(),
        processed_at,
        bounce_type: None,
        bounce_subtype: None,
        bounce_message: None,
        click_ip: None,
        click_link: None,
        click_user_agent: None,
        click_timestamp: None,
        opened_count: None,
        first_opened_at: None,
        last_opened_at: None,
        device_info: None,
        location_info: None,
    };

    match event_type {
        EventType::Bounced => {
            let bounce = data.get("bounce").cloned().unwrap_or(Value::Null);
            event.bounce_type = string_field(&bounce, "type");
            event.bounce_subtype = string_field(&bounce, "subType");
            event.bounce_message = string_field(&bounce, "message");
        },
        EventType::Clicked => {
            let click = data.get("click").cloned().unwrap_or(Value::Null);
            event.click_ip = string_field(&click, "ipAddress");
            event.click_link = string_field(&click, "link");
            event.click_user_agent = string_field(&click, "userAgent");
            event.click_timestamp = string_field(&click, "timestamp");
        },
        EventType::Opened => {
            // Seed values for a first open; the storage layer aggregates
            // these into an existing row when one exists.
            event.opened_count = Some(1);
            event.first_opened_at = created_at.clone();
            event.last_opened_at = created_at;
            event.device_info = data.get("device_info").cloned();
            event.location_info = data.get("location_info").cloned();
        },
        _ => {},
    }

    Ok(event)
}

/// Extracts a string field from a JSON object, NULL on absence or
/// non-string values.
fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

/// First element of the provider's `to` recipient list, if any.
fn first_recipient(data: &Value) -> Option<String> {
    data.get("to")
        .and_then(Value::as_array)
        .and_then(|to| to.first())
        .and_then(Value::as_str)
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        "2024-03-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn missing_type_is_rejected() {
        let payload = json!({ "created_at": "2024-03-01T10:00:00Z", "data": {} });

        let err = normalize(&payload, now()).unwrap_err();
        assert!(matches!(err, MailsinkError::MissingEventType));
    }

    #[test]
    fn non_string_type_is_rejected() {
        let payload = json!({ "type": 42, "data": {} });

        assert!(normalize(&payload, now()).is_err());
    }

    #[test]
    fn common_fields_extracted() {
        let payload = json!({
            "type": "email.delivered",
            "created_at": "2024-03-01T10:00:00Z",
            "data": {
                "email_id": "em_123",
                "from": "sender@example.com",
                "to": ["a@x.com", "b@x.com"],
                "subject": "Hello",
                "tags": [{"name": "campaign", "value": "spring"}]
            }
        });

        let event = normalize(&payload, now()).unwrap();
        assert_eq!(event.event_type, EventType::Delivered);
        assert_eq!(event.created_at.as_deref(), Some("2024-03-01T10:00:00Z"));
        assert_eq!(event.email_id.as_deref(), Some("em_123"));
        assert_eq!(event.from_email.as_deref(), Some("sender@example.com"));
        assert_eq!(event.to_email.as_deref(), Some("a@x.com"));
        assert_eq!(event.subject.as_deref(), Some("Hello"));
        assert_eq!(event.tags, json!([{"name": "campaign", "value": "spring"}]));
        assert_eq!(event.raw_payload, payload);
        assert_eq!(event.processed_at, now());
    }

    #[test]
    fn absent_data_stores_nulls() {
        let payload = json!({ "type": "email.sent" });

        let event = normalize(&payload, now()).unwrap();
        assert_eq!(event.email_id, None);
        assert_eq!(event.from_email, None);
        assert_eq!(event.to_email, None);
        assert_eq!(event.subject, None);
        assert_eq!(event.tags, json!([]));
    }

    #[test]
    fn empty_recipient_list_stores_null() {
        let payload = json!({ "type": "email.sent", "data": { "to": [] } });

        let event = normalize(&payload, now()).unwrap();
        assert_eq!(event.to_email, None);
    }

    #[test]
    fn bounce_fields_extracted() {
        let payload = json!({
            "type": "email.bounced",
            "created_at": "2024-03-01T10:00:00Z",
            "data": {
                "email_id": "em_b",
                "bounce": {
                    "type": "Permanent",
                    "subType": "General",
                    "message": "mailbox does not exist"
                }
            }
        });

        let event = normalize(&payload, now()).unwrap();
        assert_eq!(event.bounce_type.as_deref(), Some("Permanent"));
        assert_eq!(event.bounce_subtype.as_deref(), Some("General"));
        assert_eq!(event.bounce_message.as_deref(), Some("mailbox does not exist"));
        // No opened-specific fields on a bounce.
        assert_eq!(event.opened_count, None);
        assert_eq!(event.first_opened_at, None);
        assert_eq!(event.last_opened_at, None);
    }

    #[test]
    fn click_fields_extracted() {
        let payload = json!({
            "type": "email.clicked",
            "data": {
                "email_id": "em_c",
                "click": {
                    "ipAddress": "203.0.113.7",
                    "link": "https://example.com/offer",
                    "userAgent": "Mozilla/5.0",
                    "timestamp": "2024-03-01T10:05:00Z"
                }
            }
        });

        let event = normalize(&payload, now()).unwrap();
        assert_eq!(event.click_ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(event.click_link.as_deref(), Some("https://example.com/offer"));
        assert_eq!(event.click_user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(event.click_timestamp.as_deref(), Some("2024-03-01T10:05:00Z"));
    }

    #[test]
    fn opened_event_seeds_aggregation_fields() {
        let payload = json!({
            "type": "email.opened",
            "created_at": "T1",
            "data": {
                "email_id": "E1",
                "device_info": { "client": "gmail" },
                "location_info": { "country": "DE" }
            }
        });

        let event = normalize(&payload, now()).unwrap();
        assert_eq!(event.opened_count, Some(1));
        assert_eq!(event.first_opened_at.as_deref(), Some("T1"));
        assert_eq!(event.last_opened_at.as_deref(), Some("T1"));
        assert_eq!(event.device_info, Some(json!({ "client": "gmail" })));
        assert_eq!(event.location_info, Some(json!({ "country": "DE" })));
    }

    #[test]
    fn opened_without_created_at_has_no_open_timestamps() {
        let payload = json!({ "type": "email.opened", "data": { "email_id": "E1" } });

        let event = normalize(&payload, now()).unwrap();
        assert_eq!(event.opened_count, Some(1));
        assert_eq!(event.first_opened_at, None);
        assert_eq!(event.last_opened_at, None);
    }

    #[test]
    fn unknown_event_type_keeps_common_fields_only() {
        let payload = json!({
            "type": "email.scheduled",
            "created_at": "2024-03-01T10:00:00Z",
            "data": { "email_id": "em_u", "subject": "Later" }
        });

        let event = normalize(&payload, now()).unwrap();
        assert_eq!(event.event_type, EventType::Other("email.scheduled".to_string()));
        assert_eq!(event.email_id.as_deref(), Some("em_u"));
        assert_eq!(event.subject.as_deref(), Some("Later"));
        assert_eq!(event.bounce_type, None);
        assert_eq!(event.click_link, None);
        assert_eq!(event.opened_count, None);
    }
}

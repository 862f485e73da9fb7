use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Inline-button payload grammar.
pub mod callback;
/// Health endpoint payload.
pub mod health;
/// Chat platform bot API payloads.
pub mod telegram;
/// Draft field rules.
pub mod validation;

/// RFC 3339 timestamp shown on the authoring form.
pub fn display_timestamp(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod health;
pub mod host;
pub mod phase;
pub mod setup;
pub mod snapshot;
pub mod sse;
pub mod validation;

/// Render a millisecond Unix timestamp as RFC 3339.
fn format_ms(timestamp_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * 1_000_000)
        .ok()
        .and_then(|time| time.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}

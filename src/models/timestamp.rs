//! The two timestamp sources: the server's own clock, and times supplied by
//! the caller in the request payload.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Server-side time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Error)]
#[error("invalid timestamp: {0}")]
pub struct TimestampError(String);

/// A time supplied by the caller: RFC 3339 text or epoch milliseconds.
///
/// Unvalidated until [`CallerTimestamp::resolve`] succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CallerTimestamp {
    Millis(i64),
    Text(String),
}

impl CallerTimestamp {
    pub fn resolve(&self) -> Result<DateTime<Utc>, TimestampError> {
        match self {
            CallerTimestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms)
                .ok_or_else(|| TimestampError(format!("{} ms is out of range", ms))),
            CallerTimestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| TimestampError(format!("'{}': {}", text, e))),
        }
    }
}

impl From<DateTime<Utc>> for CallerTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        CallerTimestamp::Text(dt.to_rfc3339())
    }
}

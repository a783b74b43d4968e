//! Clock abstraction and reference-timezone helpers.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::types::Timestamp;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeError {
    #[error("local time {local} does not exist in {timezone}")]
    NonexistentLocalTime { local: NaiveDateTime, timezone: String },

    #[error("unrecognised timestamp: {0}")]
    Unparseable(String),
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock reporting instants in the reference timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        normalize(Utc::now().fixed_offset(), self.timezone)
    }
}

/// Manually driven clock (for testing).
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<Timestamp>,
}

impl FixedClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Express `ts` in the reference zone. The instant itself is unchanged.
pub fn normalize(ts: Timestamp, timezone: Tz) -> Timestamp {
    ts.with_timezone(&timezone).fixed_offset()
}

/// Interpret a naive timestamp as wall-clock time in the reference zone.
///
/// Ambiguous times (DST fold) resolve to the earlier instant.
pub fn localize_naive(naive: NaiveDateTime, timezone: Tz) -> Result<Timestamp, TimeError> {
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| TimeError::NonexistentLocalTime {
            local: naive,
            timezone: timezone.name().to_string(),
        })
}

/// Parse an RFC 3339 timestamp, or a naive `YYYY-MM-DD HH:MM:SS` one
/// (either separator) taken to be in the reference zone.
pub fn parse_timestamp(input: &str, timezone: Tz) -> Result<Timestamp, TimeError> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(normalize(ts, timezone));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return localize_naive(naive, timezone);
        }
    }
    Err(TimeError::Unparseable(input.to_string()))
}

//! Millisecond-precision timestamps.
//!
//! The wire format carries Unix milliseconds as signed 64-bit integers, so
//! [`Timestamp`] serializes as a plain number rather than an RFC 3339 string.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A UTC instant with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Build from Unix milliseconds.
    ///
    /// Returns `None` if the value is outside chrono's representable range.
    #[must_use]
    pub fn from_unix_ms(ms: i64) -> Option<Self> {
        match Utc.timestamp_millis_opt(ms) {
            chrono::LocalResult::Single(dt) => Some(Self(dt)),
            _ => None,
        }
    }

    /// The instant as Unix milliseconds.
    #[must_use]
    pub fn unix_ms(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// The underlying chrono value.
    #[must_use]
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Whether this instant lies strictly in the past.
    #[must_use]
    pub fn is_past(&self) -> bool {
        self.0 < Utc::now()
    }

    /// Whether this instant lies strictly in the future.
    #[must_use]
    pub fn is_future(&self) -> bool {
        self.0 > Utc::now()
    }

    /// This instant shifted by `ms` milliseconds, saturating at the
    /// representable range.
    #[must_use]
    pub fn saturating_add_ms(&self, ms: i64) -> Self {
        Self::from_unix_ms(self.unix_ms().saturating_add(ms)).unwrap_or(*self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.unix_ms())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let ms = i64::deserialize(deserializer)?;
        Self::from_unix_ms(ms)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}")))
    }
}

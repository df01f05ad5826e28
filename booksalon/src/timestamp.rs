//! Canonical instant type for every timestamp field.
//!
//! Documents written by older clients carry timestamps in several shapes: the
//! store-native `{seconds, nanoseconds}` object (sometimes with leading
//! underscores), epoch milliseconds, or an RFC 3339 string. All of them are
//! normalized here so domain code only sees a UTC instant. Writes always use
//! epoch milliseconds, which keeps range filters and ordering numeric.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        Self(value)
    }

    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_millis(millis).map(Self)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// JSON value used when the timestamp is written into a document.
    pub fn to_value(&self) -> Value {
        Value::from(self.millis())
    }

    /// Whole days elapsed from `self` until `now`; zero when `self` is in the future.
    pub fn days_until(&self, now: Timestamp) -> i64 {
        (now.0 - self.0).num_days().max(0)
    }

    pub fn plus(&self, duration: Duration) -> Self {
        Self(self.0 + duration)
    }

    /// Midnight at the start of `date` in the given fixed offset.
    pub fn start_of_day(date: NaiveDate, offset: FixedOffset) -> Option<Self> {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        offset
            .from_local_datetime(&midnight)
            .single()
            .map(|local| Self(local.with_timezone(&Utc)))
    }

    /// Normalizes any supported encoding into a timestamp.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => {
                if let Some(millis) = number.as_i64() {
                    Self::from_millis(millis)
                } else {
                    number.as_f64().and_then(|millis| Self::from_millis(millis as i64))
                }
            }
            Value::String(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|parsed| Self(parsed.with_timezone(&Utc))),
            Value::Object(map) => {
                let seconds = map.get("seconds").or_else(|| map.get("_seconds"))?.as_i64()?;
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("_nanoseconds"))
                    .or_else(|| map.get("nanos"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                DateTime::<Utc>::from_timestamp(seconds, u32::try_from(nanos).ok()?).map(Self)
            }
            _ => None,
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.millis())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Self::from_value(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unsupported timestamp encoding: {raw}")))
    }
}

use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Deref;

/// Absolute point in time with second precision.
///
/// Serializes as integer unix-epoch seconds, which is how the providers report
/// expiry horizons once they are made absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub DateTime<Utc>);

impl Time {
    /// Create a new Time from a DateTime
    pub fn new(dt: DateTime<Utc>) -> Self {
        Time(dt)
    }

    /// Current wall-clock time, truncated to whole seconds
    pub fn now() -> Self {
        Time::from_unix(Utc::now().timestamp())
    }

    /// Create a Time from a unix timestamp in seconds.
    /// Out-of-range values clamp to the nearest representable instant.
    pub fn from_unix(unix: i64) -> Self {
        match Utc.timestamp_opt(unix, 0).single() {
            Some(dt) => Time(dt),
            None if unix < 0 => Time(DateTime::<Utc>::MIN_UTC),
            None => Time(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Get the unix timestamp in seconds
    pub fn unix(&self) -> i64 {
        self.0.timestamp()
    }

    /// The instant `seconds` after this one
    pub fn plus_seconds(&self, seconds: i64) -> Self {
        Time::from_unix(self.unix().saturating_add(seconds))
    }
}

impl Deref for Time {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(dt: DateTime<Utc>) -> Self {
        Time(dt)
    }
}

impl From<Time> for DateTime<Utc> {
    fn from(t: Time) -> Self {
        t.0
    }
}

impl Serialize for Time {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.unix())
    }
}

impl<'de> Deserialize<'de> for Time {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Stored tokens may carry fractional or stringified timestamps.
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Time::from_unix)
                .ok_or_else(|| de::Error::custom("timestamp out of range")),
            serde_json::Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(|f| Time::from_unix(f as i64))
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "expected unix timestamp, got {}",
                other
            ))),
        }
    }
}

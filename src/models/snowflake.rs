//! Snowflake identifiers.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Milliseconds between the Unix epoch and 2015-01-01T00:00:00Z.
const PLATFORM_EPOCH_MS: u64 = 1_420_070_400_000;

/// A 64-bit, time-sortable unique identifier.
///
/// The gateway sends ids as JSON strings, but plain numbers are accepted too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Check whether this is the zero id (never assigned by the platform).
    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Unix timestamp in milliseconds encoded in the upper 42 bits.
    pub fn timestamp(self) -> u64 {
        (self.0 >> 22) + PLATFORM_EPOCH_MS
    }

    /// Creation time of the entity this id was assigned to.
    pub fn created_at(self) -> DateTime<Utc> {
        let ms = i64::try_from(self.timestamp()).unwrap_or(i64::MAX);
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct SnowflakeVisitor;

impl<'de> Visitor<'de> for SnowflakeVisitor {
    type Value = Snowflake;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a snowflake as a string or unsigned integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Snowflake, E> {
        Ok(Snowflake(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Snowflake, E> {
        u64::try_from(v)
            .map(Snowflake)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Snowflake, E> {
        v.parse::<u64>()
            .map(Snowflake)
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_string_and_number() {
        let a: Snowflake = serde_json::from_str("\"175928847299117063\"").unwrap();
        let b: Snowflake = serde_json::from_str("175928847299117063").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0, 175928847299117063);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(serde_json::from_str::<Snowflake>("\"abc\"").is_err());
        assert!(serde_json::from_str::<Snowflake>("-4").is_err());
        assert!(serde_json::from_str::<Snowflake>("null").is_err());
    }

    #[test]
    fn test_serialize_as_string() {
        assert_eq!(serde_json::to_string(&Snowflake(42)).unwrap(), "\"42\"");
    }

    #[test]
    fn test_timestamp() {
        let id = Snowflake(175928847299117063);
        assert_eq!(id.timestamp(), 1462015105796);
        assert_eq!(id.created_at().timestamp_millis(), 1462015105796);
    }
}

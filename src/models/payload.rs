//! Targeted payload extraction and field-level merge helpers.
//!
//! Nothing here decodes a whole gateway object. Callers pick the fields they
//! need and serde skips the rest.

use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use super::Snowflake;
use crate::cache::Flags;

/// Just the `id` of an object.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Ident {
    pub id: Snowflake,
}

/// Deserialize a nullable field so that "absent" and "null" stay distinct.
///
/// Use together with `#[serde(default)]`: an absent key gives `None`, an
/// explicit `null` gives `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Overwrite `dst` when the payload carried the field.
///
/// With [`Flags::IGNORE_EMPTY_PARAMS`] a zero value is treated like an absent
/// field and leaves `dst` alone.
#[inline]
pub fn merge<T>(dst: &mut T, src: Option<T>, flags: Flags)
where
    T: Default + PartialEq,
{
    if let Some(value) = src {
        if flags.contains(Flags::IGNORE_EMPTY_PARAMS) && value == T::default() {
            return;
        }
        *dst = value;
    }
}

struct FieldCounter;

impl<'de> Visitor<'de> for FieldCounter {
    type Value = usize;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<usize, A::Error> {
        let mut count = 0;
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

/// Count the top-level keys of a raw JSON object without building values.
pub fn field_count(raw: &RawValue) -> Result<usize, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(raw.get());
    de::Deserializer::deserialize_map(&mut de, FieldCounter)
}

/// An embedded object that carries nothing but its id.
pub fn is_reference(raw: &RawValue) -> Result<bool, serde_json::Error> {
    Ok(field_count(raw)? == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        topic: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_absent_and_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"topic":null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"topic":"t"}"#).unwrap();

        assert_eq!(absent.topic, None);
        assert_eq!(null.topic, Some(None));
        assert_eq!(set.topic, Some(Some("t".to_string())));
    }

    #[test]
    fn test_merge_respects_ignore_empty() {
        let mut name = "old".to_string();
        merge(&mut name, Some(String::new()), Flags::IGNORE_EMPTY_PARAMS);
        assert_eq!(name, "old");

        merge(&mut name, Some(String::new()), Flags::empty());
        assert_eq!(name, "");

        merge(&mut name, None, Flags::empty());
        assert_eq!(name, "");
    }

    #[test]
    fn test_field_count() {
        let raw: Box<RawValue> = serde_json::from_str(r#"{"id":"1"}"#).unwrap();
        assert!(is_reference(&raw).unwrap());

        let raw: Box<RawValue> =
            serde_json::from_str(r#"{"id":"1","username":"a","nested":{"x":[1,2]}}"#).unwrap();
        assert_eq!(field_count(&raw).unwrap(), 3);

        let raw: Box<RawValue> = serde_json::from_str("[1]").unwrap();
        assert!(field_count(&raw).is_err());
    }
}

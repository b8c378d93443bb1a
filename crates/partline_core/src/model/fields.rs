//! Serde helpers for loosely typed table cells.
//!
//! Design-tool exports leave numeric and flag cells blank, so blank cells map
//! to the type's zero value instead of failing the whole row.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

const TRUE_FLAGS: &[&str] = &["x", "y", "yes", "true", "1", "checked"];

pub(crate) fn deserialize_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<u32>()
        .map_err(|err| D::Error::custom(format!("invalid quantity `{trimmed}`: {err}")))
}

pub(crate) fn deserialize_priority<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<i32>()
        .map_err(|err| D::Error::custom(format!("invalid priority `{trimmed}`: {err}")))
}

pub(crate) fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(parse_flag(&raw))
}

pub(crate) fn serialize_flag<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(if *value { "x" } else { "" })
}

pub(crate) fn parse_flag(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    TRUE_FLAGS.contains(&normalized.as_str())
}

//! Task identifiers.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// A unique identifier for a pipeline task.
///
/// Rendered as a 32-character lowercase hex string (no hyphens) to match
/// clients that already treat task IDs as opaque hex tokens. JSON
/// serialization goes through the same simple-hex form rather than
/// `Uuid`'s own hyphenated `Serialize` impl, so the wire format matches
/// `Display`/`FromStr` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new, process-wide-unique task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid task id: {0}")]
pub struct ParseTaskIdError(String);

impl std::str::FromStr for TaskId {
    type Err = ParseTaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ParseTaskIdError(s.to_string()))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.simple().to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_as_32_char_hex() {
        let id = TaskId::new();
        let rendered = id.to_string();
        assert_eq!(rendered.len(), 32);
        assert!(rendered.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = TaskId::new();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn two_ids_are_distinct() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn json_serializes_to_simple_hex_not_hyphenated() {
        let id = TaskId::new();
        let value = serde_json::to_value(id).unwrap();
        let rendered = value.as_str().unwrap();
        assert_eq!(rendered, id.to_string());
        assert!(!rendered.contains('-'));
    }

    #[test]
    fn json_round_trips() {
        let id = TaskId::new();
        let value = serde_json::to_value(id).unwrap();
        let restored: TaskId = serde_json::from_value(value).unwrap();
        assert_eq!(id, restored);
    }
}

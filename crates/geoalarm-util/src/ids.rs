//! Strongly-typed identifiers for geoalarm

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a zone.
///
/// Freshly created zones get a UUID v4. Ids read back from storage are kept
/// verbatim, so records written by older releases with other id schemes
/// stay addressable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a new unique id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ZoneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_id_equality() {
        let id1 = ZoneId::new("office");
        let id2 = ZoneId::new("office");
        let id3 = ZoneId::new("station");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ZoneId::generate();
        let b = ZoneId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn zone_id_serializes_as_plain_string() {
        let id = ZoneId::new("1700000000000");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1700000000000\"");

        let parsed: ZoneId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}

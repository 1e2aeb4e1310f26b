//! Versioned zone collection document

use geoalarm_api::Zone;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{StoreError, StoreResult};

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Schema version assigned to unversioned (bare array) documents
pub const LEGACY_SCHEMA_VERSION: u32 = 0;

/// The whole zone collection as persisted under a single key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub zones: Vec<Zone>,
}

impl ZoneDocument {
    pub fn new(zones: Vec<Zone>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            zones,
        }
    }

    pub fn encode(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stored document.
    ///
    /// Bare arrays predate versioning and are read as
    /// [`LEGACY_SCHEMA_VERSION`]. Documents from a newer schema are refused
    /// instead of being misread.
    pub fn decode(json: &str) -> StoreResult<Self> {
        let value: Value = serde_json::from_str(json)?;

        if value.is_array() {
            let zones: Vec<Zone> = serde_json::from_value(value)?;
            return Ok(Self {
                schema_version: LEGACY_SCHEMA_VERSION,
                zones,
            });
        }

        let found = value
            .get("schema_version")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::Serialization("missing schema_version".into()))?;
        let found = u32::try_from(found)
            .map_err(|_| StoreError::Serialization(format!("bad schema_version {}", found)))?;

        if found > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }

        Ok(serde_json::from_value(value)?)
    }
}

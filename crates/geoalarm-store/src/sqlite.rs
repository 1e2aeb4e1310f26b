//! SQLite-based store implementation

use chrono::{DateTime, Local};
use geoalarm_api::Zone;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{AuditEvent, StoreError, StoreResult, ZoneDocument, ZoneStore};

/// Key the zone collection lives under
pub const ZONES_KEY: &str = "zones";

/// How long a write waits for another process holding the database lock
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Key-value documents
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl ZoneStore for SqliteStore {
    fn load_zones(&self) -> StoreResult<Vec<Zone>> {
        read_zones(&*self.conn()?)
    }

    fn save_zones(&self, zones: &[Zone]) -> StoreResult<()> {
        write_zones(&*self.conn()?, zones)
    }

    fn update_zones(
        &self,
        f: &mut dyn FnMut(&mut Vec<Zone>) -> geoalarm_util::Result<bool>,
    ) -> geoalarm_util::Result<bool> {
        let mut conn = self.conn()?;

        // IMMEDIATE takes the write lock up front, so a concurrent writer
        // waits instead of saving over what we are about to read.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        let mut zones = read_zones(&tx)?;
        if !f(&mut zones)? {
            // Dropping the transaction rolls it back
            return Ok(false);
        }

        write_zones(&tx, &zones)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(true)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| geoalarm_util::now());
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

fn read_zones(conn: &Connection) -> StoreResult<Vec<Zone>> {
    let json: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?", [ZONES_KEY], |row| {
            row.get(0)
        })
        .optional()?;

    let Some(json) = json else {
        return Ok(Vec::new());
    };

    let document = ZoneDocument::decode(&json)?;
    if document.schema_version < crate::CURRENT_SCHEMA_VERSION {
        info!(
            from = document.schema_version,
            to = crate::CURRENT_SCHEMA_VERSION,
            "Zone document will be upgraded on next save"
        );
    }

    Ok(document.zones)
}

fn write_zones(conn: &Connection, zones: &[Zone]) -> StoreResult<()> {
    let json = ZoneDocument::new(zones.to_vec()).encode()?;

    conn.execute(
        r#"
        INSERT INTO kv (key, value, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(key)
        DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        params![ZONES_KEY, json, geoalarm_util::now().to_rfc3339()],
    )?;

    debug!(zone_count = zones.len(), "Zones saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditEventType;
    use geoalarm_api::{Coordinate, TriggerPolicy};
    use geoalarm_util::{GeoalarmError, ZoneId};
    use std::sync::Arc;

    fn office() -> Zone {
        Zone::new("Office", Coordinate::new(28.6139, 77.2090), 500.0).unwrap()
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
        assert!(store.load_zones().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_preserves_order() {
        let store = SqliteStore::in_memory().unwrap();
        let a = office();
        let b = Zone::new("Station", Coordinate::new(28.643, 77.2195), 200.0).unwrap();

        store.save_zones(&[a.clone(), b.clone()]).unwrap();

        let loaded = store.load_zones().unwrap();
        assert_eq!(loaded, vec![a, b]);
    }

    #[test]
    fn test_save_replaces_whole_collection() {
        let store = SqliteStore::in_memory().unwrap();
        let mut zone = office();
        store.save_zones(&[zone.clone(), office()]).unwrap();

        zone.mark_triggered(TriggerPolicy::KeepActive);
        store.save_zones(&[zone.clone()]).unwrap();

        let loaded = store.load_zones().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].triggered);
    }

    #[test]
    fn test_newer_schema_is_not_misread() {
        let store = SqliteStore::in_memory().unwrap();
        {
            let conn = store.conn().unwrap();
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)",
                params![ZONES_KEY, r#"{"schema_version":2,"zones":[]}"#, "now"],
            )
            .unwrap();
        }

        assert!(matches!(
            store.load_zones(),
            Err(StoreError::UnsupportedSchema { found: 2, .. })
        ));
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::ZoneStopped {
                zone_id: ZoneId::new("a"),
            }))
            .unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].event, AuditEventType::ZoneStopped { .. }));
        assert!(matches!(events[1].event, AuditEventType::ServiceStarted));

        assert_eq!(store.get_recent_audits(1).unwrap().len(), 1);
    }

    #[test]
    fn test_update_commits_or_discards() {
        let store = SqliteStore::in_memory().unwrap();
        store.save_zones(&[office()]).unwrap();

        let wrote = store
            .update_zones(&mut |zones| {
                zones[0].rename("Work")?;
                Ok(true)
            })
            .unwrap();
        assert!(wrote);
        assert_eq!(store.load_zones().unwrap()[0].name, "Work");

        // Declined edit is not written
        let wrote = store
            .update_zones(&mut |zones| {
                zones.clear();
                Ok(false)
            })
            .unwrap();
        assert!(!wrote);
        assert_eq!(store.load_zones().unwrap().len(), 1);

        // Failed edit is rolled back
        let result = store.update_zones(&mut |zones| {
            zones.clear();
            Err(GeoalarmError::invalid("nope"))
        });
        assert!(matches!(result, Err(GeoalarmError::InvalidInput(_))));
        assert_eq!(store.load_zones().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_updates_from_two_handles_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geoalarm.db");
        let first = Arc::new(SqliteStore::open(&path).unwrap());
        let second = Arc::new(SqliteStore::open(&path).unwrap());

        let writers: Vec<_> = [first.clone(), second]
            .into_iter()
            .enumerate()
            .map(|(n, store)| {
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .update_zones(&mut |zones| {
                                let name = format!("Zone {}-{}", n, i);
                                zones.push(
                                    Zone::new(name, Coordinate::new(10.0, 10.0), 100.0)
                                        .unwrap(),
                                );
                                Ok(true)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(first.load_zones().unwrap().len(), 50);
    }

    #[test]
    fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geoalarm.db");
        let zone = office();

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_zones(std::slice::from_ref(&zone)).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_zones().unwrap(), vec![zone]);
    }
}

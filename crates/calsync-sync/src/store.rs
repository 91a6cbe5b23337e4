//! SQLite table mapping (record, feed) to a remote event id.

use anyhow::{Context, Result};
use calsync_core::RusqliteErrorExt;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::record::RecordRef;

/// Column width for feed and event ids.
const MAX_ID_LEN: usize = 255;

/// One record's event within one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMapping {
    pub owner_type: String,
    pub owner_id: u64,
    pub feed_id: String,
    pub event_id: String,
}

impl EventMapping {
    pub fn owner(&self) -> RecordRef {
        RecordRef::new(self.owner_type.clone(), self.owner_id)
    }
}

fn db_err(err: rusqlite::Error) -> anyhow::Error {
    err.into_database_error().into()
}

fn owner_id_param(owner: &RecordRef) -> Result<i64> {
    i64::try_from(owner.owner_id)
        .with_context(|| format!("Record id of {} exceeds the storable range", owner))
}

fn check_len(field: &str, value: &str) -> Result<()> {
    if value.chars().count() > MAX_ID_LEN {
        anyhow::bail!("{} is longer than {} characters", field, MAX_ID_LEN);
    }
    Ok(())
}

/// Local record -> event mapping table.
///
/// Reads and writes are individually atomic. A caller doing get, then a
/// remote call, then set is not protected against a concurrent writer for
/// the same key; the last write wins.
pub struct EventMappingStore {
    conn: Connection,
}

impl EventMappingStore {
    /// Open (or create) the store at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .map_err(db_err)
            .with_context(|| format!("Failed to open mapping store at {}", path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store; nothing survives the process.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS calendar_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner_type TEXT NOT NULL,
                    owner_id INTEGER NOT NULL CHECK (owner_id >= 0),
                    feed_id TEXT NOT NULL,
                    event_id TEXT NOT NULL,
                    UNIQUE (owner_type, owner_id, feed_id)
                );

                CREATE INDEX IF NOT EXISTS idx_calendar_events_owner
                    ON calendar_events(owner_type, owner_id);
                "#,
            )
            .map_err(db_err)
            .context("Failed to initialize mapping schema")
    }

    /// Event id for `owner` in `feed_id`, if one was recorded.
    pub fn get_event_id(&self, owner: &RecordRef, feed_id: &str) -> Result<Option<String>> {
        let owner_id = owner_id_param(owner)?;
        self.conn
            .query_row(
                "SELECT event_id FROM calendar_events
                 WHERE owner_type = ?1 AND owner_id = ?2 AND feed_id = ?3",
                params![owner.owner_type, owner_id, feed_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
    }

    /// Record `event_id` for `owner` in `feed_id`, replacing any previous id.
    pub fn set_event_id(&self, owner: &RecordRef, feed_id: &str, event_id: &str) -> Result<()> {
        check_len("feed id", feed_id)?;
        check_len("event id", event_id)?;
        let owner_id = owner_id_param(owner)?;

        self.conn
            .execute(
                "INSERT INTO calendar_events (owner_type, owner_id, feed_id, event_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(owner_type, owner_id, feed_id) DO UPDATE SET
                    event_id = excluded.event_id",
                params![owner.owner_type, owner_id, feed_id, event_id],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Forget the mapping. Returns whether a row was removed; a missing row
    /// is not an error.
    pub fn delete_event_id(&self, owner: &RecordRef, feed_id: &str) -> Result<bool> {
        let owner_id = owner_id_param(owner)?;
        let removed = self
            .conn
            .execute(
                "DELETE FROM calendar_events
                 WHERE owner_type = ?1 AND owner_id = ?2 AND feed_id = ?3",
                params![owner.owner_type, owner_id, feed_id],
            )
            .map_err(db_err)?;
        Ok(removed > 0)
    }

    /// All mappings, ordered by owner then feed.
    pub fn list_mappings(&self) -> Result<Vec<EventMapping>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT owner_type, owner_id, feed_id, event_id FROM calendar_events
                 ORDER BY owner_type, owner_id, feed_id",
            )
            .map_err(db_err)?;

        let rows = stmt.query_map([], Self::row_to_mapping).map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(db_err)
            .context("Failed to read mappings")
    }

    /// Mappings for one record across every feed.
    pub fn mappings_for(&self, owner: &RecordRef) -> Result<Vec<EventMapping>> {
        let owner_id = owner_id_param(owner)?;
        let mut stmt = self
            .conn
            .prepare(
                "SELECT owner_type, owner_id, feed_id, event_id FROM calendar_events
                 WHERE owner_type = ?1 AND owner_id = ?2
                 ORDER BY feed_id",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![owner.owner_type, owner_id], Self::row_to_mapping)
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM calendar_events", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn row_to_mapping(row: &rusqlite::Row) -> rusqlite::Result<EventMapping> {
        let owner_id: i64 = row.get(1)?;
        let owner_id = u64::try_from(owner_id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Integer, Box::new(e)))?;

        Ok(EventMapping {
            owner_type: row.get(0)?,
            owner_id,
            feed_id: row.get(2)?,
            event_id: row.get(3)?,
        })
    }
}

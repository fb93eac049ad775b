//! SQLite implementation of the clipboard event ledger

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

use super::{format_timestamp, Action, ClipboardEvent, EventFilter, StoreError};

const SCHEMA_VERSION: u32 = 1;

const EVENT_COLUMNS: &str = "id, timestamp, hostname, action, content";

/// SQLite-backed event store
///
/// A single connection is shared behind an async mutex; every operation runs
/// inside its own transaction so concurrent requests never observe a
/// half-applied read-then-write sequence.
pub struct EventStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl EventStore {
    /// Open (and create if needed) the database at `path`
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        // Create directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL keeps readers from blocking the writer
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.initialize().await?;

        debug!("Opened event store at {}", path.display());
        Ok(store)
    }

    /// Open a throwaway in-memory store
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Location of the database file, if it lives on disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;

        let version = get_schema_version(&conn)?;
        if version == 0 {
            create_schema(&conn)?;
        }

        Ok(())
    }

    /// Run `f` as one unit of work
    ///
    /// The transaction commits only if `f` returns `Ok`; any error rolls
    /// back everything `f` did.
    pub async fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreTx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(StoreError::from)?;

        let value = f(&StoreTx { tx: &tx })?;

        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Record a new event and return its id
    pub async fn append(
        &self,
        hostname: &str,
        action: Action,
        content: &str,
    ) -> Result<i64, StoreError> {
        self.transaction(|tx| tx.append(hostname, action, content))
            .await
    }

    /// Fetch a single event by id
    pub async fn get(&self, id: i64) -> Result<Option<ClipboardEvent>, StoreError> {
        self.transaction(|tx| tx.get(id)).await
    }

    /// Events matching `filter`, newest first
    pub async fn query(&self, filter: EventFilter) -> Result<Vec<ClipboardEvent>, StoreError> {
        self.transaction(|tx| tx.query(filter)).await
    }

    /// Remove an event, returning whether a row existed
    pub async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.transaction(|tx| tx.delete(id)).await
    }

    /// Most recent copied or pasted value
    pub async fn latest_clipboard_value(&self) -> Result<Option<String>, StoreError> {
        self.transaction(|tx| tx.latest_of(&Action::CLIPBOARD_VALUES))
            .await
            .map(|event| event.map(|e| e.content))
    }
}

/// Operations available inside [`EventStore::transaction`]
pub struct StoreTx<'conn> {
    tx: &'conn Transaction<'conn>,
}

impl StoreTx<'_> {
    /// Insert an event stamped with the current time
    pub fn append(&self, hostname: &str, action: Action, content: &str) -> Result<i64, StoreError> {
        self.tx.execute(
            "INSERT INTO clipboard_events (timestamp, hostname, action, content)
             VALUES (?1, ?2, ?3, ?4)",
            params![format_timestamp(&Utc::now()), hostname, action, content],
        )?;

        Ok(self.tx.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<ClipboardEvent>, StoreError> {
        let event = self
            .tx
            .query_row(
                &format!("SELECT {} FROM clipboard_events WHERE id = ?1", EVENT_COLUMNS),
                params![id],
                row_to_event,
            )
            .optional()?;

        Ok(event)
    }

    pub fn query(&self, filter: EventFilter) -> Result<Vec<ClipboardEvent>, StoreError> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = filter.limit.map(i64::from).unwrap_or(-1);

        let mut stmt = self.tx.prepare(&format!(
            "SELECT {} FROM clipboard_events
             WHERE ?1 IS NULL OR action != ?1
             ORDER BY id DESC
             LIMIT ?2",
            EVENT_COLUMNS
        ))?;

        let events = stmt
            .query_map(params![filter.exclude_action, limit], row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let removed = self
            .tx
            .execute("DELETE FROM clipboard_events WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Newest event whose action is one of `actions`
    pub fn latest_of(&self, actions: &[Action]) -> Result<Option<ClipboardEvent>, StoreError> {
        let placeholders = vec!["?"; actions.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM clipboard_events
             WHERE action IN ({})
             ORDER BY id DESC
             LIMIT 1",
            EVENT_COLUMNS, placeholders
        );

        let event = self
            .tx
            .query_row(&sql, params_from_iter(actions.iter()), row_to_event)
            .optional()?;

        Ok(event)
    }
}

fn get_schema_version(conn: &Connection) -> Result<u32, StoreError> {
    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<u32> = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS clipboard_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            hostname TEXT NOT NULL,
            action TEXT NOT NULL CHECK (action IN ('copy', 'paste', 'history', 'delete')),
            content TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_clipboard_events_action ON clipboard_events(action);
        ",
    )?;

    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )?;

    Ok(())
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<ClipboardEvent> {
    let raw_timestamp: String = row.get(1)?;
    let timestamp = DateTime::parse_from_rfc3339(&raw_timestamp)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ClipboardEvent {
        id: row.get(0)?,
        timestamp,
        hostname: row.get(2)?,
        action: row.get(3)?,
        content: row.get(4)?,
    })
}

//! Append-only clipboard event ledger
//!
//! Every copy, paste, history query and delete served by remoclip is
//! recorded here as a [`ClipboardEvent`]. Events are never updated; the only
//! way an event leaves the ledger is an explicit delete of a non-history
//! entry.

pub mod database;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

pub use database::{EventStore, StoreTx};

/// Event store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error while preparing the database location
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind of operation that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Text pushed to the shared clipboard
    Copy,
    /// Text pulled from the shared clipboard or from history
    Paste,
    /// A history query (audit record)
    History,
    /// Removal of a history entry
    Delete,
}

impl Action {
    /// Actions whose content represents a clipboard value
    pub const CLIPBOARD_VALUES: [Action; 2] = [Action::Copy, Action::Paste];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Copy => "copy",
            Action::Paste => "paste",
            Action::History => "history",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copy" => Ok(Action::Copy),
            "paste" => Ok(Action::Paste),
            "history" => Ok(Action::History),
            "delete" => Ok(Action::Delete),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

impl ToSql for Action {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Action {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// One immutable record in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardEvent {
    /// Store-assigned identifier, strictly increasing and never reused
    pub id: i64,
    /// Creation instant, always UTC
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Host name supplied by the caller
    pub hostname: String,
    pub action: Action,
    pub content: String,
}

/// Filter for [`StoreTx::query`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Leave out events of this kind
    pub exclude_action: Option<Action>,
    /// Return at most this many events
    pub limit: Option<u32>,
}

impl EventFilter {
    /// Everything except history audit records
    pub fn clipboard_entries(limit: Option<u32>) -> Self {
        Self {
            exclude_action: Some(Action::History),
            limit,
        }
    }
}

/// Render a timestamp as ISO-8601 with a literal `Z` suffix
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn serialize_timestamp<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(value))
}

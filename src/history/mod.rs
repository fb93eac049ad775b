//! History queries over the event ledger
//!
//! A history query either addresses one entry by id or lists clipboard
//! entries newest first. History queries are themselves recorded as
//! `history` events, so every read path here filters them out explicitly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::server::{ActionError, ActionResult};
use crate::store::{Action, ClipboardEvent, EventFilter, EventStore, StoreTx};

/// Validated history query parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub id: Option<i64>,
    pub limit: Option<u32>,
}

/// Content of the `history` event logged for each served query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl AuditRecord {
    fn new(query: &HistoryQuery, events: &[ClipboardEvent]) -> Self {
        Self {
            event_ids: events.iter().map(|e| e.id).collect(),
            limit: query.limit,
            id: query.id,
        }
    }
}

/// Resolves history queries and records them
#[derive(Clone)]
pub struct HistoryQueryEngine {
    store: Arc<EventStore>,
}

impl HistoryQueryEngine {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    /// Serve `query` for `hostname` and log it as a `history` event
    pub async fn run(
        &self,
        hostname: &str,
        query: HistoryQuery,
    ) -> ActionResult<Vec<ClipboardEvent>> {
        let (events, audit_id) = self
            .store
            .transaction(|tx| {
                let events = resolve(tx, &query)?;
                let audit = serde_json::to_string(&AuditRecord::new(&query, &events))
                    .map_err(|e| ActionError::Internal(e.to_string()))?;
                let audit_id = tx.append(hostname, Action::History, &audit)?;
                Ok::<_, ActionError>((events, audit_id))
            })
            .await?;

        debug!(
            "History query from {} returned {} entries (audit event {})",
            hostname,
            events.len(),
            audit_id
        );
        Ok(events)
    }
}

/// Look up a clipboard entry by id; audit records are not addressable
pub fn find_entry(tx: &StoreTx<'_>, id: i64) -> ActionResult<ClipboardEvent> {
    match tx.get(id)? {
        Some(event) if event.action != Action::History => Ok(event),
        _ => Err(ActionError::history_entry_not_found()),
    }
}

fn resolve(tx: &StoreTx<'_>, query: &HistoryQuery) -> ActionResult<Vec<ClipboardEvent>> {
    if let Some(id) = query.id {
        return Ok(vec![find_entry(tx, id)?]);
    }

    Ok(tx.query(EventFilter::clipboard_entries(query.limit))?)
}

//! Request handling for the remoclip server
//!
//! [`ClipboardService`] implements the four operations (copy, paste,
//! history, delete). Every operation runs the same steps and stops at the
//! first failure: authenticate, validate the payload, execute, log the
//! action to the event store, respond. The HTTP surface in [`routes`] only
//! translates between warp and this service.

pub mod error;
pub mod payload;
pub mod routes;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub use error::{ActionError, ActionResult};
pub use payload::Payload;
pub use routes::{routes, run};

use crate::auth::RequestAuthenticator;
use crate::clipboard::ClipboardBackend;
use crate::config::Config;
use crate::history::{find_entry, HistoryQuery, HistoryQueryEngine};
use crate::store::{Action, ClipboardEvent, EventStore};

/// Immutable settings the request pipeline needs
#[derive(Debug, Clone, Default)]
pub struct ServiceSettings {
    /// Shared secret; `None` disables authentication
    pub security_token: Option<String>,
    /// Whether `DELETE /history` is permitted
    pub allow_deletions: bool,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            security_token: config.security_token.clone(),
            allow_deletions: config.server.allow_deletions,
        }
    }
}

/// `{"status": ...}` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// `{"content": ...}` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasteResponse {
    pub content: String,
}

/// `{"history": [...]}` response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<ClipboardEvent>,
}

/// The four clipboard operations behind the HTTP routes
pub struct ClipboardService {
    auth: RequestAuthenticator,
    allow_deletions: bool,
    store: Arc<EventStore>,
    backend: Arc<dyn ClipboardBackend>,
    /// Held while the live clipboard and its ledger entry are updated
    clipboard_lock: Mutex<()>,
    history: HistoryQueryEngine,
}

impl ClipboardService {
    pub fn new(
        settings: ServiceSettings,
        store: Arc<EventStore>,
        backend: Arc<dyn ClipboardBackend>,
    ) -> Self {
        Self {
            auth: RequestAuthenticator::new(settings.security_token),
            allow_deletions: settings.allow_deletions,
            history: HistoryQueryEngine::new(Arc::clone(&store)),
            store,
            backend,
            clipboard_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Name of the clipboard backend in use
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether requests must carry the security token
    pub fn requires_token(&self) -> bool {
        self.auth.is_enabled()
    }

    /// `POST /copy`
    pub async fn copy(&self, token: Option<&[u8]>, body: &[u8]) -> ActionResult<StatusResponse> {
        self.auth.verify(token)?;

        let payload = Payload::parse(body);
        let hostname = payload.hostname()?;
        let content = payload.content()?;

        let _guard = self.clipboard_lock.lock().await;
        let previous = self.backend.read().await.ok();
        self.backend.write(content).await?;

        let id = match self.store.append(hostname, Action::Copy, content).await {
            Ok(id) => id,
            Err(e) => {
                // Unlogged values must not stay on the clipboard
                if let Some(previous) = previous {
                    if let Err(restore) = self.backend.write(&previous).await {
                        warn!("Failed to restore clipboard after store error: {}", restore);
                    }
                }
                return Err(e.into());
            }
        };

        debug!("Copy from {} recorded as event {}", hostname, id);
        Ok(StatusResponse { status: "ok" })
    }

    /// `GET /paste`
    pub async fn paste(&self, token: Option<&[u8]>, body: &[u8]) -> ActionResult<PasteResponse> {
        self.auth.verify(token)?;

        let payload = Payload::parse(body);
        let hostname = payload.hostname()?;
        let event_id = payload.optional_positive_int("id")?;

        let (content, id) = match event_id {
            Some(event_id) => {
                self.store
                    .transaction(|tx| {
                        let content = find_entry(tx, event_id)?.content;
                        let id = tx.append(hostname, Action::Paste, &content)?;
                        Ok::<_, ActionError>((content, id))
                    })
                    .await?
            }
            None => {
                let _guard = self.clipboard_lock.lock().await;
                let content = self.backend.read().await?;
                let id = self.store.append(hostname, Action::Paste, &content).await?;
                (content, id)
            }
        };

        debug!("Paste to {} recorded as event {}", hostname, id);
        Ok(PasteResponse { content })
    }

    /// `GET /history`
    pub async fn history(
        &self,
        token: Option<&[u8]>,
        body: &[u8],
    ) -> ActionResult<HistoryResponse> {
        self.auth.verify(token)?;

        let payload = Payload::parse(body);
        let hostname = payload.hostname()?;
        let limit = payload
            .optional_positive_int("limit")?
            .map(|limit| u32::try_from(limit).unwrap_or(u32::MAX));
        let id = payload.optional_positive_int("id")?;

        let history = self.history.run(hostname, HistoryQuery { id, limit }).await?;
        Ok(HistoryResponse { history })
    }

    /// `DELETE /history`
    ///
    /// The removed entry's content is recorded as a `delete` event in the
    /// same transaction as the removal.
    pub async fn delete(&self, token: Option<&[u8]>, body: &[u8]) -> ActionResult<StatusResponse> {
        self.auth.verify(token)?;

        if !self.allow_deletions {
            return Err(ActionError::Forbidden(
                "history deletions are disabled".to_string(),
            ));
        }

        let payload = Payload::parse(body);
        let hostname = payload.hostname()?;
        let event_id = payload.required_positive_int("id")?;

        let audit_id = self
            .store
            .transaction(|tx| {
                let entry = find_entry(tx, event_id)?;
                if !tx.delete(entry.id)? {
                    return Err(ActionError::history_entry_not_found());
                }
                Ok::<_, ActionError>(tx.append(hostname, Action::Delete, &entry.content)?)
            })
            .await?;

        debug!(
            "Event {} deleted by {} (recorded as event {})",
            event_id, hostname, audit_id
        );
        Ok(StatusResponse { status: "deleted" })
    }
}

//! Clipboard backends
//!
//! The server reads and writes the live clipboard value through a
//! [`ClipboardBackend`]. Two implementations exist: [`SystemBackend`], which
//! talks to the OS clipboard, and [`PrivateBackend`], an in-process value
//! seeded from the event store. [`select_backend`] turns the configured
//! intent into one of them, falling back to the private backend when the OS
//! clipboard cannot be reached.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{EventStore, StoreError};

pub mod private;
pub mod system;

pub use private::PrivateBackend;
pub use system::SystemBackend;

/// Clipboard backend errors
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// No display server or clipboard service is reachable
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    /// Platform-specific error
    #[error("Platform error: {0}")]
    Platform(String),

    /// The clipboard worker thread stopped
    #[error("Clipboard worker is not running")]
    WorkerGone,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of the live clipboard value
#[async_trait]
pub trait ClipboardBackend: Send + Sync {
    /// Current clipboard text
    async fn read(&self) -> Result<String, ClipboardError>;

    /// Replace the clipboard text
    async fn write(&self, text: &str) -> Result<(), ClipboardError>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Backend requested in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The operating system clipboard
    #[default]
    System,
    /// An in-process clipboard that never touches the OS
    Private,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::System => f.write_str("system"),
            BackendKind::Private => f.write_str("private"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(BackendKind::System),
            "private" => Ok(BackendKind::Private),
            _ => Err("clipboard_backend must be either 'system' or 'private'".to_string()),
        }
    }
}

/// Outcome of backend selection
pub struct BackendSelection {
    /// The backend requests will use
    pub backend: Arc<dyn ClipboardBackend>,
    /// Which kind was actually selected
    pub kind: BackendKind,
    /// Why the requested system backend was replaced, if it was
    pub fallback_reason: Option<String>,
}

impl BackendSelection {
    pub fn fell_back(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Resolve the configured backend, probing the OS clipboard if requested
pub async fn select_backend(
    requested: BackendKind,
    store: &EventStore,
) -> Result<BackendSelection, StoreError> {
    select_backend_with(requested, store, || {
        SystemBackend::connect().map(|backend| Arc::new(backend) as Arc<dyn ClipboardBackend>)
    })
    .await
}

/// Like [`select_backend`] but with a caller-supplied system clipboard probe
pub async fn select_backend_with<F>(
    requested: BackendKind,
    store: &EventStore,
    connect_system: F,
) -> Result<BackendSelection, StoreError>
where
    F: FnOnce() -> Result<Arc<dyn ClipboardBackend>, ClipboardError>,
{
    let fallback_reason = match requested {
        BackendKind::System => match connect_system() {
            Ok(backend) => {
                debug!("Connected to {} clipboard backend", backend.name());
                return Ok(BackendSelection {
                    backend,
                    kind: BackendKind::System,
                    fallback_reason: None,
                });
            }
            Err(e) => {
                warn!(
                    "System clipboard unavailable ({}), falling back to private clipboard",
                    e
                );
                Some(e.to_string())
            }
        },
        BackendKind::Private => None,
    };

    let backend = PrivateBackend::seeded_from(store).await?;
    debug!("Private clipboard backend ready");

    Ok(BackendSelection {
        backend: Arc::new(backend),
        kind: BackendKind::Private,
        fallback_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Action;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("system".parse::<BackendKind>().unwrap(), BackendKind::System);
        assert_eq!("Private".parse::<BackendKind>().unwrap(), BackendKind::Private);
        assert!("clipboard".parse::<BackendKind>().is_err());
    }

    #[tokio::test]
    async fn test_private_backend_is_selected_directly() {
        let store = EventStore::open_in_memory().await.unwrap();
        let selection = select_backend_with(BackendKind::Private, &store, || {
            panic!("system clipboard must not be probed")
        })
        .await
        .unwrap();

        assert_eq!(selection.kind, BackendKind::Private);
        assert!(!selection.fell_back());
    }

    #[tokio::test]
    async fn test_unavailable_system_backend_falls_back_to_private() {
        let store = EventStore::open_in_memory().await.unwrap();
        store.append("host", Action::Copy, "remembered").await.unwrap();

        let selection = select_backend_with(BackendKind::System, &store, || {
            Err(ClipboardError::Unavailable("no display".to_string()))
        })
        .await
        .unwrap();

        assert_eq!(selection.kind, BackendKind::Private);
        assert!(selection.fallback_reason.unwrap().contains("no display"));

        let backend = selection.backend;
        assert_eq!(backend.read().await.unwrap(), "remembered");
        backend.write("fresh").await.unwrap();
        assert_eq!(backend.read().await.unwrap(), "fresh");
    }
}

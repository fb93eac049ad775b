//! In-process clipboard backend

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ClipboardBackend, ClipboardError};
use crate::store::{EventStore, StoreError};

/// Clipboard value held in memory and shared by all requests of one server
pub struct PrivateBackend {
    value: Mutex<String>,
}

impl PrivateBackend {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(initial.into()),
        }
    }

    /// Start from the most recent copied or pasted value in the store
    pub async fn seeded_from(store: &EventStore) -> Result<Self, StoreError> {
        let initial = store.latest_clipboard_value().await?.unwrap_or_default();
        Ok(Self::new(initial))
    }
}

impl Default for PrivateBackend {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[async_trait]
impl ClipboardBackend for PrivateBackend {
    async fn read(&self) -> Result<String, ClipboardError> {
        Ok(self.value.lock().await.clone())
    }

    async fn write(&self, text: &str) -> Result<(), ClipboardError> {
        let mut value = self.value.lock().await;
        value.clear();
        value.push_str(text);
        Ok(())
    }

    fn name(&self) -> &str {
        "private"
    }
}

//! Channel-backed progress provider
//!
//! Bridges the core's [`ProgressProvider`] to the renderer task. Sends never
//! block: when the renderer falls behind, updates are dropped.

use animeshot_core::progress::{ProgressProvider, ProgressUpdate};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Channel-based progress provider for CLI rendering
pub struct ChannelProvider {
    tx: Mutex<Option<mpsc::Sender<ProgressUpdate>>>,
    name: Option<String>,
}

impl ChannelProvider {
    pub fn new(tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            name: None,
        }
    }

    /// Create a provider that prefixes its status messages with `name`
    pub fn with_name(tx: mpsc::Sender<ProgressUpdate>, name: String) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            name: Some(name),
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<ProgressUpdate>> {
        self.tx.lock().ok().and_then(|guard| guard.clone())
    }
}

impl ProgressProvider for ChannelProvider {
    fn report(&self, update: ProgressUpdate) {
        let update = match (&self.name, update) {
            (Some(name), ProgressUpdate::Status { message }) => ProgressUpdate::Status {
                message: format!("[{name}] {message}"),
            },
            (_, other) => other,
        };

        if let Some(tx) = self.sender() {
            let _ = tx.try_send(update);
        }
    }

    fn create_child(&self, name: &str) -> Box<dyn ProgressProvider> {
        let child_name = match &self.name {
            Some(parent) => format!("{parent}/{name}"),
            None => name.to_string(),
        };
        Box::new(ChannelProvider {
            tx: Mutex::new(self.sender()),
            name: Some(child_name),
        })
    }

    fn complete(&self) {
        // Dropping the sender lets the renderer leave its loop
        if let Ok(mut guard) = self.tx.lock() {
            *guard = None;
        }
    }
}

/// Create a progress provider and the receiver its renderer reads from
pub fn create_progress_infrastructure()
-> (Arc<dyn ProgressProvider>, mpsc::Receiver<ProgressUpdate>) {
    let (tx, rx) = mpsc::channel(100);
    let provider = Arc::new(ChannelProvider::new(tx)) as Arc<dyn ProgressProvider>;
    (provider, rx)
}

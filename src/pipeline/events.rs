use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use tokio::sync::broadcast;

use crate::session::{SessionId, SessionState};
use crate::store::{LastImport, LastImportStatus, StateStore};

/// Progress update for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub session_id: SessionId,
    pub phase: SessionState,
    pub message: String,
    /// Link to the created page, on `Complete`
    pub remote_url: Option<String>,
}

impl StatusEvent {
    pub fn new(session_id: SessionId, phase: SessionState, message: impl Into<String>) -> Self {
        Self {
            session_id,
            phase,
            message: message.into(),
            remote_url: None,
        }
    }
}

/// Side effect of a session state transition
#[async_trait]
pub trait StatusObserver: Send + Sync {
    async fn on_status(&self, event: &StatusEvent);
}

/// Fans events out to any number of subscribers
pub struct BroadcastObserver {
    sender: broadcast::Sender<StatusEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl StatusObserver for BroadcastObserver {
    async fn on_status(&self, event: &StatusEvent) {
        // No subscriber is the normal case for a headless run
        if self.sender.send(event.clone()).is_err() {
            debug!("No listener for status event: {}", event.message);
        }
    }
}

/// Persists the outcome of finished sessions
pub struct StoreObserver {
    store: Arc<StateStore>,
}

impl StoreObserver {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StatusObserver for StoreObserver {
    async fn on_status(&self, event: &StatusEvent) {
        let last = match event.phase {
            SessionState::Complete => LastImport {
                status: LastImportStatus::Success,
                error: None,
                remote_url: event.remote_url.clone(),
                at: Utc::now(),
            },
            SessionState::Error => LastImport {
                status: LastImportStatus::Error,
                error: Some(event.message.clone()),
                remote_url: None,
                at: Utc::now(),
            },
            _ => return,
        };

        if let Err(e) = self.store.record_last_import(last).await {
            warn!("Failed to record import status: {}", e);
        }
    }
}

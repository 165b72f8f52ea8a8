//! Persisted state shared between runs.
//!
//! Holds the category cache, the remembered category property name, the
//! in-progress session marker and the outcome of the last import. The whole
//! state is one small JSON document, rewritten on every change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::session::SessionId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Category options as last fetched from the database schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCategories {
    pub options: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Marks a session as in progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMarker {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
}

impl SessionMarker {
    /// A marker older than `max_age` most likely belongs to a stuck session
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match (now - self.started_at).to_std() {
            Ok(age) => age > max_age,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastImportStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastImport {
    pub status: LastImportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub cuisine_cache: Option<CachedCategories>,
    #[serde(default)]
    pub cuisine_property_name: Option<String>,
    #[serde(default)]
    pub session: Option<SessionMarker>,
    #[serde(default)]
    pub last_import: Option<LastImport>,
}

/// JSON-file backed (or purely in-memory) state
#[derive(Debug)]
pub struct StateStore {
    path: Option<PathBuf>,
    state: Mutex<PersistedState>,
}

impl StateStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(PersistedState::default()),
        }
    }

    /// Open the state file at `path`; a missing file starts empty
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)?,
            Ok(_) => PersistedState::default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PersistedState::default(),
            Err(e) => return Err(e.into()),
        };
        debug!("Loaded state from {}", path.display());

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub async fn snapshot(&self) -> PersistedState {
        self.state.lock().await.clone()
    }

    /// Apply `change` and write the result through to disk
    pub async fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut PersistedState),
    {
        let mut state = self.state.lock().await;
        change(&mut *state);
        if let Some(path) = &self.path {
            write_state(path, &state).await?;
        }
        Ok(())
    }

    pub async fn cached_categories(&self) -> Option<CachedCategories> {
        self.state.lock().await.cuisine_cache.clone()
    }

    pub async fn cuisine_property_name(&self) -> Option<String> {
        self.state.lock().await.cuisine_property_name.clone()
    }

    pub async fn session_marker(&self) -> Option<SessionMarker> {
        self.state.lock().await.session.clone()
    }

    pub async fn last_import(&self) -> Option<LastImport> {
        self.state.lock().await.last_import.clone()
    }

    pub async fn set_cuisine_property_name(&self, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.update(|state| state.cuisine_property_name = Some(name))
            .await
    }

    pub async fn mark_session_started(&self, marker: SessionMarker) -> Result<(), StoreError> {
        self.update(|state| state.session = Some(marker)).await
    }

    /// Clear the in-progress marker, but only if it still belongs to `session_id`
    pub async fn clear_session(&self, session_id: SessionId) -> Result<(), StoreError> {
        self.update(|state| {
            if state
                .session
                .as_ref()
                .is_some_and(|marker| marker.session_id == session_id)
            {
                state.session = None;
            }
        })
        .await
    }

    /// Clear whatever in-progress marker is present
    pub async fn clear_any_session(&self) -> Result<(), StoreError> {
        self.update(|state| state.session = None).await
    }

    pub async fn record_last_import(&self, last: LastImport) -> Result<(), StoreError> {
        self.update(|state| state.last_import = Some(last)).await
    }
}

async fn write_state(path: &Path, state: &PersistedState) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

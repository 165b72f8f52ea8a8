use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::categories::{default_cuisines, CuisineCache};
use crate::config::ImportConfig;
use crate::error::{ExtractionError, PipelineError};
use crate::extract::TextExtractor;
use crate::llm::{AnthropicProvider, RetryPolicy};
use crate::model::ScrapedPage;
use crate::notion::{ImportResult, NotionClient, NotionImporter};
use crate::pipeline::{BroadcastObserver, StatusEvent, StatusObserver, StoreObserver};
use crate::session::{Session, SessionId, SessionState, SessionToken};
use crate::store::{LastImport, SessionMarker, StateStore, StoreError};

const EVENT_CAPACITY: usize = 32;

pub const EXTRACTING_MESSAGE: &str = "Extracting recipe data with Claude...";
pub const IMPORTING_MESSAGE: &str = "Importing recipe to Notion...";
pub const COMPLETE_MESSAGE: &str = "Recipe imported successfully!";
pub const CANCELLED_MESSAGE: &str = "Processing cancelled by user";

/// Snapshot returned by [`Orchestrator::status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    /// Id and state of the most recent session in this process
    pub current: Option<(SessionId, SessionState)>,
    /// Persisted in-progress marker that outlived the stale threshold; it has
    /// been cleared
    pub stale_session: Option<SessionMarker>,
    pub last_import: Option<LastImport>,
}

/// Runs extract + import as a single-flight, cancellable session
///
/// Starting a session abandons the previous one without cancelling it. The
/// abandoned session may finish its in-flight request, but its status events
/// are dropped because it is no longer current.
pub struct Orchestrator {
    extractor: TextExtractor,
    importer: NotionImporter,
    notion: Arc<NotionClient>,
    cache: Arc<CuisineCache>,
    store: Arc<StateStore>,
    broadcast: Arc<BroadcastObserver>,
    observers: Vec<Arc<dyn StatusObserver>>,
    next_id: AtomicU64,
    current: Mutex<Option<Session>>,
    stale_after: Duration,
}

impl Orchestrator {
    pub fn new(
        extractor: TextExtractor,
        importer: NotionImporter,
        notion: Arc<NotionClient>,
        cache: Arc<CuisineCache>,
        store: Arc<StateStore>,
        stale_after: Duration,
    ) -> Self {
        let broadcast = Arc::new(BroadcastObserver::new(EVENT_CAPACITY));
        let observers: Vec<Arc<dyn StatusObserver>> = vec![
            broadcast.clone(),
            Arc::new(StoreObserver::new(store.clone())),
        ];

        Self {
            extractor,
            importer,
            notion,
            cache,
            store,
            broadcast,
            observers,
            next_id: AtomicU64::new(1),
            current: Mutex::new(None),
            stale_after,
        }
    }

    /// Wire up every component from configuration, with state kept on disk
    pub async fn from_config(config: &ImportConfig) -> Result<Self, StoreError> {
        let store = Arc::new(StateStore::open(&config.state_path).await?);
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: &ImportConfig, store: Arc<StateStore>) -> Self {
        let provider = Arc::new(AnthropicProvider::new(config));
        let notion = Arc::new(NotionClient::new(config));
        let cache = Arc::new(CuisineCache::new(store.clone(), config.category_ttl()));

        let extractor = TextExtractor::new(provider, RetryPolicy::from(&config.retry));
        let importer = NotionImporter::new(
            notion.clone(),
            cache.clone(),
            store.clone(),
            config.categories.allow_new,
        );

        Self::new(
            extractor,
            importer,
            notion,
            cache,
            store,
            config.stale_session_after(),
        )
    }

    /// Register another observer of status transitions
    pub fn add_observer(&mut self, observer: Arc<dyn StatusObserver>) {
        self.observers.push(observer);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.broadcast.subscribe()
    }

    /// Run `process_recipe` on the runtime so the caller can cancel it
    pub fn spawn(self: Arc<Self>, page: ScrapedPage) -> JoinHandle<Result<ImportResult, PipelineError>> {
        tokio::spawn(async move { self.process_recipe(&page).await })
    }

    /// Extract a recipe from `page` and import it
    pub async fn process_recipe(&self, page: &ScrapedPage) -> Result<ImportResult, PipelineError> {
        let (id, token) = self.start_session().await;

        let result = self.run(id, page, &token).await;

        match &result {
            Ok(imported) => {
                let mut event = StatusEvent::new(id, SessionState::Complete, COMPLETE_MESSAGE);
                event.remote_url = Some(imported.remote_url.clone());
                self.transition(event).await;
                self.clear_marker(id).await;
            }
            // Cleanup belongs to whoever cancelled
            Err(e) if e.is_cancelled() => info!("Session {} cancelled", id),
            Err(e) => {
                error!("Session {} failed: {}", id, e);
                self.transition(StatusEvent::new(
                    id,
                    SessionState::Error,
                    format!("Error: {}", e),
                ))
                .await;
                self.clear_marker(id).await;
            }
        }

        result
    }

    async fn run(
        &self,
        id: SessionId,
        page: &ScrapedPage,
        token: &SessionToken,
    ) -> Result<ImportResult, PipelineError> {
        let hints = self.category_hints().await;
        token.check().map_err(ExtractionError::from)?;

        self.transition(StatusEvent::new(id, SessionState::Extracting, EXTRACTING_MESSAGE))
            .await;
        let recipe = self.extractor.extract(page, &hints, token).await?;
        token.check().map_err(ExtractionError::from)?;

        self.transition(StatusEvent::new(id, SessionState::Importing, IMPORTING_MESSAGE))
            .await;
        Ok(self.importer.import(&recipe, token).await?)
    }

    async fn start_session(&self) -> (SessionId, SessionToken) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Session::new(id);
        let token = session.token.clone();
        let marker = SessionMarker {
            session_id: id,
            started_at: session.started_at,
        };

        if let Some(previous) = self.current.lock().await.replace(session) {
            if !previous.state.is_terminal() {
                info!("Session {} superseded by session {}", previous.id, id);
            }
        }

        if let Err(e) = self.store.mark_session_started(marker).await {
            warn!("Failed to persist session marker: {}", e);
        }
        debug!("Started session {}", id);
        (id, token)
    }

    /// Cached categories, else a refresh from the database when it is
    /// configured, else the default cuisines
    async fn category_hints(&self) -> Vec<String> {
        if let Some(options) = self.cache.get().await {
            return options;
        }
        if self.notion.has_credentials() {
            self.cache.refresh(self.notion.as_ref()).await
        } else {
            debug!("Notion not configured, using default cuisines");
            default_cuisines()
        }
    }

    /// Current category options, fetching them if the cache is stale
    pub async fn categories(&self) -> Vec<String> {
        self.category_hints().await
    }

    /// Fetch category options from the database regardless of the cache
    pub async fn refresh_categories(&self) -> Vec<String> {
        self.cache.refresh(self.notion.as_ref()).await
    }

    /// Apply the event's state to its session and notify observers
    ///
    /// Events of a session that is no longer current, or that would be an
    /// invalid transition, are dropped.
    async fn transition(&self, event: StatusEvent) {
        {
            let mut current = self.current.lock().await;
            let Some(session) = current.as_mut().filter(|s| s.id == event.session_id) else {
                debug!(
                    "Dropping '{}' from superseded session {}",
                    event.phase, event.session_id
                );
                return;
            };
            if !session.advance(event.phase) {
                debug!(
                    "Dropping '{}' for session {} in state '{}'",
                    event.phase, session.id, session.state
                );
                return;
            }
        }

        info!("[session {}] {}: {}", event.session_id, event.phase, event.message);
        for observer in &self.observers {
            observer.on_status(&event).await;
        }
    }

    async fn clear_marker(&self, id: SessionId) {
        if let Err(e) = self.store.clear_session(id).await {
            warn!("Failed to clear session marker: {}", e);
        }
    }

    /// Cancel the current session unless it already finished
    ///
    /// This includes a session still in `Idle` while categories are being
    /// fetched. The session stops at its next checkpoint. Any persisted
    /// in-progress marker is cleared. Returns whether a session was cancelled.
    pub async fn cancel(&self) -> bool {
        let cancelled = {
            let current = self.current.lock().await;
            current
                .as_ref()
                .filter(|s| !s.state.is_terminal())
                .map(|s| {
                    s.token.cancel();
                    s.id
                })
        };

        if let Some(id) = cancelled {
            self.transition(StatusEvent::new(id, SessionState::Cancelled, CANCELLED_MESSAGE))
                .await;
        }
        if let Err(e) = self.store.clear_any_session().await {
            warn!("Failed to clear session marker: {}", e);
        }

        cancelled.is_some()
    }

    /// Current session, stale-marker detection and the last import outcome
    pub async fn status(&self) -> PipelineStatus {
        let current = self
            .current
            .lock()
            .await
            .as_ref()
            .map(|s| (s.id, s.state));

        let live_here = current.filter(|(_, state)| !state.is_terminal()).map(|(id, _)| id);
        let stale_session = match self.store.session_marker().await {
            Some(marker)
                if Some(marker.session_id) != live_here
                    && marker.is_stale(Utc::now(), self.stale_after) =>
            {
                warn!(
                    "Session {} started at {} looks stuck, clearing it",
                    marker.session_id, marker.started_at
                );
                if let Err(e) = self.store.clear_session(marker.session_id).await {
                    warn!("Failed to clear stale session marker: {}", e);
                }
                Some(marker)
            }
            _ => None,
        };

        PipelineStatus {
            current,
            stale_session,
            last_import: self.store.last_import().await,
        }
    }
}

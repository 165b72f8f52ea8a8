pub mod categories;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod llm;
pub mod model;
pub mod notion;
pub mod pipeline;
pub mod session;
pub mod store;

pub use config::ImportConfig;
pub use error::{ErrorKind, ExtractionError, ImportError, PipelineError};
pub use model::{RecipeDocument, RecipeLine, ScrapedPage};
pub use notion::ImportResult;
pub use pipeline::{Orchestrator, StatusEvent};
pub use session::{SessionState, SessionToken};

use std::sync::Arc;

use crate::store::StateStore;

/// Extract and import one page with an in-memory state store
///
/// Convenience for one-off imports; use [`Orchestrator`] directly to keep the
/// category cache between runs or to cancel.
pub async fn import_page(
    page: &ScrapedPage,
    config: &ImportConfig,
) -> Result<ImportResult, PipelineError> {
    let orchestrator = Orchestrator::with_store(config, Arc::new(StateStore::in_memory()));
    orchestrator.process_recipe(page).await
}

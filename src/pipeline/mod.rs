//! Session orchestration and progress reporting.

mod events;
mod orchestrator;

pub use events::{BroadcastObserver, StatusEvent, StatusObserver, StoreObserver};
pub use orchestrator::{
    Orchestrator, PipelineStatus, CANCELLED_MESSAGE, COMPLETE_MESSAGE, EXTRACTING_MESSAGE,
    IMPORTING_MESSAGE,
};

//! Application state shared across all route handlers.
//!
//! AppState is passed to handlers via axum's State extractor.

use std::sync::Arc;

use ingres_chat::ChatOrchestrator;

/// Shared application state.
///
/// The pipeline is `None` when startup could not reach the store or find a
/// model key; `/chat` then reports the service as unavailable.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Option<Arc<ChatOrchestrator>>,
}

impl AppState {
    pub fn new(orchestrator: ChatOrchestrator) -> Self {
        Self {
            orchestrator: Some(Arc::new(orchestrator)),
        }
    }

    /// State for a server whose pipeline failed to initialize.
    pub fn uninitialized() -> Self {
        Self { orchestrator: None }
    }

    pub fn is_ready(&self) -> bool {
        self.orchestrator.is_some()
    }
}

use std::sync::Arc;

use reelmatch_core::{BatchScheduler, Config, Library, MatchOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<MatchOrchestrator>,
    scheduler: Arc<BatchScheduler>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<MatchOrchestrator>) -> Self {
        let scheduler = Arc::new(BatchScheduler::new(
            Arc::clone(&orchestrator),
            config.batch.clone(),
        ));
        Self {
            config,
            orchestrator,
            scheduler,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &MatchOrchestrator {
        self.orchestrator.as_ref()
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        self.scheduler.as_ref()
    }

    pub fn library(&self) -> &dyn Library {
        self.orchestrator.library().as_ref()
    }
}

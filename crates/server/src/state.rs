use pokevalue_core::{Config, LifecycleManager, SanitizedConfig, SubmissionQuery};

/// Shared application state
pub struct AppState {
    config: Config,
    manager: LifecycleManager,
    query: SubmissionQuery,
}

impl AppState {
    pub fn new(config: Config, manager: LifecycleManager) -> Self {
        let query = SubmissionQuery::new(manager.store().clone());
        Self {
            config,
            manager,
            query,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn manager(&self) -> &LifecycleManager {
        &self.manager
    }

    pub fn query(&self) -> &SubmissionQuery {
        &self.query
    }
}

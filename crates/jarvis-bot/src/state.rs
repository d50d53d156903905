use std::sync::Arc;

use jarvis_core::Coordinator;

use crate::auth::AuthConfig;
use crate::config::BotConfig;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub auth: AuthConfig,
    /// Number of repositories in the watch list, reported by `/health`.
    pub watched_repositories: usize,
}

impl AppState {
    pub fn new(config: &BotConfig, coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            auth: AuthConfig::from(&config.auth),
            watched_repositories: config.watch.repositories.len(),
        }
    }
}

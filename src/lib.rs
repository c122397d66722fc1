pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
pub mod utils;

use crate::config::Config;
use crate::services::{
    completion_service::CompletionClient, orchestrator::Orchestrator,
    progress_service::ProgressRegistry, quiz_store::QuizStore,
    reference_selector::SessionUsage,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn QuizStore>,
    pub session: Arc<SessionUsage>,
    pub progress: ProgressRegistry,
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn QuizStore>,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        let session = Arc::new(SessionUsage::new());
        let progress = ProgressRegistry::new(config.progress_retention);
        let orchestrator = Orchestrator::new(
            client,
            Arc::clone(&store),
            Arc::clone(&session),
            progress.clone(),
            config.generator.clone(),
        );

        Self {
            config: Arc::new(config),
            store,
            session,
            progress,
            orchestrator,
        }
    }
}

use quiz_backend::services::completion_service::{CompletionClient, OpenAiCompletionService};
use quiz_backend::services::quiz_store::{MemoryQuizStore, PgQuizStore, QuizStore};
use quiz_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, telemetry, AppState,
};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

const USAGE_CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    init_config()?;
    let config = get_config()?;

    let store: Arc<dyn QuizStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Connected to Postgres and applied migrations");
            Arc::new(PgQuizStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, usage history and items are kept in memory");
            Arc::new(MemoryQuizStore::new())
        }
    };

    let http_client = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;
    let client: Arc<dyn CompletionClient> = Arc::new(OpenAiCompletionService::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
        config.openai_model.clone(),
        http_client,
    ));

    let app_state = AppState::new(config.clone(), store, client);

    {
        let progress = app_state.progress.clone();
        let interval = config.sweep_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                progress.sweep_expired().await;
            }
        });
    }

    {
        let store = app_state.store.clone();
        let days = config.usage_retention_days;
        tokio::spawn(async move {
            loop {
                match store.delete_usage_older_than(days).await {
                    Ok(deleted) => info!(deleted, days, "Usage cleanup finished"),
                    Err(e) => tracing::error!("Usage cleanup error: {:?}", e),
                }
                tokio::time::sleep(USAGE_CLEANUP_INTERVAL).await;
            }
        });
    }

    let app = routes::router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

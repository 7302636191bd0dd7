//! Main entry point for the hairstyle studio service

use hair_studio::{
    api,
    backend::{
        gemini::GeminiBackend,
        retry::{QuotaRetry, RetryPolicy},
        traits::GenerationBackend,
    },
    catalog,
    config::Settings,
    credentials::CredentialState,
    AppState,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));

    if settings.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }

    info!("Starting hairstyle studio service");

    let api_key = settings
        .generation
        .api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok());
    if api_key.is_none() {
        warn!("No generation credential configured; captures will fail until a key is installed");
    }
    let credentials = Arc::new(CredentialState::new(
        api_key,
        settings.generation.elevated_quota,
    ));

    let backend: Arc<dyn GenerationBackend> = Arc::new(QuotaRetry::new(
        GeminiBackend::new(settings.generation.clone(), credentials.clone()),
        RetryPolicy::from(&settings.generation),
    ));

    let state = AppState::new(
        settings.clone(),
        credentials,
        backend,
        catalog::HAIRSTYLES.to_vec(),
    );

    // Build the router
    let app = api::routes::create_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

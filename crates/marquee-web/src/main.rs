mod api;
mod hosts;
mod state;

use std::sync::Arc;

use anyhow::Context;
use marquee_core::{AppConfig, HttpClient, MetadataProvider, Storage, TmdbClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let default_filter = if config.debug {
        "marquee_web=debug,marquee_core=debug,tower_http=debug"
    } else {
        "marquee_web=info,marquee_core=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate()?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let storage = Storage::open(&config.db_path.to_string_lossy()).await?;

    let http = HttpClient::new(config.network())?;
    let provider: Arc<dyn MetadataProvider> = Arc::new(TmdbClient::new(http, config.tmdb()));
    if !provider.is_available() {
        tracing::warn!("TMDB_API_KEY is not set; movie details will not be fetched");
    }

    let addr = config.bind;
    let app = api::app(AppState::new(storage, provider, config));

    tracing::info!("Starting marquee on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

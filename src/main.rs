mod aggregator;
mod config;
mod normalizer;
mod relay;
mod respin;
mod routes;
mod store;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::relay::RespinRelay;
use crate::respin::RespinClient;
use crate::routes::AppState;
use crate::store::{KeyValueStore, SavedArticles, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "respin_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load("feeds.toml")?;
    info!("Loaded {} feed sources from configuration", config.feeds.len());

    // Initialize the saved-article store
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:respin_news.db?mode=rwc".to_string());
    let store = SqliteStore::new(&database_url).await?;
    store.initialize().await?;
    let store: Arc<dyn KeyValueStore> = Arc::new(store);
    let saved = Arc::new(SavedArticles::load(store).await?);
    info!("Saved-article store initialized");

    // The credential lives only on the relay side; the respin client and the
    // page never see it.
    let api_key = std::env::var("GEMINI_API_KEY").ok();
    if api_key.is_none() {
        warn!("GEMINI_API_KEY not set; respin requests will fail until configured");
    }

    let aggregator = Arc::new(Aggregator::new(&config));

    // One automatic aggregation cycle at startup; afterwards only the manual
    // refresh route triggers fetches.
    let initial = aggregator.clone();
    tokio::spawn(async move {
        initial.refresh().await;
    });

    let state = Arc::new(AppState {
        aggregator,
        saved,
        respin: Arc::new(RespinClient::new(&config.respin_endpoint)),
        relay: Arc::new(RespinRelay::new(api_key)),
    });

    let app = routes::app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Server starting on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}

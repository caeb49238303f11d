use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{error, info};
use url::form_urlencoded;

use crate::config::{Config, FeedSource};
use crate::normalizer::{normalize, Article, FeedPayload};

/// Single user-facing error shown when every configured source failed.
pub const SOURCES_UNAVAILABLE: &str = "Could not fetch any content. The sources may be \
     temporarily unavailable or blocking requests. Please try again later.";

/// Fetches all configured sources through the RSS-to-JSON API and holds the
/// combined article list. One fetch cycle runs at a time; a cycle replaces
/// the whole list rather than diffing into it.
pub struct Aggregator {
    client: Client,
    rss_api_url: String,
    sources: Vec<FeedSource>,
    articles: RwLock<Vec<Article>>,
    loading: RwLock<bool>,
    last_error: RwLock<Option<String>>,
}

impl Aggregator {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("RespinNews/1.0 (RSS Aggregator)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            rss_api_url: config.rss_api_url.clone(),
            sources: config.feeds.clone(),
            articles: RwLock::new(Vec::new()),
            loading: RwLock::new(false),
            last_error: RwLock::new(None),
        }
    }

    pub async fn articles(&self) -> Vec<Article> {
        self.articles.read().await.clone()
    }

    pub async fn is_loading(&self) -> bool {
        *self.loading.read().await
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Run one aggregation cycle: fan out one request per source, merge what
    /// succeeded, sort by recency. A failing source never cancels or fails
    /// its siblings; only a fully empty result surfaces an error.
    pub async fn refresh(&self) {
        {
            let mut loading = self.loading.write().await;
            if *loading {
                info!("Refresh already in progress, skipping");
                return;
            }
            *loading = true;
        }

        info!("Refreshing {} feed sources", self.sources.len());

        let fetches = self.sources.iter().map(|source| self.fetch_source(source));
        let results = join_all(fetches).await;

        let mut combined: Vec<Article> = results.into_iter().flatten().collect();
        combined.sort_by(|a, b| b.published.cmp(&a.published));

        {
            let mut last_error = self.last_error.write().await;
            *last_error = if combined.is_empty() && !self.sources.is_empty() {
                Some(SOURCES_UNAVAILABLE.to_string())
            } else {
                None
            };
        }

        info!("Feed refresh complete: {} articles", combined.len());
        *self.articles.write().await = combined;
        *self.loading.write().await = false;
    }

    /// Fetch and normalize a single source. Failures are logged and yield an
    /// empty contribution.
    async fn fetch_source(&self, source: &FeedSource) -> Vec<Article> {
        match self.try_fetch_source(source).await {
            Ok(articles) => {
                info!(
                    "Fetched {} articles from feed '{}'",
                    articles.len(),
                    source.name
                );
                articles
            }
            Err(e) => {
                error!("Failed to fetch feed '{}': {}", source.name, e);
                Vec::new()
            }
        }
    }

    async fn try_fetch_source(&self, source: &FeedSource) -> anyhow::Result<Vec<Article>> {
        let encoded: String = form_urlencoded::byte_serialize(source.url.as_bytes()).collect();
        let fetch_url = format!("{}{}", self.rss_api_url, encoded);

        let response = self.client.get(&fetch_url).send().await?;
        let payload: FeedPayload = response.error_for_status()?.json().await?;

        Ok(normalize(&payload, source))
    }
}

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use tower_http::services::ServeDir;

use crate::aggregator::Aggregator;
use crate::config::Category;
use crate::normalizer::Article;
use crate::relay::{RelayRequest, RespinRelay};
use crate::respin::RespinClient;
use crate::store::SavedArticles;

pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub saved: Arc<SavedArticles>,
    pub respin: Arc<RespinClient>,
    pub relay: Arc<RespinRelay>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/refresh", post(refresh))
        .route("/refresh/status", get(refresh_status))
        .route("/saved/toggle", post(toggle_saved))
        .route("/respin", post(respin))
        .route("/api/respin", post(respin_relay))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}

/// The category chip selection: the real categories plus two pseudo-entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Saved,
    Category(Category),
}

impl CategoryFilter {
    /// Parse the query-parameter form. Unknown values fall back to All.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") | Some("All") => CategoryFilter::All,
            Some("Saved") => CategoryFilter::Saved,
            Some(other) => Category::ALL
                .into_iter()
                .find(|c| c.as_str() == other)
                .map(CategoryFilter::Category)
                .unwrap_or(CategoryFilter::All),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryFilter::All => "All",
            CategoryFilter::Saved => "Saved",
            CategoryFilter::Category(c) => c.as_str(),
        }
    }
}

/// Explicit search/filter state, decoded once per request from the query
/// string and applied through `filter_articles`.
#[derive(Debug, Clone)]
pub struct ArticleFilter {
    pub query: String,
    pub category: CategoryFilter,
}

impl ArticleFilter {
    pub fn matches(&self, article: &Article, saved_ids: &[String]) -> bool {
        let category_match = match self.category {
            CategoryFilter::All => true,
            CategoryFilter::Saved => saved_ids.contains(&article.id),
            CategoryFilter::Category(c) => article.category == c,
        };

        let needle = self.query.trim().to_lowercase();
        let search_match = needle.is_empty()
            || article.title.to_lowercase().contains(&needle)
            || article.excerpt.to_lowercase().contains(&needle);

        category_match && search_match
    }
}

/// Apply the filter state to the aggregated list.
pub fn filter_articles(
    articles: &[Article],
    filter: &ArticleFilter,
    saved_ids: &[String],
) -> Vec<Article> {
    articles
        .iter()
        .filter(|a| filter.matches(a, saved_ids))
        .cloned()
        .collect()
}

#[derive(Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub q: String,
    pub category: Option<String>,
}

pub struct ArticleView {
    pub article: Article,
    pub saved: bool,
}

/// One category chip, precomputed for rendering.
pub struct ChipView {
    pub name: &'static str,
    pub active: bool,
    pub href: String,
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub articles: Vec<ArticleView>,
    pub query: String,
    pub selected: &'static str,
    pub chips: Vec<ChipView>,
    pub error: Option<String>,
    pub loading: bool,
}

#[derive(Template)]
#[template(path = "refresh_button.html")]
pub struct RefreshButtonTemplate {
    pub refreshing: bool,
}

#[derive(Template)]
#[template(path = "save_button.html")]
pub struct SaveButtonTemplate {
    pub id: String,
    pub saved: bool,
}

#[derive(Template)]
#[template(path = "respin_modal.html")]
pub struct RespinModalTemplate {
    pub title: String,
    pub content: Option<String>,
    pub error: Option<String>,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

fn filter_chips(selected: &str, query: &str) -> Vec<ChipView> {
    let mut names = vec!["All"];
    names.extend(Category::ALL.iter().map(|c| c.as_str()));
    names.push("Saved");

    names
        .into_iter()
        .map(|name| ChipView {
            name,
            active: name == selected,
            href: chip_href(name, query),
        })
        .collect()
}

fn chip_href(category: &str, query: &str) -> String {
    let mut params = url::form_urlencoded::Serializer::new(String::new());
    params.append_pair("category", category);
    if !query.trim().is_empty() {
        params.append_pair("q", query);
    }
    format!("/?{}", params.finish())
}

// Route handlers
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ArticleFilter {
        query: params.q.clone(),
        category: CategoryFilter::parse(params.category.as_deref()),
    };

    let articles = state.aggregator.articles().await;
    let saved_ids = state.saved.saved_ids().await;
    let filtered = filter_articles(&articles, &filter, &saved_ids);

    let views = filtered
        .into_iter()
        .map(|article| {
            let saved = saved_ids.contains(&article.id);
            ArticleView { article, saved }
        })
        .collect();

    let selected = filter.category.as_str();
    Ok(HtmlTemplate(IndexTemplate {
        articles: views,
        chips: filter_chips(selected, &params.q),
        query: params.q,
        selected,
        error: state.aggregator.last_error().await,
        loading: state.aggregator.is_loading().await,
    }))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    // Spawn the aggregation cycle; the button polls /refresh/status
    let aggregator = state.aggregator.clone();
    tokio::spawn(async move {
        aggregator.refresh().await;
    });

    Ok(HtmlTemplate(RefreshButtonTemplate { refreshing: true }))
}

pub async fn refresh_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let refreshing = state.aggregator.is_loading().await;
    Ok(HtmlTemplate(RefreshButtonTemplate { refreshing }))
}

#[derive(Deserialize)]
pub struct ToggleForm {
    pub id: String,
}

pub async fn toggle_saved(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ToggleForm>,
) -> Result<impl IntoResponse, AppError> {
    let saved = state.saved.toggle(&form.id).await?;
    Ok(HtmlTemplate(SaveButtonTemplate { id: form.id, saved }))
}

#[derive(Deserialize)]
pub struct RespinForm {
    pub title: String,
    pub excerpt: String,
}

pub async fn respin(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RespinForm>,
) -> Result<impl IntoResponse, AppError> {
    let template = match state.respin.respin(&form.title, &form.excerpt).await {
        Ok(content) => RespinModalTemplate {
            title: form.title,
            content: Some(content),
            error: None,
        },
        Err(e) => RespinModalTemplate {
            title: form.title,
            content: None,
            error: Some(e.to_string()),
        },
    };

    Ok(HtmlTemplate(template))
}

pub async fn respin_relay(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RelayRequest>,
) -> Response {
    match state.relay.respin(&request).await {
        Ok(content) => (
            StatusCode::OK,
            Json(serde_json::json!({ "content": content })),
        )
            .into_response(),
        Err(e) => (
            e.status_code(),
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

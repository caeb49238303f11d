use std::time::Duration;

use axum::http::StatusCode;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

const DEFAULT_UPSTREAM_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const UPSTREAM_MODEL: &str = "gemini-2.5-flash";

/// Failure modes of the relay, each with its HTTP status and the exact
/// message returned to the caller. The configuration error deliberately does
/// not say which credential is missing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("Missing title or excerpt in request body")]
    InvalidRequest,
    #[error("The AI service is not configured on the server.")]
    NotConfigured,
    #[error("An error occurred while communicating with the AI service.")]
    Upstream,
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest => StatusCode::BAD_REQUEST,
            RelayError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Upstream => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Body of a relay request. Fields are optional so that missing ones map to
/// a 400 with a structured error instead of a framework rejection.
#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    pub title: Option<String>,
    pub excerpt: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Server-side relay to the generative text API. This is the only place that
/// touches the API credential; the browser-facing side never sees it.
pub struct RespinRelay {
    client: Client,
    upstream_url: String,
    api_key: Option<String>,
}

impl RespinRelay {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_upstream_url(api_key, DEFAULT_UPSTREAM_URL)
    }

    pub fn with_upstream_url(api_key: Option<String>, upstream_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            upstream_url: upstream_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Validate the request, call the upstream API once, and return the
    /// generated Markdown.
    pub async fn respin(&self, request: &RelayRequest) -> Result<String, RelayError> {
        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(RelayError::InvalidRequest)?;
        let excerpt = request
            .excerpt
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(RelayError::InvalidRequest)?;

        let Some(api_key) = &self.api_key else {
            error!("CRITICAL: upstream API key not configured");
            return Err(RelayError::NotConfigured);
        };

        let prompt = build_prompt(title, excerpt);
        self.generate(api_key, &prompt).await
    }

    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, RelayError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.upstream_url, UPSTREAM_MODEL
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Error calling generative API: {}", e);
                RelayError::Upstream
            })?;

        let response = response.error_for_status().map_err(|e| {
            error!("Generative API returned error status: {}", e);
            RelayError::Upstream
        })?;

        let generated: GenerateResponse = response.json().await.map_err(|e| {
            error!("Unparseable generative API response: {}", e);
            RelayError::Upstream
        })?;

        generated
            .candidates
            .into_iter()
            .find_map(|c| {
                c.content
                    .and_then(|content| content.parts.into_iter().find_map(|p| p.text))
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                error!("Generative API response contained no text");
                RelayError::Upstream
            })
    }
}

/// Fixed prompt template embedding title and excerpt verbatim.
fn build_prompt(title: &str, excerpt: &str) -> String {
    format!(
        r####"You are an expert content creator and SEO specialist with deep knowledge in herbal remedies, natural wellness, and gardening.
Your task is to take a given article title and excerpt and "respin" it into a more engaging, insightful, and actionable piece of content.

**Instructions:**
1.  **Enhance the Title:** If possible, suggest a more compelling, SEO-friendly title. Start the response with "### New Title Suggestion:".
2.  **Expand the Content:** Elaborate on the original excerpt. Add new perspectives, practical tips, or related interesting facts. Structure this under a "### Enhanced Summary:" heading.
3.  **Improve Engagement:** Use a captivating tone. Use bullet points or numbered lists for clarity, and include a call-to-action if appropriate.
4.  **Maintain Core Topic:** Stay true to the original article's subject matter.
5.  **Format with Markdown:** Use Markdown for formatting (e.g., **bold**, *italics*, lists).

**Original Content to Respin:**

**Title:** "{title}"

**Excerpt:** "{excerpt}"
"####
    )
}

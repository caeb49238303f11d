use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Failure modes of a respin call. The Display text of each variant is the
/// user-facing message; internal details are logged, not shown.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RespinError {
    /// The relay reported a structured application error.
    #[error("{0}")]
    Relay(String),
    /// The relay answered 2xx but without the expected content field.
    #[error("Received an empty response from the AI service.")]
    EmptyResponse,
    /// Network failure, unparseable body, or an error status without detail.
    #[error("Sorry, the AI was unable to respin this article. Please try again later.")]
    Unavailable,
}

#[derive(Serialize)]
struct RespinRequest<'a> {
    title: &'a str,
    excerpt: &'a str,
}

#[derive(Deserialize)]
struct RespinResponse {
    content: Option<String>,
    error: Option<String>,
}

/// Client for the server-side respin relay. One request per call: no retry,
/// no caching of prior respins.
pub struct RespinClient {
    client: Client,
    endpoint: String,
}

impl RespinClient {
    pub fn new(endpoint: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    /// Send a title/excerpt pair to the relay and return the reformatted
    /// Markdown.
    pub async fn respin(&self, title: &str, excerpt: &str) -> Result<String, RespinError> {
        let request = RespinRequest { title, excerpt };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Error calling respin relay: {}", e);
                RespinError::Unavailable
            })?;

        let status = response.status();
        let body: RespinResponse = response.json().await.map_err(|e| {
            error!("Unparseable respin relay response ({}): {}", status, e);
            RespinError::Unavailable
        })?;

        if !status.is_success() {
            return match body.error {
                Some(message) => Err(RespinError::Relay(message)),
                None => {
                    error!("Respin relay failed with status {}", status);
                    Err(RespinError::Unavailable)
                }
            };
        }

        match body.content.filter(|c| !c.is_empty()) {
            Some(content) => Ok(content),
            None => Err(RespinError::EmptyResponse),
        }
    }
}

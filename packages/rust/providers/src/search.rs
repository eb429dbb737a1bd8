//! Search-augmented chat service (Perplexity-compatible).

use async_trait::async_trait;
use enricher_shared::{Result, SearchConfig};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::http::{ChatMessage, build_client, read_completion, transport_error};
use crate::retry::{RetryPolicy, ServiceError};

/// A chat service that grounds its answers in a web search.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Service name used in logs and errors.
    fn name(&self) -> &str {
        "search"
    }

    fn retry_policy(&self) -> &RetryPolicy;

    /// One attempt: send `prompt`, optionally restricting search to `domain_filter`.
    async fn try_response(
        &self,
        prompt: &str,
        domain_filter: Option<&[String]>,
    ) -> std::result::Result<String, ServiceError>;
}

/// Ask the search service, retrying transient failures per its policy.
pub async fn get_response(
    service: &dyn SearchService,
    prompt: &str,
    domain_filter: Option<&[String]>,
) -> Result<String> {
    service
        .retry_policy()
        .run(service.name(), || service.try_response(prompt, domain_filter))
        .await
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    search_domain_filter: Option<&'a [String]>,
}

/// Client for `POST {base_url}/chat/completions` on a Perplexity-style API.
pub struct PerplexityClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl PerplexityClient {
    pub fn new(config: &SearchConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            retry: RetryPolicy::from(&config.retry),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl SearchService for PerplexityClient {
    fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn try_response(
        &self,
        prompt: &str,
        domain_filter: Option<&[String]>,
    ) -> std::result::Result<String, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = SearchRequest {
            model: &self.model,
            temperature: 0.0,
            messages: [ChatMessage::user(prompt)],
            search_domain_filter: domain_filter,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let completion = read_completion(&url, response).await?;
        let message = completion
            .first_message()
            .ok_or_else(|| ServiceError::transient(format!("{url}: completion has no choices")))?;

        // A blank answer means nothing was found, which the prompts ask for.
        let content = message.content.as_deref().unwrap_or_default();
        if content.trim().is_empty() {
            debug!("search returned a blank answer");
        } else {
            debug!(chars = content.len(), "search response received");
        }
        Ok(content.to_string())
    }
}

//! Structured-output generative service (OpenAI-compatible).
//!
//! Structured calls send a strict JSON schema as `response_format` and parse the
//! returned content into the caller's type. Output that is not valid JSON or
//! does not deserialize into the requested type counts as a transient failure
//! and is retried.

use async_trait::async_trait;
use enricher_shared::{GenerativeConfig, Result};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::http::{ChatCompletion, ChatMessage, build_client, read_completion, transport_error};
use crate::retry::{RetryPolicy, ServiceError};

/// A named JSON schema describing the expected response object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// A generative text model with schema-constrained output.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Service name used in logs and errors.
    fn name(&self) -> &str {
        "generative"
    }

    fn retry_policy(&self) -> &RetryPolicy;

    /// One attempt at a schema-constrained response, returned as raw JSON.
    async fn try_structured(
        &self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> std::result::Result<Value, ServiceError>;

    /// One attempt at a free-text response.
    async fn try_plain(&self, prompt: &str) -> std::result::Result<String, ServiceError>;
}

/// Request a typed response, retrying transient and parse failures per the service policy.
pub async fn get_structured_response<T: DeserializeOwned>(
    service: &dyn GenerativeService,
    prompt: &str,
    schema: &ResponseSchema,
) -> Result<T> {
    service
        .retry_policy()
        .run(service.name(), move || async move {
            let value = service.try_structured(prompt, schema).await?;
            serde_json::from_value::<T>(value).map_err(|e| {
                ServiceError::transient(format!(
                    "response does not match schema `{}`: {e}",
                    schema.name
                ))
            })
        })
        .await
}

/// Request a free-text response, retrying transient failures per the service policy.
pub async fn get_plain_response(service: &dyn GenerativeService, prompt: &str) -> Result<String> {
    service
        .retry_policy()
        .run(service.name(), || service.try_plain(prompt))
        .await
}

#[derive(Debug, Serialize)]
struct GenerativeRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a Value,
}

/// Client for `POST {base_url}/chat/completions` on an OpenAI-style API.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(config: &GenerativeConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
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

    async fn complete(
        &self,
        prompt: &str,
        response_format: Option<ResponseFormat<'_>>,
    ) -> std::result::Result<ChatCompletion, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = GenerativeRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [ChatMessage::user(prompt)],
            response_format,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        read_completion(&url, response).await
    }
}

#[async_trait]
impl GenerativeService for OpenAiClient {
    fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    #[instrument(skip_all, fields(model = %self.model, schema = %schema.name))]
    async fn try_structured(
        &self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> std::result::Result<Value, ServiceError> {
        let format = ResponseFormat {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: &schema.name,
                strict: true,
                schema: &schema.schema,
            },
        };
        let completion = self.complete(prompt, Some(format)).await?;

        if let Some(refusal) = completion
            .first_message()
            .and_then(|m| m.refusal.as_deref())
            .filter(|r| !r.trim().is_empty())
        {
            return Err(ServiceError::terminal(format!("model refused: {refusal}")));
        }

        let content = completion
            .content()
            .ok_or_else(|| ServiceError::transient("empty structured output"))?;
        debug!(chars = content.len(), "structured response received");

        serde_json::from_str(content)
            .map_err(|e| ServiceError::transient(format!("structured output is not JSON: {e}")))
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn try_plain(&self, prompt: &str) -> std::result::Result<String, ServiceError> {
        let completion = self.complete(prompt, None).await?;
        completion
            .content()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::transient("empty completion content"))
    }
}

//! HTTP plumbing shared by the chat-completions clients.

use std::time::Duration;

use enricher_shared::{EnricherError, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::retry::ServiceError;

/// User-Agent string for outgoing requests.
const USER_AGENT: &str = concat!("enricher/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client with the given request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EnricherError::Network(format!("failed to build HTTP client: {e}")))
}

/// Whether a failed HTTP status is worth retrying.
pub(crate) fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Map a transport error. All of them are transient.
pub(crate) fn transport_error(url: &str, err: reqwest::Error) -> ServiceError {
    ServiceError::transient(format!("{url}: {err}"))
}

/// Check the status of a chat-completions response and decode its body.
///
/// `204 No Content` and retryable statuses are transient; any other
/// non-success status is terminal.
pub(crate) async fn read_completion(
    url: &str,
    response: Response,
) -> std::result::Result<ChatCompletion, ServiceError> {
    let status = response.status();

    if status == StatusCode::NO_CONTENT {
        return Err(ServiceError::transient(format!("{url}: 204 empty response")));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let msg = format!("{url}: HTTP {status}: {}", truncate(&body, 300));
        return Err(if is_retryable(status) {
            ServiceError::Transient(msg)
        } else {
            ServiceError::Terminal(msg)
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| transport_error(url, e))?;
    if body.trim().is_empty() {
        return Err(ServiceError::transient(format!("{url}: empty response body")));
    }

    serde_json::from_str(&body)
        .map_err(|e| ServiceError::transient(format!("{url}: malformed completion: {e}")))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Chat-completions wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatMessage<'a> {
    pub fn user(content: &'a str) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Choice {
    pub message: AssistantMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

impl ChatCompletion {
    /// First choice's message, if any.
    pub fn first_message(&self) -> Option<&AssistantMessage> {
        self.choices.first().map(|c| &c.message)
    }

    /// First choice's non-blank content.
    pub fn content(&self) -> Option<&str> {
        self.first_message()
            .and_then(|m| m.content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::REQUEST_TIMEOUT));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn completion_content_skips_blank() {
        let c: ChatCompletion = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  "}}]}"#,
        )
        .unwrap();
        assert_eq!(c.content(), None);

        let c: ChatCompletion = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Main St 1"}}]}"#,
        )
        .unwrap();
        assert_eq!(c.content(), Some("Main St 1"));

        let c: ChatCompletion = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(c.first_message().is_none());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}

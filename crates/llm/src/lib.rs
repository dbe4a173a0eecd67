//! Upstream LLM access.
//!
//! One trait, one production client.  The wrapper speaks the
//! OpenAI-compatible `/chat/completions` shape: single-turn user message in,
//! first choice's content out.  Callers pick transient-vs-permanent handling
//! off [`LlmError`]; the routing path retries a transient failure once, the
//! memory pipeline never retries.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream rejected the API key")]
    Auth,
    #[error("upstream returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("upstream transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream response carried no message content")]
    EmptyChoice,
}

impl LlmError {
    /// Whether a single immediate retry is worth attempting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Auth | Self::EmptyChoice => false,
        }
    }
}

/// Sampling parameters for one completion call.
#[derive(Debug, Clone, Copy)]
pub struct ChatParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatParams {
    /// Parameters used for user-facing generation and the memory pipeline.
    pub fn generation() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

impl Default for ChatParams {
    fn default() -> Self {
        Self::generation()
    }
}

/// Single-turn chat completion against a named upstream model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        params: ChatParams,
    ) -> Result<String, LlmError>;
}

// ── Wire shapes ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [RequestMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_choice_content(response: ChatCompletionResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.is_empty())
        .ok_or(LlmError::EmptyChoice)
}

// ── Production client ─────────────────────────────────────────────────────────

/// reqwest-backed client for an OpenAI-compatible provider endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        })
    }

    fn classify(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Transport(error)
        }
    }
}

#[async_trait]
impl ChatModel for UpstreamClient {
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        params: ChatParams,
    ) -> Result<String, LlmError> {
        let endpoint = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatCompletionRequest {
            model,
            messages: [RequestMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .http
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(LlmError::Auth);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| self.classify(e))?;
        first_choice_content(parsed)
    }
}

/// Run one completion, retrying exactly once when the first failure is
/// transient.  Used by the rewriter/router path; memory sub-tasks call the
/// client directly.
pub async fn complete_with_retry(
    chat: &dyn ChatModel,
    model: &str,
    prompt: &str,
    params: ChatParams,
) -> Result<String, LlmError> {
    match chat.complete(model, prompt, params).await {
        Ok(content) => Ok(content),
        Err(error) if error.is_transient() => {
            warn!(%error, model, "transient upstream failure — retrying once");
            chat.complete(model, prompt, params).await
        }
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn generation_params_match_the_routing_contract() {
        let params = ChatParams::generation();
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.max_tokens, 1024);
    }

    #[test]
    fn transience_classification() {
        assert!(LlmError::Timeout(Duration::from_secs(5)).is_transient());
        assert!(
            LlmError::Api {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            LlmError::Api {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !LlmError::Api {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!LlmError::Auth.is_transient());
        assert!(!LlmError::EmptyChoice.is_transient());
    }

    #[test]
    fn request_body_has_single_user_turn() -> anyhow::Result<()> {
        let request = ChatCompletionRequest {
            model: "glm-4",
            messages: [RequestMessage {
                role: "user",
                content: "ping",
            }],
            temperature: 0.7,
            max_tokens: 1024,
        };
        let body: serde_json::Value = serde_json::from_str(&serde_json::to_string(&request)?)?;
        assert_eq!(body["model"], "glm-4");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "ping");
        assert_eq!(body["max_tokens"], 1024);
        Ok(())
    }

    #[test]
    fn first_choice_extraction() -> anyhow::Result<()> {
        let ok: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"pong"}}]}"#,
        )?;
        assert_eq!(first_choice_content(ok).ok(), Some("pong".to_string()));

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#)?;
        assert!(matches!(
            first_choice_content(empty),
            Err(LlmError::EmptyChoice)
        ));

        let null_content: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#)?;
        assert!(matches!(
            first_choice_content(null_content),
            Err(LlmError::EmptyChoice)
        ));
        Ok(())
    }

    struct FlakyModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for FlakyModel {
        async fn complete(
            &self,
            _model: &str,
            _prompt: &str,
            _params: ChatParams,
        ) -> Result<String, LlmError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LlmError::Api {
                    status: 500,
                    body: "boom".to_string(),
                })
            } else {
                Ok("recovered".to_string())
            }
        }
    }

    struct AlwaysAuthFail;

    #[async_trait]
    impl ChatModel for AlwaysAuthFail {
        async fn complete(
            &self,
            _model: &str,
            _prompt: &str,
            _params: ChatParams,
        ) -> Result<String, LlmError> {
            Err(LlmError::Auth)
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_one_transient_failure() {
        let model = FlakyModel {
            calls: AtomicUsize::new(0),
        };
        let result = complete_with_retry(&model, "glm-4", "hi", ChatParams::generation()).await;
        assert_eq!(result.ok(), Some("recovered".to_string()));
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let result =
            complete_with_retry(&AlwaysAuthFail, "glm-4", "hi", ChatParams::generation()).await;
        assert!(matches!(result, Err(LlmError::Auth)));
    }
}

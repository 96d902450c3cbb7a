//! Remote language model access.
//!
//! Both pipeline stages that talk to the model (translation and synthesis)
//! make exactly one system + user exchange through [`LanguageModel`].

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use ingres_core::config::LlmConfig;
use ingres_core::error::IngresError;

use crate::error::ChatError;

/// One single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A chat-style language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one exchange and return the model's text reply.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(base_url: &str, model: &str, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
        }
    }

    /// Build a client from configuration, reading the key from the
    /// environment. Fails when the key is missing.
    pub fn from_config(config: &LlmConfig) -> Result<Self, IngresError> {
        let api_key = config.api_key()?;
        Ok(Self::new(&config.base_url, &config.model, api_key))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[async_trait]
impl LanguageModel for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": &request.system},
                {"role": "user", "content": &request.user}
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::LlmError(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::LlmError(format!("API error {}: {}", status, text)));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::LlmError(format!("malformed response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChatError::LlmError("response contained no choices".to_string()))?;

        debug!(model = %self.model, chars = content.len(), "Model reply received");
        Ok(content)
    }
}

/// Scripted model for tests: replies are consumed in order, and every
/// request is recorded.
#[derive(Debug, Default)]
pub struct MockLanguageModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, reply: Result<String, String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError> {
        self.requests
            .lock()
            .map_err(|e| ChatError::Internal(format!("mock lock poisoned: {}", e)))?
            .push(request.clone());

        let next = self
            .replies
            .lock()
            .map_err(|e| ChatError::Internal(format!("mock lock poisoned: {}", e)))?
            .pop_front();

        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(ChatError::LlmError(message)),
            None => Err(ChatError::LlmError("no scripted reply left".to_string())),
        }
    }
}

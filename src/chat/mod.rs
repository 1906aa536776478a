//! Client for an OpenAI-compatible chat completions endpoint.

mod wire;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::config::ChatConfig;
use wire::{CompletionRequest, CompletionResponse, WireMessage};

#[derive(thiserror::Error, Debug)]
pub enum ChatError {
    /// Connection failure or non-success status from the completion API.
    #[error("transport error: {0}")]
    Transport(String),

    /// The completion API answered with a body we could not read a reply from.
    #[error("unexpected response: {0}")]
    Format(String),
}

#[derive(Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    config: ChatConfig,
}

impl CompletionClient {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Sends `message` as the whole conversation and returns the first completion's text.
    pub async fn complete(&self, message: &str) -> Result<String, ChatError> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages: vec![WireMessage {
                role: "user",
                content: message,
            }],
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(self.build_headers()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Transport(format!("status {}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|e| ChatError::Format(e.to_string()))?;

        parsed
            .into_first_text()
            .ok_or_else(|| ChatError::Format("response contained no choices".to_string()))
    }

    fn build_headers(&self) -> Result<HeaderMap, ChatError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", self.config.api_key))?,
        );
        headers.insert("http-referer", header_value(&self.config.referer)?);
        headers.insert("x-title", header_value(&self.config.title)?);
        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ChatError> {
    HeaderValue::from_str(value)
        .map_err(|e| ChatError::Transport(format!("invalid header value: {}", e)))
}

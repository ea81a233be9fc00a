//! Chat-completion clients.
//!
//! [`LlmClient::complete`] sends a message list and returns the reply text.
//! Two backends:
//!
//! - `openai`: `POST {base_url}/chat/completions` on any OpenAI-compatible
//!   server (OpenAI, Groq, vLLM, llama.cpp server).
//! - `ollama`: `POST {base_url}/api/chat` with `stream: false`.
//!
//! Transient failures (429, 5xx, network) are retried `max_retries` times
//! with exponential backoff; anything left over is
//! [`RepolensError::CollaboratorUnavailable`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use repolens_core::error::RepolensError;

use crate::config::LlmConfig;

const COLLABORATOR: &str = "LLM";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[LlmMessage], temperature: f32) -> Result<String>;
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, messages: &[LlmMessage], temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let req = OpenAiChatRequest {
            model: &self.model,
            messages,
            temperature,
        };

        let body: OpenAiChatResponse = send_with_retry(self.max_retries, || {
            let mut builder = self.client.post(&url).json(&req);
            if let Some(key) = &self.api_key {
                builder = builder.header("Authorization", format!("Bearer {}", key));
            }
            builder
        })
        .await?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: LlmMessage,
}

pub struct OllamaChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl OllamaChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaChatClient {
    async fn complete(&self, messages: &[LlmMessage], temperature: f32) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let req = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions { temperature },
        };

        let body: OllamaChatResponse =
            send_with_retry(self.max_retries, || self.client.post(&url).json(&req)).await?;
        Ok(body.message.content.trim().to_string())
    }
}

// ─── Shared ──────────────────────────────────────────────

fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// Send the request built by `build`, retrying transient failures, and
/// decode the JSON body.
async fn send_with_retry<T, F>(max_retries: u32, build: F) -> Result<T>
where
    T: serde::de::DeserializeOwned + Send,
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let mut last_err = String::new();

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return resp.json::<T>().await.map_err(|e| {
                        RepolensError::unavailable(COLLABORATOR, format!("unreadable reply: {}", e))
                            .into()
                    });
                }
                let body = resp.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!(attempt, %status, "LLM request failed, retrying");
                    last_err = format!("{}: {}", status, body);
                    continue;
                }
                return Err(
                    RepolensError::unavailable(COLLABORATOR, format!("{}: {}", status, body)).into(),
                );
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "LLM connection failed, retrying");
                last_err = e.to_string();
            }
        }
    }

    Err(RepolensError::unavailable(COLLABORATOR, last_err).into())
}

/// Build the [`LlmClient`] named by `config.provider`.
pub fn create_llm(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiChatClient::new(config)?)),
        "ollama" => Ok(Box::new(OllamaChatClient::new(config)?)),
        other => bail!("Unknown LLM provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_request_shape() {
        let messages = [LlmMessage::user("hi")];
        let req = OpenAiChatRequest {
            model: "m",
            messages: &messages,
            temperature: 0.25,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.25);
    }

    #[test]
    fn test_ollama_request_is_not_streaming() {
        let messages = [LlmMessage::user("s")];
        let req = OllamaChatRequest {
            model: "m",
            messages: &messages,
            stream: false,
            options: OllamaOptions { temperature: 0.5 },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.5);
    }

    #[test]
    fn test_openai_reply_with_null_content() {
        let body: OpenAiChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(body.choices[0].message.content.is_none());
    }

    #[test]
    fn test_create_llm_rejects_unknown() {
        let config = LlmConfig {
            provider: "bard".into(),
            ..LlmConfig::default()
        };
        assert!(create_llm(&config).is_err());
    }
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod prompt;
pub mod provider;

pub use prompt::*;
pub use provider::*;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Connect,
    Status(u16),
}

/// Typed transport/status failure attached to client errors so callers
/// can classify without parsing message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// Blocking client for an OpenAI-compatible chat API, hosted or local.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Self::build(base_url, model, None, timeout)
    }

    pub fn with_api_key(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::build(base_url, model, Some(api_key.to_owned()), timeout)
    }

    fn build(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("llm base_url must not be empty");
        }
        if model.trim().is_empty() {
            bail!("llm model must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            model: model.to_owned(),
            api_key,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_owned();
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn list_models(&self) -> Result<Vec<String>> {
        let mut request = self.http.get(format!("{}/models", self.base_url));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, &error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ModelsResponse = response.json().context("decode model list")?;
        Ok(parsed.data.into_iter().map(|model| model.id).collect())
    }

    pub fn chat_complete(&self, messages: &[Message]) -> Result<String> {
        let request_body = ChatRequest::new(&self.model, messages);
        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request_body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, &error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ChatCompletionResponse = response.json().context("decode chat response")?;
        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("no choices in chat response"))?;
        Ok(content)
    }
}

fn connection_error(base_url: &str, error: &reqwest::Error) -> anyhow::Error {
    anyhow::Error::new(ApiError {
        kind: ApiErrorKind::Connect,
        message: format!("cannot reach {base_url} -- is the server running? ({error})"),
    })
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    let message = if let Ok(parsed) = serde_json::from_str::<OpenAiErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        format!("server error ({}): {}", status.as_u16(), error.message)
    } else if let Ok(parsed) = serde_json::from_str::<OllamaErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.is_empty()
    {
        format!("server error ({}): {}", status.as_u16(), error)
    } else if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        format!("server error ({}): {}", status.as_u16(), body)
    } else {
        format!("server returned {}", status.as_u16())
    };

    anyhow::Error::new(ApiError {
        kind: ApiErrorKind::Status(status.as_u16()),
        message,
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    temperature: f32,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, messages: &'a [Message]) -> Self {
        Self {
            model,
            messages: messages
                .iter()
                .map(|message| ChatMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            stream: false,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelRow>,
}

#[derive(Debug, Deserialize)]
struct ModelRow {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: Option<OpenAiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorEnvelope {
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{ApiErrorKind, Client, Message, Role, clean_error_response};
    use anyhow::Result;
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn client_rejects_empty_base_url_and_model() {
        assert!(Client::new("", "qwen3", Duration::from_secs(1)).is_err());
        assert!(Client::new("http://localhost:11434/v1", " ", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn client_trims_trailing_slashes() -> Result<()> {
        let client = Client::new("http://localhost:11434/v1///", "qwen3", Duration::from_secs(1))?;
        assert_eq!(client.base_url(), "http://localhost:11434/v1");
        Ok(())
    }

    #[test]
    fn chat_request_serializes_roles() -> Result<()> {
        let messages = [Message {
            role: Role::User,
            content: "hello".to_owned(),
        }];
        let request = super::ChatRequest::new("qwen3", &messages);
        let encoded = serde_json::to_string(&request)?;
        assert!(encoded.contains("\"role\":\"user\""));
        assert!(encoded.contains("\"stream\":false"));
        Ok(())
    }

    #[test]
    fn clean_error_response_extracts_openai_message() {
        let error = clean_error_response(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        );
        let api = error
            .downcast_ref::<super::ApiError>()
            .expect("api error should be attached");
        assert_eq!(api.kind, ApiErrorKind::Status(401));
        assert!(api.to_string().contains("Incorrect API key provided"));
    }

    #[test]
    fn clean_error_response_extracts_ollama_message() {
        let error = clean_error_response(
            StatusCode::NOT_FOUND,
            r#"{"error":"model 'qwen3' not found"}"#,
        );
        assert!(error.to_string().contains("model 'qwen3' not found"));
    }

    #[test]
    fn clean_error_response_falls_back_to_status_for_noise_bodies() {
        let error = clean_error_response(StatusCode::BAD_GATEWAY, "<html>giant body</html>{");
        assert!(error.to_string().contains("server returned 502"));
    }
}

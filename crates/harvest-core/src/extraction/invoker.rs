//! Model service client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::prompt::{Message, PagePrompt};
use crate::error::ModelError;
use crate::models::config::LlmConfig;

/// Text-in/text-out access to a language model.
#[async_trait]
pub trait ModelInvoker {
    /// Send one page prompt and return the raw reply text.
    async fn invoke(&self, prompt: &PagePrompt) -> Result<String, ModelError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client (OpenRouter by default).
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsClient {
    /// Build a client from explicit configuration.
    pub fn new(config: &LlmConfig) -> Result<Self, ModelError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ModelError::Config("API key is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", api_key))?);
        for (name, value) in [("http-referer", &config.referer), ("x-title", &config.title)] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                headers.insert(HeaderName::from_static(name), header_value(value)?);
            }
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("pdfharvest/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ModelError> {
    HeaderValue::from_str(value).map_err(|e| ModelError::Config(format!("invalid header value: {}", e)))
}

#[async_trait]
impl ModelInvoker for ChatCompletionsClient {
    async fn invoke(&self, prompt: &PagePrompt) -> Result<String, ModelError> {
        let request = ChatRequest {
            model: &self.model,
            messages: &prompt.messages,
            temperature: self.temperature,
        };

        debug!(page = prompt.page, model = %self.model, "Calling model");

        let response = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let content = reply_content(&body)?;

        info!(page = prompt.page, response_length = content.len(), "Model response received");
        Ok(content)
    }
}

/// Pull the first choice's text out of a chat completions body.
///
/// A null `content` is an empty reply, not an error.
fn reply_content(body: &str) -> Result<String, ModelError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Malformed(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::Malformed("response has no choices".to_string()))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::table::OutputFormat;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reply_content() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"page_number,a\n1,b"}}]}"#;
        assert_eq!(reply_content(body).unwrap(), "page_number,a\n1,b");
    }

    #[test]
    fn test_reply_null_content_is_empty() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(reply_content(body).unwrap(), "");
    }

    #[test]
    fn test_reply_without_choices_is_malformed() {
        assert!(matches!(reply_content(r#"{"choices":[]}"#), Err(ModelError::Malformed(_))));
        assert!(matches!(reply_content("<html>"), Err(ModelError::Malformed(_))));
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = LlmConfig::default();
        assert!(matches!(ChatCompletionsClient::new(&config), Err(ModelError::Config(_))));

        let blank = LlmConfig {
            api_key: Some("   ".to_string()),
            ..LlmConfig::default()
        };
        assert!(ChatCompletionsClient::new(&blank).is_err());
    }

    #[test]
    fn test_client_endpoint() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "https://example.test/v1/".to_string(),
            ..LlmConfig::default()
        };
        let client = ChatCompletionsClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "https://example.test/v1/chat/completions");
        assert_eq!(client.temperature, 0.0);
    }

    #[test]
    fn test_request_serialization() {
        let prompt = crate::extraction::prompt::build_prompt("q", 1, "text", OutputFormat::Csv, true);
        let request = ChatRequest {
            model: "m",
            messages: &prompt.messages,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
    }
}

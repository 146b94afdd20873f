//! OpenAI-compatible chat completions and image generation client.
//!
//! Works against any endpoint exposing `/chat/completions` and
//! `/images/generations` (OpenAI, OpenRouter, local gateways).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{AdapterError, Result};
use crate::http::{build_client, success_body};

pub const API_KEY_ENV: &str = "CANDIDATES_LLM_API_KEY";

/// Model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Bearer token
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Chat model id
    pub model: String,
    /// Image model id
    pub image_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            base_url: std::env::var("CANDIDATES_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            api_key: std::env::var(API_KEY_ENV).ok(),
            model: std::env::var("CANDIDATES_LLM_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
            image_model: std::env::var("CANDIDATES_IMAGE_MODEL")
                .unwrap_or_else(|_| "dall-e-3".to_string()),
        }
    }
}

impl LlmConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(base_url: &str, model: &str) -> Self {
        LlmConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: model.to_string(),
            image_model: "dall-e-3".to_string(),
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: Option<String>,
}

/// Extract the first choice's text from a chat completions body.
pub(crate) fn first_choice(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AdapterError::Malformed("chat response had no content".to_string()))
}

/// Extract the first image URL, if the endpoint produced one.
pub(crate) fn first_image_url(body: &str) -> Result<Option<String>> {
    let parsed: ImageResponse = serde_json::from_str(body)?;
    Ok(parsed
        .data
        .into_iter()
        .find_map(|d| d.url)
        .filter(|u| !u.trim().is_empty()))
}

/// Chat and image client
#[derive(Debug, Clone)]
pub struct ChatClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        Ok(ChatClient {
            config,
            http: build_client()?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmConfig::from_env())
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or(AdapterError::MissingApiKey(API_KEY_ENV))
    }

    async fn post(&self, path: &str, body: &impl Serialize, timeout: Duration) -> Result<String> {
        let response = self
            .http
            .post(self.config.endpoint(path))
            .bearer_auth(self.api_key()?)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        success_body(response).await
    }

    async fn chat(
        &self,
        messages: Vec<Value>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature,
            stream: false,
        };
        let body = self.post("chat/completions", &request, timeout).await?;
        let content = first_choice(&body)?;
        debug!(model = %self.config.model, chars = content.len(), "chat completion received");
        Ok(content)
    }

    /// System + user prompt, returning the reply text.
    pub async fn complete(&self, system: &str, user: &str, timeout: Duration) -> Result<String> {
        let messages = vec![
            json!({ "role": "system", "content": system }),
            json!({ "role": "user", "content": user }),
        ];
        self.chat(messages, 0.7, timeout).await
    }

    /// Ask a vision-capable model about an image.
    pub async fn describe_image(
        &self,
        prompt: &str,
        image_url: &str,
        timeout: Duration,
    ) -> Result<String> {
        let messages = vec![json!({
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": image_url } }
            ]
        })];
        self.chat(messages, 0.0, timeout).await
    }

    /// Generate one image, returning its URL.
    pub async fn generate_image(&self, prompt: &str, timeout: Duration) -> Result<Option<String>> {
        let request = ImageRequest {
            model: &self.config.image_model,
            prompt,
            n: 1,
            size: "1024x1024",
        };
        let body = self.post("images/generations", &request, timeout).await?;
        first_image_url(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_choice_reads_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(first_choice(body).unwrap(), "hello");
    }

    #[test]
    fn test_empty_choices_is_malformed() {
        let err = first_choice(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, AdapterError::Malformed(_)));

        let err = first_choice(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap_err();
        assert!(matches!(err, AdapterError::Malformed(_)));
    }

    #[test]
    fn test_image_url_extraction() {
        let body = r#"{"created":1,"data":[{"url":"https://img.example/a.png"}]}"#;
        assert_eq!(
            first_image_url(body).unwrap().as_deref(),
            Some("https://img.example/a.png")
        );
        assert_eq!(first_image_url(r#"{"data":[]}"#).unwrap(), None);
        assert_eq!(first_image_url(r#"{"data":[{"url":"  "}]}"#).unwrap(), None);
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = LlmConfig::new("https://api.example.com/v1/", "m");
        assert_eq!(
            config.endpoint("chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let client = ChatClient::new(LlmConfig::new("http://127.0.0.1:9", "m")).unwrap();
        let err = client
            .complete("system", "user", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::MissingApiKey(API_KEY_ENV)));
    }
}

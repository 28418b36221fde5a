use crate::config::ProviderConfig;
use crate::error::ImportError;
use crate::model::UsageStats;
use crate::providers::{truncate_body, Completion, CompletionRequest, LlmProvider};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Any OpenAI-compatible chat completions endpoint (OpenAI itself, Groq, proxies)
pub struct OpenAIProvider {
    name: &'static str,
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider from configuration
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, ImportError> {
        Self::from_config("openai", "OPENAI_API_KEY", OPENAI_BASE_URL, config, timeout)
    }

    /// Groq's hosted models through its OpenAI-compatible API
    pub fn groq(config: &ProviderConfig, timeout: Duration) -> Result<Self, ImportError> {
        Self::from_config("groq", "GROQ_API_KEY", GROQ_BASE_URL, config, timeout)
    }

    fn from_config(
        name: &'static str,
        key_var: &str,
        default_base_url: &str,
        config: &ProviderConfig,
        timeout: Duration,
    ) -> Result<Self, ImportError> {
        // Try config first, then fall back to environment variable
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(key_var).ok())
            .ok_or_else(|| {
                ImportError::BuilderError(format!("{key_var} not found in config or environment"))
            })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url.to_string());

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImportError::BuilderError(format!("Failed to create HTTP client: {e}")))?;

        Ok(OpenAIProvider {
            name,
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        OpenAIProvider {
            name: "openai",
            client: Client::new(),
            api_key,
            base_url,
            model,
            temperature: 0.0,
            max_tokens: 2000,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn provider_name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ImportError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": request.system},
                    {"role": "user", "content": request.user}
                ],
                "temperature": self.temperature,
                "max_tokens": self.max_tokens
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImportError::ExtractionTransport(format!(
                "{} returned {}: {}",
                self.name,
                status,
                truncate_body(&body)
            )));
        }

        let response_body: Value = response.json().await?;
        debug!("{:?}", response_body);

        let content = response_body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ImportError::ExtractionTransport(format!(
                    "Failed to extract content from {} response",
                    self.name
                ))
            })?
            .to_string();

        let usage = &response_body["usage"];
        Ok(Completion {
            content,
            usage: UsageStats {
                requests: 1,
                prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
                completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
                total_tokens: usage["total_tokens"].as_u64().unwrap_or(0),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "Extract recipes.".to_string(),
            user: "Whisk the matcha.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_complete() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer fake_api_key")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-4o-mini"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [{"message": {"content": "{\"name\": \"Matcha\"}"}}],
                    "usage": {"prompt_tokens": 120, "completion_tokens": 12, "total_tokens": 132}
                }"#,
            )
            .create_async()
            .await;

        let provider = OpenAIProvider::with_base_url(
            "fake_api_key".to_string(),
            server.url(),
            "gpt-4o-mini".to_string(),
        );

        let completion = provider.complete(&request()).await.unwrap();
        assert_eq!(completion.content, r#"{"name": "Matcha"}"#);
        assert_eq!(completion.usage.requests, 1);
        assert_eq!(completion.usage.prompt_tokens, 120);
        assert_eq!(completion.usage.total_tokens, 132);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_auth_failure_is_transport_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"message": "Invalid API Key"}}"#)
            .create_async()
            .await;

        let provider = OpenAIProvider::with_base_url(
            "bad_key".to_string(),
            server.url(),
            "gpt-4o-mini".to_string(),
        );

        let err = provider.complete(&request()).await.unwrap_err();
        assert!(matches!(err, ImportError::ExtractionTransport(_)));
        assert!(err.to_string().contains("401"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_content_is_transport_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let provider = OpenAIProvider::with_base_url(
            "fake_api_key".to_string(),
            server.url(),
            "gpt-4o-mini".to_string(),
        );

        let err = provider.complete(&request()).await.unwrap_err();
        assert!(matches!(err, ImportError::ExtractionTransport(_)));
    }

    #[test]
    fn test_groq_defaults() {
        let config = ProviderConfig {
            enabled: true,
            model: "deepseek-r1-distill-llama-70b".to_string(),
            temperature: 0.0,
            max_tokens: 4000,
            api_key: Some("gsk-test".to_string()),
            base_url: None,
        };
        let provider = OpenAIProvider::groq(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(provider.provider_name(), "groq");
        assert_eq!(provider.base_url, GROQ_BASE_URL);
        assert_eq!(provider.model(), "deepseek-r1-distill-llama-70b");
    }
}

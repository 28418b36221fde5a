use crate::config::ProviderConfig;
use crate::error::ImportError;
use crate::model::UsageStats;
use crate::providers::{truncate_body, Completion, CompletionRequest, LlmProvider};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider from configuration
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, ImportError> {
        // Try config first, then fall back to environment variable
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                ImportError::BuilderError(
                    "ANTHROPIC_API_KEY not found in config or environment".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImportError::BuilderError(format!("Failed to create HTTP client: {e}")))?;

        Ok(AnthropicProvider {
            client,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        AnthropicProvider {
            client: Client::new(),
            api_key,
            base_url,
            model,
            temperature: 0.0,
            max_tokens: 4000,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ImportError> {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
                "system": request.system,
                "messages": [
                    {
                        "role": "user",
                        "content": request.user
                    }
                ]
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImportError::ExtractionTransport(format!(
                "anthropic returned {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        let response_body: Value = response.json().await?;
        debug!("{:?}", response_body);

        let content = response_body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                ImportError::ExtractionTransport(
                    "Failed to extract content from Anthropic response".to_string(),
                )
            })?
            .to_string();

        let input_tokens = response_body["usage"]["input_tokens"].as_u64().unwrap_or(0);
        let output_tokens = response_body["usage"]["output_tokens"].as_u64().unwrap_or(0);

        Ok(Completion {
            content,
            usage: UsageStats {
                requests: 1,
                prompt_tokens: input_tokens,
                completion_tokens: output_tokens,
                total_tokens: input_tokens + output_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_anthropic_complete() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "content": [{"type": "text", "text": "No recipe data found"}],
                    "usage": {"input_tokens": 40, "output_tokens": 6}
                }"#,
            )
            .create_async()
            .await;

        let provider = AnthropicProvider::with_base_url(
            "test-key".to_string(),
            server.url(),
            "claude-3-5-haiku-latest".to_string(),
        );
        let completion = provider
            .complete(&CompletionRequest {
                system: "system".to_string(),
                user: "user".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(completion.content, "No recipe data found");
        assert_eq!(completion.usage.total_tokens, 46);
        mock.assert_async().await;
    }

    #[test]
    fn test_provider_name() {
        let config = ProviderConfig {
            enabled: true,
            model: "claude-3-5-haiku-latest".to_string(),
            temperature: 0.0,
            max_tokens: 4000,
            api_key: Some("test-key".to_string()),
            base_url: None,
        };

        let provider = AnthropicProvider::new(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(provider.provider_name(), "anthropic");
        assert_eq!(provider.base_url, ANTHROPIC_BASE_URL);
    }
}

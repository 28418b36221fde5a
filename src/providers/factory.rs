use crate::config::{AppConfig, ProviderConfig};
use crate::error::ImportError;
use crate::providers::{AnthropicProvider, LlmProvider, OpenAIProvider};
use std::sync::Arc;
use std::time::Duration;

pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider instance from configuration
    pub fn create(
        provider_name: &str,
        config: &ProviderConfig,
        timeout: Duration,
    ) -> Result<Arc<dyn LlmProvider>, ImportError> {
        // Validate that provider is enabled
        if !config.enabled {
            return Err(ImportError::BuilderError(format!(
                "Provider '{}' is not enabled in configuration",
                provider_name
            )));
        }

        match provider_name {
            "groq" => Ok(Arc::new(OpenAIProvider::groq(config, timeout)?)),
            "openai" => Ok(Arc::new(OpenAIProvider::new(config, timeout)?)),
            "anthropic" => Ok(Arc::new(AnthropicProvider::new(config, timeout)?)),
            _ => Err(ImportError::BuilderError(format!(
                "Unknown provider: {} (available: {})",
                provider_name,
                Self::available_providers().join(", ")
            ))),
        }
    }

    /// Get the default provider from configuration
    pub fn get_default_provider(config: &AppConfig) -> Result<Arc<dyn LlmProvider>, ImportError> {
        let provider_name = &config.default_provider;
        let provider_config = config.default_provider_config().ok_or_else(|| {
            ImportError::BuilderError(format!(
                "Default provider '{}' not found in configuration",
                provider_name
            ))
        })?;

        Self::create(
            provider_name,
            &provider_config,
            Duration::from_secs(config.extraction.timeout_secs),
        )
    }

    /// List all available provider names
    pub fn available_providers() -> Vec<&'static str> {
        vec!["groq", "openai", "anthropic"]
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::filter::{FilterConfig, ThresholdType};

/// Top-level configuration for the importer and its HTTP service
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Provider used for extraction when not overridden
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Map of provider name to provider configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub filter: FilterSettings,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            providers: HashMap::new(),
            server: ServerConfig::default(),
            renderer: RendererConfig::default(),
            filter: FilterSettings::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

/// Configuration for a specific AI provider
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Whether this provider is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Model identifier (e.g., "deepseek-r1-distill-llama-70b", "gpt-4o-mini");
    /// empty means the provider's built-in default
    #[serde(default)]
    pub model: String,
    /// Temperature for generation (0.0-1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate per chunk
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// API key for authentication (can also be set via environment variable)
    pub api_key: Option<String>,
    /// Base URL for API endpoint (for custom or proxy endpoints)
    pub base_url: Option<String>,
}

/// HTTP service and admission settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Upper bound on concurrently open render contexts
    #[serde(default = "default_max_concurrent_renders")]
    pub max_concurrent_renders: usize,
    /// How long a request may wait for a render slot before getting 503
    #[serde(default = "default_queue_timeout_secs")]
    pub queue_timeout_secs: u64,
    /// Deadline for a whole import (render + extraction)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_concurrent_renders: default_max_concurrent_renders(),
            queue_timeout_secs: default_queue_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Which engine fetches pages
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderEngine {
    /// Headless Chrome, executes JavaScript
    #[default]
    Chrome,
    /// Plain HTTP GET, no JavaScript
    Http,
}

/// Page renderer settings
#[derive(Debug, Deserialize, Clone)]
pub struct RendererConfig {
    #[serde(default)]
    pub engine: RenderEngine,
    /// Settle delay after navigation before the DOM is captured
    #[serde(default = "default_delay_before_capture")]
    pub delay_before_capture_secs: f64,
    /// Ceiling for navigation; expiry counts as a navigation failure
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Explicit Chrome/Chromium binary, otherwise auto-detected
    pub chrome_executable: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            engine: RenderEngine::default(),
            delay_before_capture_secs: default_delay_before_capture(),
            page_timeout_secs: default_page_timeout_secs(),
            user_agent: default_user_agent(),
            chrome_executable: None,
        }
    }
}

impl RendererConfig {
    pub fn delay_before_capture(&self) -> Duration {
        // max() also maps NaN to zero
        let secs = self
            .delay_before_capture_secs
            .max(0.0)
            .min(MAX_DELAY_BEFORE_CAPTURE_SECS);
        Duration::from_secs_f64(secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

/// Content filter settings as they appear in configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FilterSettings {
    #[serde(default = "default_filter_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub threshold_type: ThresholdType,
    /// Blocks with fewer words are pruned; unset keeps short blocks
    pub min_word_threshold: Option<usize>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            threshold: default_filter_threshold(),
            threshold_type: ThresholdType::default(),
            min_word_threshold: None,
        }
    }
}

impl From<&FilterSettings> for FilterConfig {
    fn from(settings: &FilterSettings) -> Self {
        FilterConfig {
            threshold: settings.threshold,
            threshold_type: settings.threshold_type,
            min_word_threshold: settings.min_word_threshold,
        }
    }
}

/// Extraction client settings
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Maximum estimated tokens per chunk sent to the model
    #[serde(default = "default_chunk_token_threshold")]
    pub chunk_token_threshold: usize,
    /// Fraction of a chunk repeated at the start of the next one
    #[serde(default = "default_overlap_rate")]
    pub overlap_rate: f64,
    /// Chunks of one import that may be in flight at once
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,
    /// Timeout for each completion request in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunk_token_threshold: default_chunk_token_threshold(),
            overlap_rate: default_overlap_rate(),
            max_concurrent_chunks: default_max_concurrent_chunks(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

// Default value functions
fn default_provider() -> String {
    "groq".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_concurrent_renders() -> usize {
    4
}

fn default_queue_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Upper bound for the settle delay before the DOM is captured
const MAX_DELAY_BEFORE_CAPTURE_SECS: f64 = 60.0;

fn default_delay_before_capture() -> f64 {
    2.0
}

fn default_page_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_filter_threshold() -> f64 {
    0.48
}

fn default_chunk_token_threshold() -> usize {
    6000
}

fn default_overlap_rate() -> f64 {
    0.1
}

fn default_max_concurrent_chunks() -> usize {
    3
}

fn default_provider_timeout_secs() -> u64 {
    60
}

/// Provider used when nothing is configured: Groq's hosted reasoning model.
pub fn builtin_provider(name: &str) -> Option<ProviderConfig> {
    let model = match name {
        "groq" => "deepseek-r1-distill-llama-70b",
        "openai" => "gpt-4o-mini",
        "anthropic" => "claude-3-5-haiku-latest",
        _ => return None,
    };
    Some(ProviderConfig {
        enabled: true,
        model: model.to_string(),
        temperature: default_temperature(),
        max_tokens: default_max_tokens(),
        api_key: None,
        base_url: None,
    })
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with BITEBOOK__ prefix
    /// 2. config.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: BITEBOOK__PROVIDERS__GROQ__API_KEY
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            // Optional config file (can be missing)
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("BITEBOOK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Settings for the default provider, falling back to the built-in entry
    pub fn default_provider_config(&self) -> Option<ProviderConfig> {
        let builtin = builtin_provider(&self.default_provider);
        let Some(configured) = self.providers.get(&self.default_provider) else {
            return builtin;
        };

        let mut configured = configured.clone();
        if configured.model.is_empty() {
            if let Some(builtin) = builtin {
                configured.model = builtin.model;
            }
        }
        Some(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(default_provider(), "groq");
        assert_eq!(default_chunk_token_threshold(), 6000);
        assert_eq!(default_page_timeout_secs(), 30);
        assert_eq!(default_delay_before_capture(), 2.0);
        assert!(default_user_agent().starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_empty_toml_is_a_valid_config() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str("", config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.default_provider, "groq");
        assert!(config.providers.is_empty());
        assert_eq!(config.server.max_concurrent_renders, 4);
        assert_eq!(config.renderer.engine, RenderEngine::Chrome);
        assert_eq!(config.filter.threshold_type, ThresholdType::Dynamic);
    }

    #[test]
    fn test_toml_overrides() {
        let toml = r#"
            default_provider = "openai"

            [providers.openai]
            model = "gpt-4o"
            api_key = "sk-test"

            [renderer]
            engine = "http"
            delay_before_capture_secs = 0.5

            [filter]
            threshold = 0.3
            threshold_type = "static"

            [extraction]
            chunk_token_threshold = 1200
        "#;

        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.default_provider, "openai");
        let openai = config.default_provider_config().unwrap();
        assert_eq!(openai.model, "gpt-4o");
        assert!(openai.enabled);
        assert_eq!(openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.renderer.engine, RenderEngine::Http);
        assert_eq!(
            config.renderer.delay_before_capture(),
            Duration::from_millis(500)
        );
        assert_eq!(config.filter.threshold_type, ThresholdType::Static);
        assert_eq!(config.extraction.chunk_token_threshold, 1200);
    }

    #[test]
    fn test_capture_delay_is_clamped() {
        let mut renderer = RendererConfig {
            delay_before_capture_secs: f64::INFINITY,
            ..RendererConfig::default()
        };
        assert_eq!(renderer.delay_before_capture(), Duration::from_secs(60));

        renderer.delay_before_capture_secs = -3.0;
        assert_eq!(renderer.delay_before_capture(), Duration::ZERO);

        renderer.delay_before_capture_secs = f64::NAN;
        assert_eq!(renderer.delay_before_capture(), Duration::ZERO);
    }

    #[test]
    fn test_builtin_provider_fallback() {
        let config = AppConfig::default();
        let provider = config.default_provider_config().unwrap();
        assert_eq!(provider.model, "deepseek-r1-distill-llama-70b");
        assert!(builtin_provider("unknown").is_none());
    }

    #[test]
    fn test_key_only_provider_gets_builtin_model() {
        let toml = r#"
            [providers.groq]
            api_key = "gsk-test"
        "#;
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let groq = config.default_provider_config().unwrap();
        assert_eq!(groq.model, "deepseek-r1-distill-llama-70b");
        assert_eq!(groq.api_key.as_deref(), Some("gsk-test"));
        assert_eq!(groq.max_tokens, 4000);
    }

    #[test]
    fn test_filter_settings_conversion() {
        let settings = FilterSettings {
            threshold: 0.6,
            threshold_type: ThresholdType::Static,
            min_word_threshold: Some(3),
        };
        let filter: FilterConfig = (&settings).into();
        assert_eq!(filter.threshold, 0.6);
        assert_eq!(filter.threshold_type, ThresholdType::Static);
        assert_eq!(filter.min_word_threshold, Some(3));
    }
}

mod anthropic;
mod factory;
mod open_ai;
mod prompt;

pub use anthropic::AnthropicProvider;
pub use factory::ProviderFactory;
pub use open_ai::OpenAIProvider;
pub use prompt::{build_user_prompt, EXTRACTION_INSTRUCTION, EXTRACTION_SYSTEM_PROMPT};

use async_trait::async_trait;

use crate::error::ImportError;
use crate::model::UsageStats;

/// One chat-style completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

/// The model's answer and what it cost
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: UsageStats,
}

/// Unified trait for all LLM providers
///
/// Any failure to obtain a completion (network, auth, non-2xx, malformed
/// envelope) is an [`ImportError::ExtractionTransport`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "groq", "anthropic")
    fn provider_name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ImportError>;
}

/// Keep provider error bodies short enough for a log line
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 300;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let cut: String = body.chars().take(LIMIT).collect();
        format!("{cut}...")
    }
}

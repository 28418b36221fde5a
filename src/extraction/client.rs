use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::error::ImportError;
use crate::extraction::{
    merge_recipes, parse_completion, ChunkAnswer, Chunker, ExtractionOutput, RecipeExtractor,
};
use crate::model::{Extraction, Recipe, UsageStats};
use crate::providers::{
    build_user_prompt, Completion, CompletionRequest, LlmProvider, EXTRACTION_INSTRUCTION,
    EXTRACTION_SYSTEM_PROMPT,
};

/// Sends document chunks to an LLM provider and merges the answers.
pub struct ExtractionClient {
    provider: Arc<dyn LlmProvider>,
    chunker: Chunker,
    max_concurrent_chunks: usize,
    system_prompt: String,
}

impl ExtractionClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ExtractionConfig) -> Self {
        ExtractionClient {
            provider,
            chunker: Chunker::new(config.chunk_token_threshold, config.overlap_rate),
            max_concurrent_chunks: config.max_concurrent_chunks.max(1),
            system_prompt: EXTRACTION_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Extract `schema`-shaped data from `markdown` following `instruction`.
    ///
    /// Chunks are sent with bounded concurrency; answers are merged in chunk
    /// order no matter which completion finishes first. A transport failure on
    /// any chunk fails the whole call. Unparseable chunks contribute nothing.
    pub async fn extract_structured(
        &self,
        markdown: &str,
        schema: &Value,
        instruction: &str,
    ) -> Result<ExtractionOutput, ImportError> {
        let chunks = self.chunker.chunk(markdown);
        if chunks.is_empty() {
            debug!("Nothing to extract from an empty document");
            return Ok(ExtractionOutput {
                extraction: Extraction::NoRecipeFound,
                usage: UsageStats::default(),
            });
        }

        let chunk_count = chunks.len();
        debug!(
            "Extracting with {}/{} over {} chunk(s)",
            self.provider.provider_name(),
            self.provider.model(),
            chunk_count
        );

        let provider = &self.provider;
        let requests: Vec<CompletionRequest> = chunks
            .iter()
            .map(|chunk| CompletionRequest {
                system: self.system_prompt.clone(),
                user: build_user_prompt(&chunk.text, schema, instruction, chunk.index, chunk_count),
            })
            .collect();

        // buffered() yields in input order even when later chunks finish first
        let completions: Vec<Completion> = stream::iter(requests)
            .map(|request| async move { provider.complete(&request).await })
            .buffered(self.max_concurrent_chunks)
            .try_collect()
            .await?;

        let mut usage = UsageStats::default();
        let mut parts: Vec<Recipe> = Vec::new();
        let mut unparsed = 0;
        for (index, completion) in completions.iter().enumerate() {
            usage.add(&completion.usage);
            match parse_completion(&completion.content) {
                Ok(ChunkAnswer::Recipe(recipe)) => parts.push(recipe),
                Ok(ChunkAnswer::NoRecipe) => debug!("Chunk {index} has no recipe data"),
                Err(e) => {
                    unparsed += 1;
                    warn!("Chunk {index} answer ignored: {e}");
                }
            }
        }

        info!(
            "Extraction usage: {} request(s), {} prompt + {} completion = {} tokens",
            usage.requests, usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
        if unparsed == chunk_count {
            warn!("No chunk produced parseable output");
        }

        let recipe = merge_recipes(parts);
        let extraction = if recipe.is_empty() {
            Extraction::NoRecipeFound
        } else {
            Extraction::Recipe(recipe)
        };

        Ok(ExtractionOutput { extraction, usage })
    }
}

#[async_trait]
impl RecipeExtractor for ExtractionClient {
    async fn extract(&self, markdown: &str) -> Result<ExtractionOutput, ImportError> {
        self.extract_structured(markdown, &Recipe::json_schema(), EXTRACTION_INSTRUCTION)
            .await
    }
}

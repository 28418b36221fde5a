mod chunker;
mod client;
mod response;

pub use chunker::{Chunk, Chunker};
pub use client::ExtractionClient;
pub use response::{parse_completion, ChunkAnswer};

use async_trait::async_trait;

use crate::error::ImportError;
use crate::model::{Extraction, Recipe, UsageStats};

/// Result of extracting a recipe from one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutput {
    pub extraction: Extraction,
    pub usage: UsageStats,
}

/// Turns page markdown into a recipe.
///
/// `Ok(NoRecipeFound)` covers pages without a recipe and answers that could
/// not be parsed. `Err` is reserved for failures to reach the model.
#[async_trait]
pub trait RecipeExtractor: Send + Sync {
    async fn extract(&self, markdown: &str) -> Result<ExtractionOutput, ImportError>;
}

/// Combine partial recipes in order.
///
/// The first non-empty name wins. Ingredients and instructions are
/// concatenated, dropping exact repeats (chunk overlap produces those).
pub fn merge_recipes(parts: impl IntoIterator<Item = Recipe>) -> Recipe {
    let mut merged = Recipe::default();
    for part in parts {
        if merged.name.is_empty() && !part.name.is_empty() {
            merged.name = part.name;
        }
        for ingredient in part.ingredients {
            if !merged.ingredients.contains(&ingredient) {
                merged.ingredients.push(ingredient);
            }
        }
        for step in part.instructions {
            if !merged.instructions.contains(&step) {
                merged.instructions.push(step);
            }
        }
    }
    merged
}

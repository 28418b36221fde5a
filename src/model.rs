use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ErrorKind, ImportError};

/// Marker text the model is told to answer with when a page holds no recipe.
pub const NO_RECIPE_FOUND: &str = "No recipe data found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    /// Original measurement, e.g. "2 cups", "1 tbsp"
    pub amount: String,
}

/// A recipe as extracted from a page.
///
/// This is the import shape only; the stored recipe document used by the
/// rest of the application is [`crate::store::StoredRecipe`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
}

impl Recipe {
    /// JSON schema the model's answer has to conform to.
    pub fn json_schema() -> Value {
        json!({
            "title": "Recipe",
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "ingredients": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "amount": {"type": "string"}
                        },
                        "required": ["name", "amount"]
                    }
                },
                "instructions": {
                    "type": "array",
                    "items": {"type": "string"}
                }
            },
            "required": ["name", "ingredients", "instructions"]
        })
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty() && self.instructions.is_empty()
    }
}

/// Output of the page renderer. Consumed once by the extraction step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPage {
    pub url: String,
    /// Markdown projection of the whole rendered DOM
    pub raw_markdown: String,
    /// Blocks of `raw_markdown` that survived the content filter, in order
    pub filtered_markdown: String,
    pub success: bool,
    pub error_message: Option<String>,
}

impl RenderedPage {
    pub fn failed(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// The text handed to extraction: filtered markdown, or raw markdown
    /// when filtering left nothing.
    pub fn extraction_input(&self) -> &str {
        if self.filtered_markdown.trim().is_empty() {
            &self.raw_markdown
        } else {
            &self.filtered_markdown
        }
    }
}

/// Token accounting for the completion requests of one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub requests: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageStats {
    pub fn add(&mut self, other: &UsageStats) {
        self.requests += other.requests;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// What the extraction client found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Recipe(Recipe),
    NoRecipeFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<ImportError> for ImportFailure {
    fn from(err: ImportError) -> Self {
        ImportFailure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of one import call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Recipe(Recipe),
    NoRecipeFound,
    Error(ImportFailure),
}

impl ImportOutcome {
    pub fn is_recipe(&self) -> bool {
        matches!(self, ImportOutcome::Recipe(_))
    }
}

impl From<ImportError> for ImportOutcome {
    fn from(err: ImportError) -> Self {
        ImportOutcome::Error(err.into())
    }
}

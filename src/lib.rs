pub mod config;
pub mod error;
pub mod extraction;
pub mod filter;
pub mod importer;
pub mod model;
pub mod pool;
pub mod providers;
pub mod render;
pub mod server;
pub mod store;

pub use config::AppConfig;
pub use error::{ErrorKind, ImportError};
pub use extraction::{ExtractionClient, ExtractionOutput, RecipeExtractor};
pub use filter::{ContentFilter, FilterConfig, ThresholdType};
pub use importer::{ImportState, RecipeImporter, RecipeImporterBuilder};
pub use model::{
    Extraction, ImportFailure, ImportOutcome, Ingredient, Recipe, RenderedPage, UsageStats,
    NO_RECIPE_FOUND,
};
pub use providers::LlmProvider;
pub use render::{ChromeRenderer, HttpRenderer, MarkdownGenerator, PageRenderer};
pub use store::{DocumentStore, MemoryDocumentStore, StoredRecipe};

/// Import the recipe at `url` with configuration from `config.toml` and the
/// environment.
///
/// # Example
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), bitebook_import::ImportError> {
/// use bitebook_import::{import_recipe, ImportOutcome};
///
/// match import_recipe("https://www.example.com/matcha-latte").await? {
///     ImportOutcome::Recipe(recipe) => println!("{}", recipe.name),
///     ImportOutcome::NoRecipeFound => println!("no recipe on that page"),
///     ImportOutcome::Error(failure) => eprintln!("{}", failure.message),
/// }
/// # Ok(())
/// # }
/// ```
pub async fn import_recipe(url: &str) -> Result<ImportOutcome, ImportError> {
    let config = AppConfig::load()?;
    let importer = RecipeImporter::from_config(&config)?;
    Ok(importer.import(url).await)
}

use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, ExtractionConfig};
use crate::error::ImportError;
use crate::extraction::{ExtractionClient, RecipeExtractor};
use crate::model::{Extraction, ImportOutcome};
use crate::pool::RenderPool;
use crate::providers::{LlmProvider, ProviderFactory};
use crate::render::{renderer_from_config, PageRenderer};

const DEFAULT_MAX_CONCURRENT_RENDERS: usize = 4;
const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a single import currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Start,
    Rendering,
    RenderFailed,
    Rendered,
    Extracting,
    ExtractFailed,
    Extracted,
    NoRecipe,
    Done,
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportState::Start => "start",
            ImportState::Rendering => "rendering",
            ImportState::RenderFailed => "render_failed",
            ImportState::Rendered => "rendered",
            ImportState::Extracting => "extracting",
            ImportState::ExtractFailed => "extract_failed",
            ImportState::Extracted => "extracted",
            ImportState::NoRecipe => "no_recipe",
            ImportState::Done => "done",
        };
        f.write_str(name)
    }
}

struct Progress<'a> {
    url: &'a str,
    state: ImportState,
}

impl<'a> Progress<'a> {
    fn new(url: &'a str) -> Self {
        Progress {
            url,
            state: ImportState::Start,
        }
    }

    fn advance(&mut self, next: ImportState) {
        debug!("import {}: {} -> {}", self.url, self.state, next);
        self.state = next;
    }
}

/// Render a page, then extract a recipe from it.
///
/// Cheap to clone; clones share the render pool.
#[derive(Clone)]
pub struct RecipeImporter {
    renderer: Arc<dyn PageRenderer>,
    extractor: Arc<dyn RecipeExtractor>,
    pool: RenderPool,
}

impl RecipeImporter {
    /// Create a new builder for configuring an importer
    ///
    /// # Example
    /// ```
    /// use bitebook_import::RecipeImporter;
    ///
    /// let builder = RecipeImporter::builder().max_concurrent_renders(2);
    /// ```
    pub fn builder() -> RecipeImporterBuilder {
        RecipeImporterBuilder::default()
    }

    /// Wire renderer, provider and pool from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, ImportError> {
        let provider = ProviderFactory::get_default_provider(config)?;
        let renderer = renderer_from_config(config);
        info!(
            "Using {} ({}) with the {} renderer",
            provider.provider_name(),
            provider.model(),
            renderer.engine_name()
        );

        RecipeImporter::builder()
            .renderer(renderer)
            .provider(provider)
            .extraction_config(config.extraction.clone())
            .max_concurrent_renders(config.server.max_concurrent_renders)
            .queue_timeout(Duration::from_secs(config.server.queue_timeout_secs))
            .build()
    }

    pub fn render_pool(&self) -> &RenderPool {
        &self.pool
    }

    /// Import the recipe at `url`.
    ///
    /// Never panics and never retries; every failure is folded into
    /// [`ImportOutcome::Error`]. Dropping the returned future tears down any
    /// browser and in-flight completion requests.
    pub async fn import(&self, url: &str) -> ImportOutcome {
        let mut progress = Progress::new(url);
        let outcome = match self.run(url, &mut progress).await {
            Ok(Extraction::Recipe(recipe)) => {
                info!(
                    "Imported {:?} from {} ({} ingredients, {} steps)",
                    recipe.name,
                    url,
                    recipe.ingredients.len(),
                    recipe.instructions.len()
                );
                ImportOutcome::Recipe(recipe)
            }
            Ok(Extraction::NoRecipeFound) => {
                info!("No recipe found at {url}");
                ImportOutcome::NoRecipeFound
            }
            Err(e) => {
                warn!("Import of {url} failed: {e}");
                e.into()
            }
        };
        progress.advance(ImportState::Done);
        outcome
    }

    async fn run(
        &self,
        url: &str,
        progress: &mut Progress<'_>,
    ) -> Result<Extraction, ImportError> {
        let permit = self.pool.acquire().await?;
        progress.advance(ImportState::Rendering);
        let page = self.renderer.render(url).await;
        drop(permit);

        if !page.success {
            progress.advance(ImportState::RenderFailed);
            let message = page.error_message.unwrap_or_else(|| {
                format!("{} could not render {url}", self.renderer.engine_name())
            });
            return Err(ImportError::Render(message));
        }
        progress.advance(ImportState::Rendered);
        debug!(
            "Rendered {} ({} chars raw, {} chars filtered)",
            url,
            page.raw_markdown.len(),
            page.filtered_markdown.len()
        );

        progress.advance(ImportState::Extracting);
        match self.extractor.extract(page.extraction_input()).await {
            Ok(output) => {
                progress.advance(match output.extraction {
                    Extraction::Recipe(_) => ImportState::Extracted,
                    Extraction::NoRecipeFound => ImportState::NoRecipe,
                });
                Ok(output.extraction)
            }
            Err(e) => {
                progress.advance(ImportState::ExtractFailed);
                Err(e)
            }
        }
    }
}

/// Builder for [`RecipeImporter`]
#[derive(Default)]
pub struct RecipeImporterBuilder {
    renderer: Option<Arc<dyn PageRenderer>>,
    extractor: Option<Arc<dyn RecipeExtractor>>,
    provider: Option<Arc<dyn LlmProvider>>,
    extraction: ExtractionConfig,
    max_concurrent_renders: Option<usize>,
    queue_timeout: Option<Duration>,
}

impl RecipeImporterBuilder {
    /// Set the page renderer
    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Use a ready-made extractor instead of building one from a provider
    pub fn extractor(mut self, extractor: Arc<dyn RecipeExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Set the LLM provider used for extraction
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Chunking and concurrency settings for extraction
    pub fn extraction_config(mut self, config: ExtractionConfig) -> Self {
        self.extraction = config;
        self
    }

    /// Limit how many pages render at the same time
    pub fn max_concurrent_renders(mut self, renders: usize) -> Self {
        self.max_concurrent_renders = Some(renders);
        self
    }

    /// How long an import waits for a free render slot
    pub fn queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = Some(timeout);
        self
    }

    /// Build the importer
    ///
    /// # Errors
    /// Returns [`ImportError::BuilderError`] when no renderer was set, or when
    /// neither an extractor nor a provider was set.
    pub fn build(self) -> Result<RecipeImporter, ImportError> {
        let renderer = self.renderer.ok_or_else(|| {
            ImportError::BuilderError(
                "No page renderer specified. Use .renderer()".to_string(),
            )
        })?;

        let extractor: Arc<dyn RecipeExtractor> = match (self.extractor, self.provider) {
            (Some(extractor), _) => extractor,
            (None, Some(provider)) => Arc::new(ExtractionClient::new(provider, &self.extraction)),
            (None, None) => {
                return Err(ImportError::BuilderError(
                    "No extractor specified. Use .provider() or .extractor()".to_string(),
                ))
            }
        };

        let pool = RenderPool::new(
            self.max_concurrent_renders
                .unwrap_or(DEFAULT_MAX_CONCURRENT_RENDERS),
            self.queue_timeout.unwrap_or(DEFAULT_QUEUE_TIMEOUT),
        );

        Ok(RecipeImporter {
            renderer,
            extractor,
            pool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::extraction::ExtractionOutput;
    use crate::model::{Recipe, RenderedPage, UsageStats};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRenderer(RenderedPage);

    #[async_trait]
    impl PageRenderer for FixedRenderer {
        fn engine_name(&self) -> &str {
            "fixed"
        }

        async fn render(&self, _url: &str) -> RenderedPage {
            self.0.clone()
        }
    }

    struct CountingExtractor {
        calls: AtomicUsize,
        result: Extraction,
    }

    #[async_trait]
    impl RecipeExtractor for CountingExtractor {
        async fn extract(&self, _markdown: &str) -> Result<ExtractionOutput, ImportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExtractionOutput {
                extraction: self.result.clone(),
                usage: UsageStats::default(),
            })
        }
    }

    fn importer(page: RenderedPage, result: Extraction) -> (RecipeImporter, Arc<CountingExtractor>) {
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
            result,
        });
        let importer = RecipeImporter::builder()
            .renderer(Arc::new(FixedRenderer(page)))
            .extractor(extractor.clone())
            .build()
            .unwrap();
        (importer, extractor)
    }

    #[tokio::test]
    async fn test_render_failure_skips_extraction() {
        let (importer, extractor) = importer(
            RenderedPage::failed("https://nope.invalid", "net::ERR_NAME_NOT_RESOLVED"),
            Extraction::NoRecipeFound,
        );

        match importer.import("https://nope.invalid").await {
            ImportOutcome::Error(failure) => {
                assert_eq!(failure.kind, ErrorKind::RenderFailed);
                assert!(failure.message.contains("ERR_NAME_NOT_RESOLVED"));
            }
            other => panic!("expected render error, got {other:?}"),
        }
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recipe_outcome() {
        let recipe = Recipe {
            name: "Tea".into(),
            ingredients: vec![],
            instructions: vec!["Steep.".into()],
        };
        let page = RenderedPage {
            url: "https://example.com".into(),
            raw_markdown: "Steep.".into(),
            filtered_markdown: "Steep.".into(),
            success: true,
            error_message: None,
        };
        let (importer, extractor) = importer(page, Extraction::Recipe(recipe.clone()));

        assert_eq!(
            importer.import("https://example.com").await,
            ImportOutcome::Recipe(recipe)
        );
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        // permit went back to the pool
        assert_eq!(importer.render_pool().available(), 4);
    }

    #[tokio::test]
    async fn test_no_recipe_outcome() {
        let page = RenderedPage {
            url: "https://example.com/about".into(),
            success: true,
            ..RenderedPage::default()
        };
        let (importer, _) = importer(page, Extraction::NoRecipeFound);
        assert_eq!(
            importer.import("https://example.com/about").await,
            ImportOutcome::NoRecipeFound
        );
    }

    #[test]
    fn test_builder_requires_renderer() {
        let result = RecipeImporter::builder().build();
        assert!(matches!(result, Err(ImportError::BuilderError(_))));
    }

    #[test]
    fn test_builder_requires_extractor() {
        let result = RecipeImporter::builder()
            .renderer(Arc::new(FixedRenderer(RenderedPage::default())))
            .build();
        match result {
            Err(ImportError::BuilderError(msg)) => assert!(msg.contains("extractor")),
            _ => panic!("expected a builder error"),
        }
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ImportState::RenderFailed.to_string(), "render_failed");
        assert_eq!(ImportState::NoRecipe.to_string(), "no_recipe");
    }
}

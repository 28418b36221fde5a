pub mod chrome;
pub mod markdown;
pub mod request;

pub use chrome::ChromeRenderer;
pub use markdown::{MarkdownGenerator, MarkdownOutput};
pub use request::HttpRenderer;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{AppConfig, RenderEngine};
use crate::filter::ContentFilter;
use crate::model::RenderedPage;

/// Fetches a page and projects it to markdown.
///
/// Implementations never fail: fetch problems come back as a page with
/// `success == false` and an error message. They also never retry.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    fn engine_name(&self) -> &str;

    async fn render(&self, url: &str) -> RenderedPage;
}

/// Build the renderer selected in configuration
pub fn renderer_from_config(config: &AppConfig) -> Arc<dyn PageRenderer> {
    let generator = MarkdownGenerator::new(ContentFilter::new((&config.filter).into()));
    match config.renderer.engine {
        RenderEngine::Chrome => Arc::new(ChromeRenderer::new(config.renderer.clone(), generator)),
        RenderEngine::Http => Arc::new(HttpRenderer::new(&config.renderer, generator)),
    }
}

/// Turn fetched HTML into a successful page
pub(crate) fn rendered(url: &str, html: &str, generator: &MarkdownGenerator) -> RenderedPage {
    let output = generator.generate(html);
    RenderedPage {
        url: url.to_string(),
        raw_markdown: output.raw_markdown,
        filtered_markdown: output.filtered_markdown,
        success: true,
        error_message: None,
    }
}

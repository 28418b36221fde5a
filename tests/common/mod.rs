#![allow(dead_code)]

use async_trait::async_trait;
use bitebook_import::extraction::ExtractionOutput;
use bitebook_import::providers::OpenAIProvider;
use bitebook_import::{
    Extraction, HttpRenderer, ImportError, MarkdownGenerator, PageRenderer, RecipeExtractor,
    RecipeImporter, RenderedPage, UsageStats,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const MATCHA_PAGE: &str = r#"
<html>
<head><title>Matcha Green Tea Latte | Example Kitchen</title></head>
<body>
    <header class="site-header">
        <nav>
            <ul>
                <li><a href="/">Home</a></li>
                <li><a href="/recipes">Recipes</a></li>
                <li><a href="/about">About</a></li>
            </ul>
        </nav>
    </header>
    <article>
        <h1>Matcha Green Tea Latte</h1>
        <p>This creamy matcha latte comes together in five minutes and tastes
           better than the one from the coffee shop down the street.</p>
        <div class="ad-slot"><p>Advertisement</p></div>
        <div class="wprm-recipe-ingredients">
            <ul>
                <li>1 tsp matcha powder</li>
                <li>2 oz hot water</li>
                <li>6 oz steamed milk</li>
            </ul>
        </div>
        <div class="wprm-recipe-instructions">
            <ol>
                <li>Whisk the matcha with the hot water until frothy.</li>
                <li>Add the steamed milk and mix.</li>
            </ol>
        </div>
    </article>
    <div class="comments">
        <p>Great recipe! I made this every morning last week and my kids loved it too.</p>
    </div>
    <footer><p>Copyright 2024 Example Kitchen. All rights reserved.</p></footer>
</body>
</html>
"#;

pub const ABOUT_PAGE: &str = r#"
<html>
<body>
    <article>
        <h1>About us</h1>
        <p>We are two friends who started this blog to share our travels,
           our favourite restaurants and the occasional gardening tip.</p>
    </article>
</body>
</html>
"#;

pub const EMPTY_PAGE: &str = "<html><head><title>Loading</title></head><body></body></html>";

pub const MATCHA_ANSWER: &str = r#"{
    "name": "Matcha Green Tea Latte",
    "ingredients": [
        {"name": "matcha powder", "amount": "1 tsp"},
        {"name": "hot water", "amount": "2 oz"},
        {"name": "steamed milk", "amount": "6 oz"}
    ],
    "instructions": [
        "Whisk the matcha with the hot water until frothy.",
        "Add the steamed milk and mix."
    ]
}"#;

/// Chat completions response wrapping `content`
pub fn completion_body(content: &str) -> String {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 420, "completion_tokens": 80, "total_tokens": 500}
    })
    .to_string()
}

/// Plain HTTP rendering plus an OpenAI-compatible provider at `llm_url`
pub fn http_importer(llm_url: String) -> RecipeImporter {
    let renderer = HttpRenderer::with_timeout(
        Duration::from_secs(5),
        "Mozilla/5.0 (X11; Linux x86_64) bitebook-import tests",
        MarkdownGenerator::default(),
    );
    let provider = OpenAIProvider::with_base_url(
        "test-key".to_string(),
        llm_url,
        "gpt-4o-mini".to_string(),
    );

    RecipeImporter::builder()
        .renderer(Arc::new(renderer))
        .provider(Arc::new(provider))
        .build()
        .unwrap()
}

/// Returns the same page after an optional delay
pub struct StaticRenderer {
    pub page: RenderedPage,
    pub delay: Duration,
}

impl StaticRenderer {
    pub fn ok(markdown: &str) -> Self {
        StaticRenderer {
            page: RenderedPage {
                url: "https://example.com/recipe".to_string(),
                raw_markdown: markdown.to_string(),
                filtered_markdown: markdown.to_string(),
                success: true,
                error_message: None,
            },
            delay: Duration::ZERO,
        }
    }

    pub fn failing(message: &str) -> Self {
        StaticRenderer {
            page: RenderedPage::failed("https://example.com/recipe", message),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl PageRenderer for StaticRenderer {
    fn engine_name(&self) -> &str {
        "static"
    }

    async fn render(&self, url: &str) -> RenderedPage {
        tokio::time::sleep(self.delay).await;
        RenderedPage {
            url: url.to_string(),
            ..self.page.clone()
        }
    }
}

/// Returns a fixed extraction and counts calls
pub struct StaticExtractor {
    pub result: Result<Extraction, String>,
    pub calls: AtomicUsize,
}

impl StaticExtractor {
    pub fn new(extraction: Extraction) -> Arc<Self> {
        Arc::new(StaticExtractor {
            result: Ok(extraction),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn transport_error(message: &str) -> Arc<Self> {
        Arc::new(StaticExtractor {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecipeExtractor for StaticExtractor {
    async fn extract(&self, _markdown: &str) -> Result<ExtractionOutput, ImportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(extraction) => Ok(ExtractionOutput {
                extraction: extraction.clone(),
                usage: UsageStats::default(),
            }),
            Err(message) => Err(ImportError::ExtractionTransport(message.clone())),
        }
    }
}

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use log::{debug, info, warn};
use std::path::PathBuf;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{rendered, MarkdownGenerator, PageRenderer};
use crate::config::RendererConfig;
use crate::model::RenderedPage;

/// HTTP status of the main document, 0 when the browser doesn't expose it
const NAVIGATION_STATUS_JS: &str = r#"
(() => {
    const entry = performance.getEntriesByType('navigation')[0];
    return entry && entry.responseStatus ? entry.responseStatus : 0;
})()
"#;

/// Renders pages in headless Chrome so client-side content is present.
///
/// Every call launches its own browser with a throwaway profile directory;
/// nothing is shared between concurrent renders.
pub struct ChromeRenderer {
    config: RendererConfig,
    generator: MarkdownGenerator,
}

impl ChromeRenderer {
    pub fn new(config: RendererConfig, generator: MarkdownGenerator) -> Self {
        Self { config, generator }
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    fn engine_name(&self) -> &str {
        "chrome"
    }

    async fn render(&self, url: &str) -> RenderedPage {
        let session = match RenderSession::launch(&self.config).await {
            Ok(session) => session,
            Err(message) => {
                warn!("{}", message);
                return RenderedPage::failed(url, message);
            }
        };

        let captured = session.capture(url, &self.config).await;
        session.close().await;

        match captured {
            Ok(html) => {
                debug!("Captured {} bytes of rendered DOM from {}", html.len(), url);
                rendered(url, &html, &self.generator)
            }
            Err(message) => {
                warn!("Rendering {} failed: {}", url, message);
                RenderedPage::failed(url, message)
            }
        }
    }
}

/// One browser process plus its event loop and profile directory.
///
/// Dropping a session mid-render (the import was cancelled) kills the
/// browser process.
struct RenderSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    profile_dir: PathBuf,
}

impl RenderSession {
    async fn launch(config: &RendererConfig) -> Result<Self, String> {
        let profile_dir =
            std::env::temp_dir().join(format!("bitebook-render-{}", Uuid::new_v4()));

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(&profile_dir)
            .request_timeout(config.page_timeout())
            .arg(format!("--user-agent={}", config.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");
        if let Some(executable) = &config.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        let browser_config = builder
            .build()
            .map_err(|e| format!("Invalid browser configuration: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| format!("Browser launch failed: {e}"))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!("Launched browser with profile {}", profile_dir.display());
        Ok(Self {
            browser: Some(browser),
            handler: Some(handle),
            profile_dir,
        })
    }

    async fn capture(&self, url: &str, config: &RendererConfig) -> Result<String, String> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| "Browser already closed".to_string())?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to open page: {e}"))?;

        let timeout = config.page_timeout();
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => return Err(format!("Navigation timed out after {}s", timeout.as_secs())),
        }

        let status = page
            .evaluate(NAVIGATION_STATUS_JS)
            .await
            .ok()
            .and_then(|value| value.into_value::<u32>().ok())
            .unwrap_or(0);
        if status >= 400 {
            return Err(format!("HTTP {status} for {url}"));
        }

        // Let client-side rendering settle
        tokio::time::sleep(config.delay_before_capture()).await;

        let html = page
            .content()
            .await
            .map_err(|e| format!("Failed to read rendered DOM: {e}"))?;
        let _ = page.close().await;

        Ok(html)
    }

    async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            let _ = browser.close().await;
            let _ = browser.wait().await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!("Could not remove {}: {}", self.profile_dir.display(), e);
        }
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if self.browser.take().is_some() {
            info!("Render cancelled, killing browser");
            let _ = std::fs::remove_dir_all(&self.profile_dir);
        }
    }
}

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;

use super::{rendered, MarkdownGenerator, PageRenderer};
use crate::config::RendererConfig;
use crate::model::RenderedPage;

const MAX_REDIRECTS: usize = 10;

/// Renderer for hosts without a browser: plain GET, no JavaScript.
pub struct HttpRenderer {
    client: Option<Client>,
    client_error: Option<String>,
    generator: MarkdownGenerator,
}

impl HttpRenderer {
    pub fn new(config: &RendererConfig, generator: MarkdownGenerator) -> Self {
        Self::with_timeout(config.page_timeout(), &config.user_agent, generator)
    }

    pub fn with_timeout(timeout: Duration, user_agent: &str, generator: MarkdownGenerator) -> Self {
        let built = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build();

        match built {
            Ok(client) => Self {
                client: Some(client),
                client_error: None,
                generator,
            },
            Err(e) => Self {
                client: None,
                client_error: Some(format!("Failed to create HTTP client: {e}")),
                generator,
            },
        }
    }

    async fn fetch(&self, client: &Client, url: &str) -> Result<String, String> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| describe_request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status} for {url}"));
        }

        response.text().await.map_err(|e| describe_request_error(&e))
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    fn engine_name(&self) -> &str {
        "http"
    }

    async fn render(&self, url: &str) -> RenderedPage {
        let Some(client) = &self.client else {
            let message = self
                .client_error
                .clone()
                .unwrap_or_else(|| "HTTP client unavailable".to_string());
            return RenderedPage::failed(url, message);
        };

        match self.fetch(client, url).await {
            Ok(html) => {
                debug!("Fetched {} bytes from {}", html.len(), url);
                rendered(url, &html, &self.generator)
            }
            Err(message) => {
                warn!("Fetching {} failed: {}", url, message);
                RenderedPage::failed(url, message)
            }
        }
    }
}

fn describe_request_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("Timed out: {err}")
    } else if err.is_redirect() {
        format!("Too many redirects: {err}")
    } else if err.is_connect() {
        format!("Connection failed: {err}")
    } else {
        err.to_string()
    }
}

//! Content filter: prunes boilerplate blocks from a rendered page.
//!
//! Every block gets a density score in `[0, 1]`:
//!
//! `0.4 * text_density + 0.2 * (1 - link_density) + 0.2 * tag_weight
//!  + 0.1 * class_id_weight + 0.1 * text_length`
//!
//! Blocks inside navigation landmarks, with ad/comment class names, or
//! repeating text already seen earlier on the page are penalised. Blocks
//! scoring under the cutoff are dropped. Filtering is a pure function of the
//! document and the configuration.

use serde::Deserialize;
use std::collections::HashSet;

use crate::render::markdown::{html_to_blocks, join_blocks, ClassSignal, MarkdownBlock};

const TEXT_DENSITY_WEIGHT: f64 = 0.4;
const LINK_DENSITY_WEIGHT: f64 = 0.2;
const TAG_WEIGHT: f64 = 0.2;
const CLASS_ID_WEIGHT: f64 = 0.1;
const TEXT_LENGTH_WEIGHT: f64 = 0.1;

const MAX_TAG_IMPORTANCE: f64 = 1.5;
const DEFAULT_TAG_IMPORTANCE: f64 = 0.7;
/// Text length (chars) at which the length component saturates
const TEXT_LENGTH_SATURATION: f64 = 200.0;

const BOILERPLATE_PENALTY: f64 = 0.25;
const REPEATED_TEXT_PENALTY: f64 = 0.5;

/// Median score at which the dynamic cutoff equals the configured threshold
const REFERENCE_MEDIAN: f64 = 0.5;
const MIN_DOCUMENT_FACTOR: f64 = 0.6;
const MAX_DOCUMENT_FACTOR: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    /// Fixed cutoff
    Static,
    /// Cutoff scaled by the page's median score and each block's shape
    #[default]
    Dynamic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Lower keeps more content, higher prunes more
    pub threshold: f64,
    pub threshold_type: ThresholdType,
    /// Prune blocks with fewer words than this
    pub min_word_threshold: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            threshold: 0.48,
            threshold_type: ThresholdType::Dynamic,
            min_word_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    config: FilterConfig,
}

impl ContentFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Reduce an HTML (or plain text) document to its relevant markdown.
    pub fn filter(&self, document: &str) -> String {
        let blocks = html_to_blocks(document);
        let kept = self.select(&blocks);
        join_blocks(kept.iter().map(|&i| &blocks[i]))
    }

    /// Indices of the blocks that survive, in document order.
    ///
    /// When nothing clears the cutoff the single best-scoring block is kept,
    /// so a document with any text never filters down to nothing.
    pub fn select(&self, blocks: &[MarkdownBlock]) -> Vec<usize> {
        if blocks.is_empty() {
            return Vec::new();
        }

        let scores = self.score(blocks);
        let document_factor = match self.config.threshold_type {
            ThresholdType::Static => 1.0,
            ThresholdType::Dynamic => document_factor(&scores),
        };

        let kept: Vec<usize> = blocks
            .iter()
            .enumerate()
            .filter(|(i, block)| {
                if let Some(min_words) = self.config.min_word_threshold {
                    if block.word_count < min_words {
                        return false;
                    }
                }
                scores[*i] >= self.cutoff(block, document_factor)
            })
            .map(|(i, _)| i)
            .collect();

        if !kept.is_empty() {
            return kept;
        }

        best_block(blocks, &scores).into_iter().collect()
    }

    /// Density score of each block, in block order.
    pub fn score(&self, blocks: &[MarkdownBlock]) -> Vec<f64> {
        let mut seen = HashSet::new();
        blocks
            .iter()
            .map(|block| {
                let key = block.text.to_lowercase();
                let repeated = !seen.insert(key);
                score_block(block, repeated)
            })
            .collect()
    }

    fn cutoff(&self, block: &MarkdownBlock, document_factor: f64) -> f64 {
        let threshold = self.config.threshold;
        if self.config.threshold_type == ThresholdType::Static {
            return threshold;
        }

        let mut cutoff = threshold * document_factor;
        if tag_importance(&block.tag) > 1.0 {
            cutoff *= 0.8;
        }
        if text_density(block) > 0.4 {
            cutoff *= 0.9;
        }
        if link_ratio(block) > 0.6 {
            cutoff *= 1.2;
        }
        cutoff
    }
}

fn score_block(block: &MarkdownBlock, repeated: bool) -> f64 {
    if block.text_len == 0 {
        return 0.0;
    }

    let class_id = match block.class_signal {
        ClassSignal::Positive => 1.0,
        ClassSignal::Neutral => 0.5,
        ClassSignal::Negative => 0.0,
    };
    let text_length =
        ((block.text_len as f64 + 1.0).ln() / (TEXT_LENGTH_SATURATION + 1.0).ln()).min(1.0);

    let mut score = TEXT_DENSITY_WEIGHT * text_density(block)
        + LINK_DENSITY_WEIGHT * (1.0 - link_ratio(block))
        + TAG_WEIGHT * (tag_importance(&block.tag) / MAX_TAG_IMPORTANCE)
        + CLASS_ID_WEIGHT * class_id
        + TEXT_LENGTH_WEIGHT * text_length;

    if block.boilerplate || block.class_signal == ClassSignal::Negative {
        score *= BOILERPLATE_PENALTY;
    }
    if repeated {
        score *= REPEATED_TEXT_PENALTY;
    }
    score
}

fn text_density(block: &MarkdownBlock) -> f64 {
    if block.html_len == 0 {
        return 0.0;
    }
    (block.text_len as f64 / block.html_len as f64).min(1.0)
}

fn link_ratio(block: &MarkdownBlock) -> f64 {
    if block.text_len == 0 {
        return 0.0;
    }
    (block.link_text_len as f64 / block.text_len as f64).min(1.0)
}

fn tag_importance(tag: &str) -> f64 {
    match tag {
        "article" | "pre" => 1.5,
        "main" | "h1" => 1.4,
        "section" | "h2" => 1.3,
        "p" | "h3" => 1.2,
        "h4" | "h5" | "h6" => 1.1,
        "li" | "blockquote" => 1.0,
        "dt" | "dd" => 0.9,
        "td" | "th" | "figcaption" | "caption" => 0.8,
        "span" => 0.6,
        _ => DEFAULT_TAG_IMPORTANCE,
    }
}

/// Scale the cutoff with the page: sparse pages get a lower bar, dense
/// pages a higher one.
fn document_factor(scores: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = scores.iter().copied().filter(|s| *s > 0.0).collect();
    if sorted.is_empty() {
        return 1.0;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    (median / REFERENCE_MEDIAN).clamp(MIN_DOCUMENT_FACTOR, MAX_DOCUMENT_FACTOR)
}

/// First block with the highest score among blocks that have text.
fn best_block(blocks: &[MarkdownBlock], scores: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, block) in blocks.iter().enumerate() {
        if block.text_len == 0 {
            continue;
        }
        match best {
            Some(b) if scores[b] >= scores[i] => {}
            _ => best = Some(i),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPE_PAGE: &str = r#"
        <html>
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

    #[test]
    fn test_keeps_recipe_and_drops_boilerplate() {
        let filtered = ContentFilter::default().filter(RECIPE_PAGE);

        assert!(filtered.contains("Matcha Green Tea Latte"));
        assert!(filtered.contains("1 tsp matcha powder"));
        assert!(filtered.contains("6 oz steamed milk"));
        assert!(filtered.contains("Whisk the matcha"));

        assert!(!filtered.contains("[About](/about)"));
        assert!(!filtered.contains("Advertisement"));
        assert!(!filtered.contains("Great recipe!"));
        assert!(!filtered.contains("All rights reserved"));
    }

    #[test]
    fn test_static_threshold_keeps_recipe() {
        let filter = ContentFilter::new(FilterConfig {
            threshold: 0.48,
            threshold_type: ThresholdType::Static,
            min_word_threshold: None,
        });
        let filtered = filter.filter(RECIPE_PAGE);
        assert!(filtered.contains("2 oz hot water"));
        assert!(!filtered.contains("Advertisement"));
    }

    #[test]
    fn test_filter_is_deterministic() {
        let filter = ContentFilter::default();
        let first = filter.filter(RECIPE_PAGE);
        for _ in 0..5 {
            assert_eq!(filter.filter(RECIPE_PAGE), first);
        }
    }

    #[test]
    fn test_never_empty_when_text_exists() {
        // Everything lives in boilerplate, nothing clears the cutoff.
        let html = r#"<body><nav><a href="/x">Only a link</a></nav></body>"#;
        let filter = ContentFilter::new(FilterConfig {
            threshold: 0.99,
            threshold_type: ThresholdType::Static,
            min_word_threshold: None,
        });
        assert_eq!(filter.filter(html), "[Only a link](/x)");

        let strict = ContentFilter::new(FilterConfig {
            threshold: 0.5,
            threshold_type: ThresholdType::Dynamic,
            min_word_threshold: Some(100),
        });
        assert!(!strict.filter(RECIPE_PAGE).is_empty());
    }

    #[test]
    fn test_fallback_picks_highest_scoring_block() {
        let html = r#"
            <body>
                <footer><p>short</p></footer>
                <footer><p>A much longer footer paragraph with more text in it.</p></footer>
            </body>
        "#;
        let filter = ContentFilter::new(FilterConfig {
            threshold: 1.0,
            threshold_type: ThresholdType::Static,
            min_word_threshold: None,
        });
        assert_eq!(
            filter.filter(html),
            "A much longer footer paragraph with more text in it."
        );
    }

    #[test]
    fn test_empty_and_whitespace_documents() {
        let filter = ContentFilter::default();
        assert_eq!(filter.filter(""), "");
        assert_eq!(filter.filter("<html><body>   \n </body></html>"), "");
    }

    #[test]
    fn test_plain_text_input_survives() {
        let text = "Ingredients: hot water 2oz, steamed milk 6oz. Steps: 1. Whisk matcha. 2. Add water.";
        assert_eq!(ContentFilter::default().filter(text), text);
    }

    #[test]
    fn test_repeated_text_is_penalised() {
        let blocks = html_to_blocks("<p>Jump to recipe</p><p>Jump to recipe</p>");
        let scores = ContentFilter::default().score(&blocks);
        assert!(scores[1] < scores[0]);
    }

    #[test]
    fn test_link_heavy_block_scores_lower() {
        let blocks = html_to_blocks(
            r#"<p>Stir the sauce until thick.</p><p><a href="/a">Stir the sauce until thin.</a></p>"#,
        );
        let scores = ContentFilter::default().score(&blocks);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_min_word_threshold_prunes_short_blocks() {
        let html = "<p>Salt</p><p>Season the soup generously with salt and pepper.</p>";
        let filter = ContentFilter::new(FilterConfig {
            threshold: 0.1,
            threshold_type: ThresholdType::Static,
            min_word_threshold: Some(3),
        });
        assert_eq!(
            filter.filter(html),
            "Season the soup generously with salt and pepper."
        );
    }

    /// Markup-heavy div with no links: scores about 0.45
    fn sparse_block(text: &str) -> MarkdownBlock {
        MarkdownBlock {
            markdown: text.to_string(),
            text: text.to_string(),
            tag: "div".to_string(),
            text_len: 40,
            link_text_len: 0,
            html_len: 400,
            word_count: text.split_whitespace().count(),
            boilerplate: false,
            class_signal: ClassSignal::Neutral,
        }
    }

    #[test]
    fn test_dynamic_threshold_relaxes_on_sparse_pages() {
        let blocks = vec![
            sparse_block("Bring the water to a simmer first."),
            sparse_block("Whisk in the matcha until frothy."),
            sparse_block("Top with the steamed milk and serve."),
        ];

        let static_filter = ContentFilter::new(FilterConfig {
            threshold: 0.48,
            threshold_type: ThresholdType::Static,
            min_word_threshold: None,
        });
        let dynamic_filter = ContentFilter::new(FilterConfig {
            threshold: 0.48,
            threshold_type: ThresholdType::Dynamic,
            min_word_threshold: None,
        });

        let scores = static_filter.score(&blocks);
        assert!(scores.iter().all(|s| *s < 0.48 && *s > 0.44));

        // nothing clears the fixed bar, only the fallback block survives
        assert_eq!(static_filter.select(&blocks), vec![0]);
        // the median-scaled bar sits under every block
        assert_eq!(dynamic_filter.select(&blocks), vec![0, 1, 2]);
    }

    #[test]
    fn test_document_factor_tracks_median() {
        assert_eq!(document_factor(&[]), 1.0);
        assert_eq!(document_factor(&[0.5, 0.5, 0.5]), 1.0);
        assert_eq!(document_factor(&[0.1, 0.1]), MIN_DOCUMENT_FACTOR);
        assert_eq!(document_factor(&[0.9, 0.9, 0.9]), MAX_DOCUMENT_FACTOR);
    }
}

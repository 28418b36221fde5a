//! Markdown projection of a rendered page.
//!
//! The DOM is flattened into an ordered list of block-level text nodes. Each
//! block keeps the measurements the content filter scores it on, so the raw
//! markdown and the filtered markdown are both joins over the same blocks.

use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

use crate::filter::ContentFilter;

static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

/// Elements whose content is never document text
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "canvas", "head", "meta",
    "link", "object", "embed", "video", "audio", "picture", "img", "select", "option",
    "input", "textarea",
];

/// Elements rendered as a single block when they hold only inline content
const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "pre", "blockquote", "dt", "dd", "td", "th",
    "figcaption", "caption", "summary", "address",
];

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "br", "button", "cite", "code", "data", "del", "dfn", "em",
    "font", "i", "ins", "kbd", "label", "mark", "q", "s", "samp", "small", "span", "strong",
    "sub", "sup", "time", "u", "var", "wbr",
];

const BOILERPLATE_TAGS: &[&str] = &["nav", "header", "footer", "aside", "form", "dialog", "menu"];

const BOILERPLATE_ROLES: &[&str] = &[
    "navigation",
    "banner",
    "contentinfo",
    "complementary",
    "search",
    "dialog",
];

/// class/id tokens that mark chrome around the content
const NEGATIVE_TOKENS: &[&str] = &[
    "ad", "ads", "adsbygoogle", "advert", "advertisement", "banner", "breadcrumb",
    "breadcrumbs", "comment", "comments", "consent", "cookie", "disqus", "menu", "modal", "nav",
    "navbar", "newsletter", "popup", "promo", "related", "share", "sharing", "sidebar", "social",
    "sponsor", "sponsored", "subscribe", "widget",
];

/// class/id tokens that mark recipe or article content
const POSITIVE_TOKENS: &[&str] = &[
    "recipe", "ingredient", "ingredients", "instruction", "instructions", "direction",
    "directions", "method", "step", "steps", "wprm", "tasty", "article", "content", "entry",
    "post", "main",
];

/// What an element's class and id say about its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassSignal {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// One block-level text node of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownBlock {
    pub markdown: String,
    /// Visible text, whitespace collapsed
    pub text: String,
    /// Tag of the element the block came from (or of its container for loose text)
    pub tag: String,
    pub text_len: usize,
    pub link_text_len: usize,
    /// Length of the markup the text was taken from
    pub html_len: usize,
    pub word_count: usize,
    /// Inside nav, header, footer, aside, form or an equivalent landmark
    pub boilerplate: bool,
    pub class_signal: ClassSignal,
}

/// Raw and filtered markdown of one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkdownOutput {
    pub raw_markdown: String,
    pub filtered_markdown: String,
}

/// Turns HTML into raw markdown plus the content filter's reduction of it.
#[derive(Debug, Clone, Default)]
pub struct MarkdownGenerator {
    filter: ContentFilter,
}

impl MarkdownGenerator {
    pub fn new(filter: ContentFilter) -> Self {
        Self { filter }
    }

    pub fn generate(&self, html: &str) -> MarkdownOutput {
        let blocks = html_to_blocks(html);
        let kept = self.filter.select(&blocks);

        MarkdownOutput {
            raw_markdown: join_blocks(blocks.iter()),
            filtered_markdown: join_blocks(kept.iter().map(|&i| &blocks[i])),
        }
    }
}

/// Join blocks into a markdown document, one blank line between blocks.
pub fn join_blocks<'a>(blocks: impl Iterator<Item = &'a MarkdownBlock>) -> String {
    blocks
        .map(|block| block.markdown.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split a document into its block-level text nodes, in document order.
pub fn html_to_blocks(html: &str) -> Vec<MarkdownBlock> {
    let document = Html::parse_document(html);
    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());

    let ctx = Context {
        block_tag: "body",
        boilerplate: false,
        in_article: false,
        signal: ClassSignal::Neutral,
    };

    let mut collector = BlockCollector::default();
    collector.collect(root, ctx);
    collector.flush(ctx);
    collector.blocks
}

#[derive(Debug, Clone, Copy)]
struct Context<'a> {
    block_tag: &'a str,
    boilerplate: bool,
    in_article: bool,
    signal: ClassSignal,
}

impl<'a> Context<'a> {
    fn enter(&self, element: ElementRef<'a>) -> Context<'a> {
        let tag = element.value().name();
        let role = element.value().attr("role").unwrap_or("");

        // header/footer inside an article belong to the article
        let landmark = match tag {
            "header" | "footer" => !self.in_article,
            _ => BOILERPLATE_TAGS.contains(&tag),
        };

        let signal = match class_signal(element) {
            ClassSignal::Neutral => self.signal,
            own => own,
        };

        let block_tag = if BLOCK_TAGS.contains(&tag) || !BLOCK_TAGS.contains(&self.block_tag) {
            tag
        } else {
            self.block_tag
        };

        Context {
            block_tag,
            boilerplate: self.boilerplate || landmark || BOILERPLATE_ROLES.contains(&role),
            in_article: self.in_article || matches!(tag, "article" | "main") || role == "main",
            signal,
        }
    }
}

#[derive(Default)]
struct BlockCollector {
    blocks: Vec<MarkdownBlock>,
    run: InlineBuffer,
}

impl BlockCollector {
    fn collect<'a>(&mut self, element: ElementRef<'a>, ctx: Context<'a>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    self.run.push_text(&text.text);
                    self.run.html_len += text.text.len();
                }
                Node::Element(_) => {
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if is_skipped(child_el) {
                        continue;
                    }

                    let tag = child_el.value().name();
                    let structural = has_structural_descendant(child_el);

                    if INLINE_TAGS.contains(&tag) && !structural {
                        self.run.html_len += child_el.html().len();
                        render_inline_element(child_el, &mut self.run);
                        continue;
                    }

                    self.flush(ctx);
                    let child_ctx = ctx.enter(child_el);
                    if BLOCK_TAGS.contains(&tag) && !structural {
                        self.push_leaf(child_el, child_ctx);
                    } else {
                        self.collect(child_el, child_ctx);
                        self.flush(child_ctx);
                    }
                }
                _ => {}
            }
        }
    }

    /// Close the current run of loose inline content as a block.
    fn flush(&mut self, ctx: Context<'_>) {
        let run = std::mem::take(&mut self.run);
        if run.text.is_empty() {
            return;
        }

        let content = run.markdown.trim();
        let markdown = if ctx.block_tag == "li" {
            format!("- {content}")
        } else {
            content.to_string()
        };
        self.push_block(markdown, run.text, run.link_text_len, run.html_len, ctx);
    }

    fn push_leaf(&mut self, element: ElementRef<'_>, ctx: Context<'_>) {
        let tag = element.value().name();

        if tag == "pre" {
            let raw: String = element.text().collect();
            let mut collapsed = InlineBuffer::default();
            collapsed.push_text(&raw);
            if collapsed.text.is_empty() {
                return;
            }
            let markdown = format!("```\n{}\n```", raw.trim_matches('\n'));
            self.push_block(markdown, collapsed.text, 0, element.html().len(), ctx);
            return;
        }

        let mut buffer = InlineBuffer::default();
        render_inline_children(element, &mut buffer);
        if buffer.text.is_empty() {
            return;
        }

        let content = buffer.markdown.trim();
        let markdown = match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                format!("{} {content}", "#".repeat(level))
            }
            "li" => format!("{} {content}", list_marker(element)),
            "blockquote" => format!("> {content}"),
            _ => content.to_string(),
        };
        self.push_block(
            markdown,
            buffer.text,
            buffer.link_text_len,
            element.html().len(),
            ctx,
        );
    }

    fn push_block(
        &mut self,
        markdown: String,
        text: String,
        link_text_len: usize,
        html_len: usize,
        ctx: Context<'_>,
    ) {
        let text_len = text.chars().count();
        let word_count = text.split_whitespace().count();
        self.blocks.push(MarkdownBlock {
            markdown,
            text,
            tag: ctx.block_tag.to_string(),
            text_len,
            link_text_len,
            html_len: html_len.max(text_len),
            word_count,
            boilerplate: ctx.boilerplate,
            class_signal: ctx.signal,
        });
    }
}

/// Accumulates inline markdown and the plain text it stands for.
#[derive(Default)]
struct InlineBuffer {
    markdown: String,
    text: String,
    link_text_len: usize,
    html_len: usize,
    pending_space: bool,
    leading_space: bool,
}

impl InlineBuffer {
    fn push_text(&mut self, raw: &str) {
        for c in raw.chars() {
            if c.is_whitespace() {
                if self.text.is_empty() {
                    self.leading_space = true;
                }
                self.pending_space = true;
            } else {
                self.separate();
                self.markdown.push(c);
                self.text.push(c);
            }
        }
    }

    fn separate(&mut self) {
        if self.pending_space && !self.text.is_empty() {
            if !self.markdown.ends_with('\n') {
                self.markdown.push(' ');
            }
            self.text.push(' ');
        }
        self.pending_space = false;
    }

    fn line_break(&mut self) {
        if !self.text.is_empty() {
            self.markdown.push('\n');
            self.pending_space = true;
        }
    }

    fn push_fragment(&mut self, sub: InlineBuffer, open: &str, close: &str, is_link: bool) {
        if sub.leading_space {
            if self.text.is_empty() {
                self.leading_space = true;
            }
            self.pending_space = true;
        }
        if sub.text.is_empty() {
            return;
        }

        self.separate();
        self.markdown.push_str(open);
        self.markdown.push_str(&sub.markdown);
        self.markdown.push_str(close);
        self.text.push_str(&sub.text);
        self.link_text_len += if is_link {
            sub.text.chars().count()
        } else {
            sub.link_text_len
        };
        if sub.pending_space {
            self.pending_space = true;
        }
    }
}

fn render_inline_children(element: ElementRef<'_>, buffer: &mut InlineBuffer) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => buffer.push_text(&text.text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if !is_skipped(child_el) {
                        render_inline_element(child_el, buffer);
                    }
                }
            }
            _ => {}
        }
    }
}

fn render_inline_element(element: ElementRef<'_>, buffer: &mut InlineBuffer) {
    let (open, close) = match element.value().name() {
        "br" => {
            buffer.line_break();
            return;
        }
        "a" => {
            let href = element.value().attr("href").unwrap_or("").trim();
            let mut sub = InlineBuffer::default();
            render_inline_children(element, &mut sub);
            if href.is_empty() || href.starts_with("javascript:") {
                buffer.push_fragment(sub, "", "", false);
            } else {
                let close = format!("]({href})");
                buffer.push_fragment(sub, "[", &close, true);
            }
            return;
        }
        "strong" | "b" => ("**", "**"),
        "em" | "i" => ("*", "*"),
        "code" => ("`", "`"),
        _ => ("", ""),
    };

    let mut sub = InlineBuffer::default();
    render_inline_children(element, &mut sub);
    buffer.push_fragment(sub, open, close, false);
}

fn list_marker(element: ElementRef<'_>) -> String {
    let parent = element.parent().and_then(ElementRef::wrap);
    match parent {
        Some(list) if list.value().name() == "ol" => {
            let start = list
                .value()
                .attr("start")
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(1);
            let preceding = element
                .prev_siblings()
                .filter_map(ElementRef::wrap)
                .filter(|sibling| sibling.value().name() == "li")
                .count();
            format!("{}.", start + preceding)
        }
        _ => "-".to_string(),
    }
}

fn is_skipped(element: ElementRef<'_>) -> bool {
    let value = element.value();
    if SKIPPED_TAGS.contains(&value.name()) || value.attr("hidden").is_some() {
        return true;
    }
    if value.attr("aria-hidden") == Some("true") {
        return true;
    }
    value
        .attr("style")
        .map(|style| {
            let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
            compact.to_ascii_lowercase().contains("display:none")
        })
        .unwrap_or(false)
}

/// Whether an element holds anything beyond inline content.
fn has_structural_descendant(element: ElementRef<'_>) -> bool {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .any(|child| {
            if is_skipped(child) {
                false
            } else if INLINE_TAGS.contains(&child.value().name()) {
                has_structural_descendant(child)
            } else {
                true
            }
        })
}

fn class_signal(element: ElementRef<'_>) -> ClassSignal {
    let value = element.value();
    let tokens: Vec<String> = value
        .attr("class")
        .into_iter()
        .chain(value.id())
        .flat_map(|attr| attr.split(|c: char| c.is_whitespace() || c == '-' || c == '_'))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
        .collect();

    if tokens.iter().any(|t| NEGATIVE_TOKENS.contains(&t.as_str())) {
        ClassSignal::Negative
    } else if tokens.iter().any(|t| POSITIVE_TOKENS.contains(&t.as_str())) {
        ClassSignal::Positive
    } else {
        ClassSignal::Neutral
    }
}

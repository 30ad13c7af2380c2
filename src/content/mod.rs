// src/content/mod.rs
//! Article body resolution with a fixed fallback chain:
//! page → structured blocks → flattened text → summary-or-title.

pub mod html;
pub mod snapshot;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{error, warn};

use crate::error::FetchError;
use crate::types::{collapse_ws, Article, ContentBlock, FALLBACK_MAX_BLOCKS, MAX_BLOCKS};

/// Lines shorter than this are dropped by the plain-text pass.
pub const MIN_TEXT_LINE_CHARS: usize = 20;

/// Per-source page access and block extraction.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Raw page body. Empty is a valid answer (e.g. proxy not configured).
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;

    /// Structured extraction from the page.
    fn extract_blocks(&self, page: &str, url: &str) -> Vec<ContentBlock>;

    /// Plain-text pass used when structured extraction found nothing.
    fn text_blocks(&self, page: &str) -> Vec<ContentBlock> {
        paragraph_blocks(&flatten_html(page), MAX_BLOCKS)
    }

    /// Blocks rendered from the article's own summary or title.
    fn fallback_blocks(&self, text: &str) -> Vec<ContentBlock> {
        let blocks = paragraph_blocks(text, FALLBACK_MAX_BLOCKS);
        if !blocks.is_empty() {
            return blocks;
        }
        ContentBlock::paragraph(text).into_iter().collect()
    }

    /// Replace results that only echo the metadata with a snapshot.
    fn snapshot_check(&self) -> bool {
        false
    }
}

/// Never fails: errors degrade to the metadata fallback. At most [`MAX_BLOCKS`].
pub async fn resolve(article: &Article, extractor: &dyn ContentExtractor) -> Vec<ContentBlock> {
    let fallback_text = article.fallback_text();

    let mut blocks = match extractor.fetch_page(&article.link).await {
        Ok(page) if page.trim().is_empty() => extractor.fallback_blocks(fallback_text),
        Ok(page) => {
            let mut blocks = extractor.extract_blocks(&page, &article.link);
            if blocks.is_empty() {
                blocks = extractor.text_blocks(&page);
            }
            if blocks.is_empty() {
                blocks = extractor.fallback_blocks(fallback_text);
            }
            blocks
        }
        Err(e) => {
            error!(
                source = article.source.name(),
                url = %article.link,
                error = %e,
                "article_content_fetch_error"
            );
            extractor.fallback_blocks(fallback_text)
        }
    };
    blocks.truncate(MAX_BLOCKS);

    if extractor.snapshot_check() {
        let echoes = match blocks.as_slice() {
            [] => true,
            [only] => snapshot::is_echo_of_metadata(only, article),
            _ => false,
        };
        if echoes {
            warn!(
                source = article.source.name(),
                link = %article.link,
                reason = "single_block_fallback_or_empty",
                "snapshot_fallback_used"
            );
            blocks = snapshot::snapshot_blocks(article, &article.link);
        }
    }
    blocks
}

/// One paragraph per line of at least [`MIN_TEXT_LINE_CHARS`] characters.
pub fn paragraph_blocks(text: &str, max_blocks: usize) -> Vec<ContentBlock> {
    text.lines()
        .map(collapse_ws)
        .filter(|line| line.chars().count() >= MIN_TEXT_LINE_CHARS)
        .filter_map(|line| ContentBlock::paragraph(&line))
        .take(max_blocks)
        .collect()
}

/// Visible text of a document, one trimmed text node per line.
pub fn flatten_html(page: &str) -> String {
    let doc = Html::parse_document(page);
    let mut lines = Vec::new();
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        let text = text.trim();
        if !hidden && !text.is_empty() {
            lines.push(text.to_string());
        }
    }
    lines.join("\n")
}

/// Cheap tag sniff for proxies that may hand back plain text.
pub fn looks_like_html(body: &str) -> bool {
    let bytes = body.as_bytes();
    bytes.windows(2).any(|w| {
        w[0] == b'<' && (w[1].is_ascii_alphabetic() || w[1] == b'!' || w[1] == b'/')
    })
}

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::types::Source;

    struct Canned {
        page: Result<String, ()>,
        structured: Vec<ContentBlock>,
    }

    #[async_trait]
    impl ContentExtractor for Canned {
        async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
            self.page.clone().map_err(|_| FetchError::transport(url, "timed out"))
        }
        fn extract_blocks(&self, _page: &str, _url: &str) -> Vec<ContentBlock> {
            self.structured.clone()
        }
    }

    fn article() -> Article {
        Article::new(
            "A fresh identity for a regional bank",
            "https://example.com/a",
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            Source::TheDrum,
        )
    }

    #[tokio::test]
    async fn fetch_error_degrades_to_title() {
        let ex = Canned { page: Err(()), structured: vec![] };
        let blocks = resolve(&article(), &ex).await;
        assert_eq!(
            blocks,
            vec![ContentBlock::Paragraph("A fresh identity for a regional bank".into())]
        );
    }

    #[tokio::test]
    async fn short_title_still_yields_one_block() {
        let ex = Canned { page: Ok(String::new()), structured: vec![] };
        let mut a = article();
        a.title = "Short".into();
        assert_eq!(resolve(&a, &ex).await, vec![ContentBlock::Paragraph("Short".into())]);
    }

    #[tokio::test]
    async fn structured_blocks_win_and_are_capped() {
        let many = (0..70).map(|i| ContentBlock::Heading(format!("h{i}"))).collect();
        let ex = Canned { page: Ok("<p>x</p>".into()), structured: many };
        assert_eq!(resolve(&article(), &ex).await.len(), MAX_BLOCKS);
    }

    #[tokio::test]
    async fn text_pass_runs_when_structure_is_empty() {
        let page = "<html><body><span>tiny</span><span>This line is long enough to keep around</span>\
                    <script>var ignored = 'this script text is long enough';</script></body></html>";
        let ex = Canned { page: Ok(page.into()), structured: vec![] };
        assert_eq!(
            resolve(&article(), &ex).await,
            vec![ContentBlock::Paragraph("This line is long enough to keep around".into())]
        );
    }

    #[test]
    fn paragraph_blocks_drop_short_lines() {
        let blocks = paragraph_blocks("short\n  twenty characters here!  \n\n", 8);
        assert_eq!(blocks, vec![ContentBlock::Paragraph("twenty characters here!".into())]);
    }

    #[test]
    fn html_sniff() {
        assert!(looks_like_html("<!doctype html><p>x</p>"));
        assert!(!looks_like_html("Topline\nplain text 3 < 4"));
    }
}

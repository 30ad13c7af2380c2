// src/content/html.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html};
use url::Url;

use super::{element_text, selector, ContentExtractor};
use crate::error::FetchError;
use crate::sources::get_text;
use crate::types::{ContentBlock, Source, MAX_BLOCKS};

const BRAND_NEW_BOILERPLATE: [&str; 4] = [
    "Subscribe to Brand New",
    "DID YOU WORK ON THIS PROJECT",
    "Comments (",
    "Industry /",
];

/// Paragraphs at or below this length are navigation crumbs.
const MIN_PARAGRAPH_CHARS: usize = 10;

/// Where the article body lives, most specific first. The document root is the last resort.
pub fn root_selectors(source: Source) -> &'static [&'static str] {
    match source {
        Source::BrandNew => &["div.module", "article", "main"],
        Source::BrandingJournal => &["div.entry-content", "div.cs-entry__content"],
        Source::Bpando => &["div.article-content", "article"],
        Source::TheDrum | Source::ForbesCmo => &["article", "main"],
        Source::BrandingMag => &["div.entry-content", "section.post-content", "div.article-content"],
    }
}

/// Generic extractor over a direct page GET.
#[derive(Clone)]
pub struct HtmlExtractor {
    source: Source,
    client: Client,
    timeout: Duration,
}

impl HtmlExtractor {
    pub fn new(source: Source, client: Client, timeout_secs: u64) -> Self {
        Self {
            source,
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl ContentExtractor for HtmlExtractor {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        get_text(&self.client, url, self.timeout, self.source.name()).await
    }

    fn extract_blocks(&self, page: &str, url: &str) -> Vec<ContentBlock> {
        extract_html_blocks(page, self.source, url)
    }
}

/// Images, h2/h3 headings and paragraphs under the source's content root, in document order.
pub fn extract_html_blocks(page: &str, source: Source, page_url: &str) -> Vec<ContentBlock> {
    let doc = Html::parse_document(page);
    let root = root_selectors(source)
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| doc.select(&sel).next())
        .unwrap_or_else(|| doc.root_element());

    let Some(items) = selector("p, h2, h3, img, div") else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    for el in root.select(&items) {
        let block = match el.value().name() {
            "img" => el
                .value()
                .attr("src")
                .or_else(|| el.value().attr("data-src"))
                .and_then(|src| absolutize_image(src, source, page_url))
                .and_then(|src| ContentBlock::image(&src)),
            "div" => background_image(&el).and_then(|src| ContentBlock::image(&src)),
            "h2" | "h3" => ContentBlock::heading(&element_text(&el)),
            "p" => paragraph(&el, source),
            _ => None,
        };
        blocks.extend(block);
        if blocks.len() >= MAX_BLOCKS {
            break;
        }
    }
    blocks
}

fn paragraph(el: &ElementRef<'_>, source: Source) -> Option<ContentBlock> {
    let text = element_text(el);
    if text.chars().count() <= MIN_PARAGRAPH_CHARS {
        return None;
    }
    if source == Source::BrandNew && BRAND_NEW_BOILERPLATE.iter().any(|b| text.contains(b)) {
        return None;
    }
    ContentBlock::paragraph(&text)
}

/// Resolve an image reference against the source origin or the page URL.
pub fn absolutize_image(src: &str, source: Source, page_url: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if src.starts_with('/') {
        return Some(format!("{}{}", source.origin(), src));
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        return Some(src.to_string());
    }
    Url::parse(page_url)
        .and_then(|base| base.join(src))
        .ok()
        .map(String::from)
}

/// `background-image: url('...')` from an inline style.
pub fn background_image(el: &ElementRef<'_>) -> Option<String> {
    let style = el.value().attr("style")?;
    if !style.contains("background-image") {
        return None;
    }
    let start = style.find("url(")? + "url(".len();
    let end = start + style[start..].find(')')?;
    let src = style[start..end].trim().trim_matches(|c| c == '\'' || c == '"');
    (!src.is_empty()).then(|| src.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_new_module_root_and_boilerplate() {
        let page = r#"
            <html><body>
              <nav><p>Navigation paragraph outside the module</p></nav>
              <div class="module">
                <h2>Before &amp; After</h2>
                <img src="/brandnew/images/logo.png">
                <img data-src="//cdn.example.com/pic.jpg">
                <div style="background-image: url('https://cdn.example.com/bg.jpg')"></div>
                <p>The new identity replaces a logo in use since 1985.</p>
                <p>Subscribe to Brand New for daily updates</p>
                <p>Too short</p>
              </div>
            </body></html>"#;
        let blocks = extract_html_blocks(page, Source::BrandNew, "https://www.underconsideration.com/brandnew/archives/x.php");
        assert_eq!(
            blocks,
            vec![
                ContentBlock::Heading("Before & After".into()),
                ContentBlock::Image("https://www.underconsideration.com/brandnew/images/logo.png".into()),
                ContentBlock::Image("https://cdn.example.com/pic.jpg".into()),
                ContentBlock::Image("https://cdn.example.com/bg.jpg".into()),
                ContentBlock::Paragraph("The new identity replaces a logo in use since 1985.".into()),
            ]
        );
    }

    #[test]
    fn falls_back_to_document_root() {
        let page = "<html><body><p>Only a loose paragraph in the body.</p></body></html>";
        let blocks = extract_html_blocks(page, Source::Bpando, "https://bpando.org/2025/01/02/x/");
        assert_eq!(blocks, vec![ContentBlock::Paragraph("Only a loose paragraph in the body.".into())]);
    }

    #[test]
    fn relative_images_resolve_against_page() {
        assert_eq!(
            absolutize_image("img/a.png", Source::TheDrum, "https://www.thedrum.com/news/story").as_deref(),
            Some("https://www.thedrum.com/news/img/a.png")
        );
        assert_eq!(absolutize_image("data:image/png;base64,xx", Source::TheDrum, "https://x.test/"), None);
    }
}

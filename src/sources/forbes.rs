// src/sources/forbes.rs
//! Forbes CMO Network: listing from the page's `__NEXT_DATA__` payload, article
//! bodies through a rendering proxy.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, REFERER};
use reqwest::Client;
use scraper::Html;
use serde_json::Value;
use tracing::{error, info, warn};
use url::Url;

use super::{date_from_url, in_window, Fetcher, USER_AGENT};
use crate::config::ForbesProxyConfig;
use crate::content::html::extract_html_blocks;
use crate::content::{element_text, flatten_html, looks_like_html, selector, ContentExtractor};
use crate::error::FetchError;
use crate::types::{collapse_ws, Article, ContentBlock, Source, FALLBACK_MAX_BLOCKS, MAX_BLOCKS};

const SEED_URL: &str = "https://www.forbes.com/cmo-network/";
const MAX_CANDIDATES: usize = 180;
const DEFAULT_PROXY_ENDPOINT: &str = "https://api.scrape.do/";
const MIN_READ_TIMEOUT_SECS: u64 = 20;
/// Consecutive navigation-like lines that end the body once it has started.
const NAV_STREAK_LIMIT: usize = 10;

const SECTION_HEADINGS: [&str; 7] = [
    "Topline",
    "Key Facts",
    "Crucial Quote",
    "Big Number",
    "Key Background",
    "Tangent",
    "What To Watch",
];

const NAV_LABELS: [&str; 8] = [
    "newsletters",
    "games",
    "share a news tip",
    "breaking news",
    "white house watch",
    "see all",
    "billionaires",
    "innovation",
];

const BLOCK_PAGE_MARKERS: [&str; 4] = [
    "please enable js and disable any ad blocker",
    "you have been blocked | forbes",
    "captcha-delivery.com",
    "geo.captcha-delivery.com/captcha",
];

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\((https?://[^)]+)\)").unwrap());
static LINK_RESIDUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-\*\|]+").unwrap());
static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\*\-•]\s*").unwrap());
static SEE_ALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"see\s*all$").unwrap());
static BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://\S+$").unwrap());
static SLUG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_]+").unwrap());

/// Canonical `https://www.forbes.com/...` form; empty for off-site links.
pub fn normalize_forbes_article_url(raw: &str) -> String {
    let href = raw.trim();
    if href.is_empty() {
        return String::new();
    }
    let href = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("https://www.forbes.com{href}")
    } else if let Some(rest) = href.strip_prefix("http://") {
        format!("https://{rest}")
    } else {
        href.to_string()
    };

    let Ok(url) = Url::parse(&href) else {
        return String::new();
    };
    let mut host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if host == "forbes.com" {
        host = "www.forbes.com".to_string();
    }
    if !host.ends_with("forbes.com") {
        return String::new();
    }
    let mut path = url.path().to_string();
    if path != "/" {
        path = path.trim_end_matches('/').to_string();
    }
    format!("https://{host}{path}")
}

fn is_dated_article(link: &str) -> bool {
    link.contains("/sites/") && date_from_url(&format!("{link}/")).is_some()
}

fn slug_title(link: &str) -> String {
    let slug = link.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    SLUG_SEPARATORS.replace_all(slug, " ").trim().to_string()
}

fn strip_forbes_suffix(title: &str) -> String {
    title.strip_suffix(" - Forbes").unwrap_or(title).trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub link: String,
    pub summary: String,
}

fn push_candidate(out: &mut Vec<Candidate>, title: &str, url: &str, summary: &str) {
    let link = normalize_forbes_article_url(url);
    if link.is_empty() || !is_dated_article(&link) {
        return;
    }
    let title = collapse_ws(&html_escape::decode_html_entities(title));
    let title = if title.is_empty() { slug_title(&link) } else { title };
    out.push(Candidate {
        title: strip_forbes_suffix(&title),
        link,
        summary: collapse_ws(&html_escape::decode_html_entities(summary)),
    });
}

fn str_field<'a>(item: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .filter_map(|k| item.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Editors' picks, row latest-content and row block items, in page order.
pub fn extract_candidates(next_data: &Value) -> Vec<Candidate> {
    let data = &next_data["props"]["pageProps"]["data"];
    let mut out = Vec::new();

    for item in data["editorsPicks"].as_array().into_iter().flatten() {
        push_candidate(&mut out, str_field(item, &["title"]), str_field(item, &["uri"]), "");
    }

    for row in data["rows"].as_array().into_iter().flatten() {
        for item in row["latestContent"].as_array().into_iter().flatten() {
            push_candidate(
                &mut out,
                str_field(item, &["title"]),
                str_field(item, &["uri", "url"]),
                str_field(item, &["description"]),
            );
        }

        let block_items: Vec<&Value> = match &row["blocks"] {
            Value::Object(_) => row["blocks"]["items"].as_array().into_iter().flatten().collect(),
            Value::Array(blocks) => blocks
                .iter()
                .flat_map(|b| b["items"].as_array().into_iter().flatten())
                .collect(),
            _ => Vec::new(),
        };
        for item in block_items {
            push_candidate(
                &mut out,
                str_field(item, &["title"]),
                str_field(item, &["url", "uri"]),
                str_field(item, &["description"]),
            );
        }
    }
    out
}

/// Anchor scan used when the embedded payload is missing or empty.
fn anchor_candidates(doc: &Html) -> Vec<Candidate> {
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for a in doc.select(&anchors) {
        let raw = a.value().attr("href").unwrap_or_default();
        let link = normalize_forbes_article_url(raw);
        if link.is_empty() || !is_dated_article(&link) {
            continue;
        }
        if !raw.to_lowercase().contains("ss=cmo-network") && !link.to_lowercase().contains("/cmo-network/") {
            continue;
        }
        out.push(Candidate {
            title: element_text(&a),
            link,
            summary: String::new(),
        });
    }
    out
}

/// Candidates from the CMO Network page: embedded payload first, anchors otherwise.
pub fn parse_listing_candidates(page: &str) -> Vec<Candidate> {
    let doc = Html::parse_document(page);
    let mut out = Vec::new();
    if let Some(script) = selector("script#__NEXT_DATA__").and_then(|s| doc.select(&s).next()) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(&raw) {
            Ok(next_data) => out = extract_candidates(&next_data),
            Err(e) => error!(error = %e, "forbes_next_data_parse_error"),
        }
    }
    if out.is_empty() {
        out = anchor_candidates(&doc);
    }
    out
}

/// Listing candidates, or a parse error when the page is a bot challenge.
pub fn listing_from_page(page: &str) -> Result<Vec<Candidate>, FetchError> {
    if is_block_page(page) {
        return Err(FetchError::Parse {
            site: Source::ForbesCmo.name().to_string(),
            message: "listing page is a bot challenge".to_string(),
        });
    }
    Ok(parse_listing_candidates(page))
}

/// Window filter plus title cleanup; repeated links keep the longest summary.
pub fn select_articles(candidates: Vec<Candidate>, start: NaiveDate, end: NaiveDate) -> Vec<Article> {
    let mut order: Vec<String> = Vec::new();
    let mut by_link: HashMap<String, Article> = HashMap::new();

    for c in candidates.into_iter().take(MAX_CANDIDATES) {
        let Some(date) = date_from_url(&format!("{}/", c.link)).filter(|d| in_window(*d, start, end)) else {
            continue;
        };
        let mut title = c.title.trim().to_string();
        if let Some((head, _)) = title.split_once(" | ") {
            title = head.trim().to_string();
        }
        if title.chars().count() < 10 {
            title = slug_title(&c.link);
        }
        let title = strip_forbes_suffix(&title);

        if let Some(existing) = by_link.get_mut(&c.link) {
            let current = existing.summary.as_deref().unwrap_or_default();
            if c.summary.chars().count() > current.chars().count() {
                existing.summary = Some(c.summary);
            }
            continue;
        }
        order.push(c.link.clone());
        let article = Article::new(title, c.link.clone(), date, Source::ForbesCmo).with_summary(c.summary);
        by_link.insert(c.link, article);
    }

    order.into_iter().filter_map(|l| by_link.remove(&l)).collect()
}

pub struct ForbesFetcher {
    client: Client,
    timeout: Duration,
}

impl ForbesFetcher {
    pub fn new(client: Client, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Fetcher for ForbesFetcher {
    fn source(&self) -> Source {
        Source::ForbesCmo
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Article>, FetchError> {
        let site = Source::ForbesCmo.name();
        let rsp = self
            .client
            .get(SEED_URL)
            .header(REFERER, SEED_URL)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::transport(site, e))?;
        if !rsp.status().is_success() {
            return Err(FetchError::Status {
                site: site.to_string(),
                status: rsp.status().as_u16(),
            });
        }
        let page = rsp.text().await.map_err(|e| FetchError::transport(site, e))?;
        Ok(select_articles(listing_from_page(&page)?, start, end))
    }
}

pub fn is_block_page(text: &str) -> bool {
    let lower = text.to_lowercase();
    BLOCK_PAGE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Drop navigation noise from flattened page text.
pub fn clean_forbes_text(text: &str) -> String {
    let mut cleaned: Vec<String> = Vec::new();
    let mut nav_streak = 0usize;

    for raw in text.lines() {
        let mut line = collapse_ws(raw);
        if line.is_empty() {
            continue;
        }

        let has_link = MARKDOWN_LINK.is_match(&line);
        if has_link {
            let residue = MARKDOWN_LINK.replace_all(&line, "");
            if LINK_RESIDUE.replace_all(&residue, "").is_empty() {
                nav_streak += 1;
                if nav_streak >= NAV_STREAK_LIMIT && cleaned.len() >= 3 {
                    break;
                }
                continue;
            }
            line = collapse_ws(&MARKDOWN_LINK.replace_all(&line, " $1 "));
        }

        let line = LIST_MARKER.replace(&line, "").trim().to_string();
        if line.is_empty() {
            nav_streak += 1;
            continue;
        }

        let lower = line.to_lowercase();
        if NAV_LABELS.contains(&lower.as_str()) {
            nav_streak += 1;
            if nav_streak >= NAV_STREAK_LIMIT && cleaned.len() >= 3 {
                break;
            }
            continue;
        }
        if (SEE_ALL.is_match(&lower) && line.chars().count() <= 40) || BARE_URL.is_match(&line) {
            nav_streak += 1;
            continue;
        }

        cleaned.push(line);
        nav_streak = 0;
    }
    cleaned.join("\n").trim().to_string()
}

/// Recognizes the house section headings and list items; repeated lines are skipped.
pub fn forbes_text_blocks(text: &str, max_blocks: usize) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut last_line = String::new();

    for raw in text.lines() {
        let raw = raw.trim();
        let line = collapse_ws(raw);
        if line.is_empty() || line == last_line {
            continue;
        }
        last_line = line.clone();

        let block = if SECTION_HEADINGS.contains(&line.as_str()) {
            ContentBlock::heading(&line)
        } else if raw.starts_with("* ") || raw.starts_with("- ") || raw.starts_with("• ") {
            let item = LIST_MARKER.replace(&line, "");
            (item.trim().chars().count() >= 12)
                .then(|| ContentBlock::bullet(&item))
                .flatten()
        } else if line.chars().count() >= 20 {
            ContentBlock::paragraph(&line)
        } else {
            None
        };

        blocks.extend(block);
        if blocks.len() >= max_blocks {
            break;
        }
    }
    blocks
}

/// `https` first, then the `http` twin of the configured proxy endpoint.
pub fn endpoint_candidates(configured: &str) -> Vec<String> {
    let configured = configured.trim();
    let primary = if configured.is_empty() {
        DEFAULT_PROXY_ENDPOINT.to_string()
    } else if configured.starts_with("http://") || configured.starts_with("https://") {
        configured.to_string()
    } else {
        format!("https://{}", configured.trim_start_matches('/'))
    };

    if let Some(rest) = primary.strip_prefix("http://") {
        vec![format!("https://{rest}"), primary.clone()]
    } else if let Some(rest) = primary.strip_prefix("https://") {
        vec![primary.clone(), format!("http://{rest}")]
    } else {
        vec![primary]
    }
}

/// Article bodies through the rendering proxy, with the snapshot check enabled.
pub struct ForbesExtractor {
    proxy: ForbesProxyConfig,
    client: Client,
}

impl ForbesExtractor {
    pub fn new(proxy: ForbesProxyConfig, http_timeout_secs: u64) -> Self {
        let connect = Duration::from_secs(http_timeout_secs.clamp(5, 20));
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { proxy, client }
    }

    async fn backoff(&self, attempt: u32, max_attempts: u32) {
        if attempt < max_attempts && self.proxy.retry_delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(self.proxy.retry_delay_secs)).await;
        }
    }
}

#[async_trait]
impl ContentExtractor for ForbesExtractor {
    /// Empty when no proxy token is configured or every attempt failed.
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let Some(token) = self.proxy.token.as_deref() else {
            return Ok(String::new());
        };
        let target = match normalize_forbes_article_url(url) {
            t if t.is_empty() => url.to_string(),
            t => t,
        };
        let max_attempts = self.proxy.retries.max(1);
        let read_timeout = Duration::from_secs(self.proxy.timeout_secs.max(MIN_READ_TIMEOUT_SECS));

        for endpoint in endpoint_candidates(&self.proxy.endpoint) {
            for attempt in 1..=max_attempts {
                let sent = self
                    .client
                    .get(&endpoint)
                    .query(&[("url", target.as_str()), ("token", token), ("output", "raw")])
                    .timeout(read_timeout)
                    .send()
                    .await;
                let rsp = match sent {
                    Ok(r) => r,
                    Err(e) if e.is_timeout() => {
                        warn!(url = %target, endpoint = %endpoint, attempt, max_attempts, error = %e, "forbes_scrapedo_timeout");
                        self.backoff(attempt, max_attempts).await;
                        continue;
                    }
                    Err(e) => {
                        error!(url = %target, endpoint = %endpoint, attempt, error = %e, "forbes_scrapedo_fetch_error");
                        self.backoff(attempt, max_attempts).await;
                        continue;
                    }
                };

                let status = rsp.status().as_u16();
                if status != 200 {
                    error!(url = %target, endpoint = %endpoint, attempt, status_code = status, "forbes_scrapedo_fetch_failed");
                    self.backoff(attempt, max_attempts).await;
                    continue;
                }

                let body = match rsp.text().await {
                    Ok(b) => b.trim().to_string(),
                    Err(e) => {
                        error!(url = %target, endpoint = %endpoint, attempt, error = %e, "forbes_scrapedo_fetch_error");
                        self.backoff(attempt, max_attempts).await;
                        continue;
                    }
                };
                if body.is_empty() {
                    warn!(url = %target, endpoint = %endpoint, attempt, "forbes_scrapedo_empty_response");
                    self.backoff(attempt, max_attempts).await;
                    continue;
                }
                if is_block_page(&body) {
                    warn!(url = %target, endpoint = %endpoint, attempt, "forbes_scrapedo_block_page");
                    self.backoff(attempt, max_attempts).await;
                    continue;
                }

                info!(url = %target, endpoint = %endpoint, attempt, chars = body.len(), "forbes_scrapedo_content_used");
                return Ok(body);
            }
        }
        Ok(String::new())
    }

    fn extract_blocks(&self, page: &str, url: &str) -> Vec<ContentBlock> {
        if !looks_like_html(page) {
            let blocks = forbes_text_blocks(page, MAX_BLOCKS);
            if !blocks.is_empty() {
                return blocks;
            }
        }
        extract_html_blocks(page, Source::ForbesCmo, url)
    }

    fn text_blocks(&self, page: &str) -> Vec<ContentBlock> {
        forbes_text_blocks(&clean_forbes_text(&flatten_html(page)), MAX_BLOCKS)
    }

    fn fallback_blocks(&self, text: &str) -> Vec<ContentBlock> {
        let blocks = forbes_text_blocks(text, FALLBACK_MAX_BLOCKS);
        if !blocks.is_empty() {
            return blocks;
        }
        let blocks = crate::content::paragraph_blocks(text, FALLBACK_MAX_BLOCKS);
        if !blocks.is_empty() {
            return blocks;
        }
        ContentBlock::paragraph(text).into_iter().collect()
    }

    fn snapshot_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn article_urls_are_canonicalized() {
        assert_eq!(
            normalize_forbes_article_url("http://forbes.com/sites/jane/2025/03/04/story/?ss=cmo-network"),
            "https://www.forbes.com/sites/jane/2025/03/04/story"
        );
        assert_eq!(
            normalize_forbes_article_url("/sites/jane/2025/03/04/story/"),
            "https://www.forbes.com/sites/jane/2025/03/04/story"
        );
        assert_eq!(normalize_forbes_article_url("https://example.com/a"), "");
        assert_eq!(normalize_forbes_article_url(""), "");
    }

    #[test]
    fn next_data_candidates_cover_all_shapes() {
        let data = json!({ "props": { "pageProps": { "data": {
            "editorsPicks": [ { "title": "Editor Pick Story - Forbes", "uri": "https://www.forbes.com/sites/a/2025/03/04/pick/" } ],
            "rows": [
                { "latestContent": [ { "title": "", "url": "https://www.forbes.com/sites/b/2025/03/05/the-latest-thing/", "description": "Latest  summary" } ] },
                { "blocks": { "items": [ { "title": "Block Item", "url": "https://www.forbes.com/sites/c/2025/03/06/block/" } ] } },
                { "blocks": [ { "items": [ { "title": "Nested", "uri": "https://www.forbes.com/lists/not-an-article/" } ] } ] }
            ]
        } } } });
        let got = extract_candidates(&data);
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].title, "Editor Pick Story");
        assert_eq!(got[1].title, "the latest thing");
        assert_eq!(got[1].summary, "Latest summary");
        assert_eq!(got[2].link, "https://www.forbes.com/sites/c/2025/03/06/block");
    }

    #[test]
    fn select_articles_filters_window_and_merges_summaries() {
        let c = |title: &str, link: &str, summary: &str| Candidate {
            title: title.into(),
            link: link.into(),
            summary: summary.into(),
        };
        let got = select_articles(
            vec![
                c("A Long Enough Title | Forbes CMO", "https://www.forbes.com/sites/a/2025/03/04/first-story", ""),
                c("dup", "https://www.forbes.com/sites/a/2025/03/04/first-story", "Longer summary wins"),
                c("Out of window title", "https://www.forbes.com/sites/a/2024/01/01/old", ""),
            ],
            d(2025, 3, 1),
            d(2025, 3, 8),
        );
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, "A Long Enough Title");
        assert_eq!(got[0].summary.as_deref(), Some("Longer summary wins"));
        assert_eq!(got[0].date, d(2025, 3, 4));
    }

    #[test]
    fn listing_falls_back_to_anchors() {
        let page = r#"<html><body>
            <a href="https://www.forbes.com/sites/x/2025/03/04/anchor-story/?ss=cmo-network">Anchor Story Title</a>
            <a href="https://www.forbes.com/sites/x/2025/03/04/unrelated/">Unrelated</a>
        </body></html>"#;
        let got = parse_listing_candidates(page);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, "Anchor Story Title");
    }

    #[test]
    fn blocked_listing_is_a_parse_error() {
        let page = r#"<html><head><title>You have been blocked | Forbes</title></head>
            <body><script src="https://geo.captcha-delivery.com/captcha/"></script></body></html>"#;
        let err = listing_from_page(page).unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert_eq!(
            err.to_string(),
            "Error parsing Forbes CMO Network: listing page is a bot challenge"
        );

        let ok = r#"<a href="https://www.forbes.com/sites/x/2025/03/04/anchor-story/?ss=cmo-network">Anchor Story Title</a>"#;
        assert_eq!(listing_from_page(ok).unwrap().len(), 1);
    }

    #[test]
    fn cleaner_drops_navigation() {
        let text = "[Newsletters](https://www.forbes.com/newsletters)\nGames\n\
                    * The first real paragraph of the story body.\n\
                    https://www.forbes.com/x\nSee all\n\
                    Read [the report](https://example.com/r) for details.";
        assert_eq!(
            clean_forbes_text(text),
            "The first real paragraph of the story body.\nRead the report for details."
        );
    }

    #[test]
    fn text_blocks_recognize_headings_and_bullets() {
        let text = "Topline\nTopline\n* A bullet that is long enough\n- short\nA plain paragraph of decent length.\ntiny";
        assert_eq!(
            forbes_text_blocks(text, 50),
            vec![
                ContentBlock::Heading("Topline".into()),
                ContentBlock::BulletedItem("A bullet that is long enough".into()),
                ContentBlock::Paragraph("A plain paragraph of decent length.".into()),
            ]
        );
    }

    #[test]
    fn endpoints_try_https_then_http() {
        assert_eq!(
            endpoint_candidates(""),
            vec!["https://api.scrape.do/".to_string(), "http://api.scrape.do/".to_string()]
        );
        assert_eq!(
            endpoint_candidates("http://proxy.test/"),
            vec!["https://proxy.test/".to_string(), "http://proxy.test/".to_string()]
        );
        assert_eq!(endpoint_candidates("proxy.test").first().map(String::as_str), Some("https://proxy.test"));
    }

    #[test]
    fn block_pages_are_detected() {
        assert!(is_block_page("<title>You have been blocked | Forbes</title>"));
        assert!(!is_block_page("<p>Regular article</p>"));
    }

    #[tokio::test]
    async fn unconfigured_proxy_returns_empty_page() {
        let ex = ForbesExtractor::new(ForbesProxyConfig::default(), 20);
        assert_eq!(ex.fetch_page("https://www.forbes.com/sites/a/2025/03/04/x").await.unwrap(), "");
        assert!(ex.snapshot_check());
    }
}

// src/sources/mod.rs
//! Per-source listing fetchers and the registry pairing each source with
//! its fetcher and content extractor.

pub mod bpando;
pub mod brand_new;
pub mod branding_journal;
pub mod branding_mag;
pub mod forbes;
pub mod the_drum;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;

use crate::config::AppConfig;
use crate::content::html::HtmlExtractor;
use crate::content::ContentExtractor;
use crate::error::FetchError;
use crate::types::{Article, Source};

pub const USER_AGENT: &str = "Mozilla/5.0";
/// Article pages probed per run for sources whose listing carries no dates.
pub const MAX_PROBED_ARTICLES: usize = 90;

#[async_trait]
pub trait Fetcher: Send + Sync {
    fn source(&self) -> Source;

    /// Articles dated within `[start, end]`.
    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Article>, FetchError>;
}

#[derive(Clone)]
pub struct SourceStrategy {
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn ContentExtractor>,
}

#[derive(Clone, Default)]
pub struct SourceRegistry {
    strategies: HashMap<Source, SourceStrategy>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyed by `fetcher.source()`; a second registration replaces the first.
    pub fn register(&mut self, fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn ContentExtractor>) {
        self.strategies
            .insert(fetcher.source(), SourceStrategy { fetcher, extractor });
    }

    pub fn with(mut self, fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.register(fetcher, extractor);
        self
    }

    pub fn get(&self, source: Source) -> Option<&SourceStrategy> {
        self.strategies.get(&source)
    }

    pub fn sources(&self) -> Vec<Source> {
        let mut out: Vec<_> = self.strategies.keys().copied().collect();
        out.sort();
        out
    }

    /// The production wiring: real HTTP fetchers for all six sources.
    pub fn live(cfg: &AppConfig) -> Self {
        let client = http_client();
        let t = cfg.http_timeout_secs;
        let html = |s: Source| -> Arc<dyn ContentExtractor> {
            Arc::new(HtmlExtractor::new(s, client.clone(), t))
        };

        Self::new()
            .with(Arc::new(brand_new::BrandNewFetcher::new(client.clone(), t)), html(Source::BrandNew))
            .with(
                Arc::new(branding_journal::BrandingJournalFetcher::new(client.clone(), t)),
                html(Source::BrandingJournal),
            )
            .with(
                Arc::new(branding_mag::BrandingMagFetcher::new(client.clone(), t)),
                html(Source::BrandingMag),
            )
            .with(Arc::new(bpando::BpandoFetcher::new(client.clone(), t)), html(Source::Bpando))
            .with(Arc::new(the_drum::TheDrumFetcher::new(client.clone(), t)), html(Source::TheDrum))
            .with(
                Arc::new(forbes::ForbesFetcher::new(client.clone(), t)),
                Arc::new(forbes::ForbesExtractor::new(cfg.forbes_proxy.clone(), t)),
            )
    }
}

pub fn http_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// GET a page body; non-2xx is an error.
pub async fn get_text(
    client: &Client,
    url: &str,
    timeout: Duration,
    site: &str,
) -> Result<String, FetchError> {
    let rsp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| FetchError::transport(site, e))?;
    let status = rsp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            site: site.to_string(),
            status: status.as_u16(),
        });
    }
    rsp.text().await.map_err(|e| FetchError::transport(site, e))
}

pub fn in_window(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    start <= date && date <= end
}

/// Prefix site-relative links with the source origin.
pub fn absolutize(href: &str, origin: &str) -> String {
    let href = href.trim();
    if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        href.to_string()
    }
}

/// `/YYYY/MM/DD/` in a URL path.
pub fn date_from_url(url: &str) -> Option<NaiveDate> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"/(\d{4})/(\d{2})/(\d{2})/").unwrap());
    let caps = re.captures(url)?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

/// Publication date from page metadata, falling back to the URL path.
pub fn parse_article_date_from_html(html: &str, url_hint: &str) -> Option<NaiveDate> {
    static PATTERNS: OnceCell<Vec<Regex>> = OnceCell::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            r#"property="article:published_time"\s+content="(\d{4}-\d{2}-\d{2})"#,
            r#""datePublished"\s*:\s*"(\d{4}-\d{2}-\d{2})"#,
            r#""dateModified"\s*:\s*"(\d{4}-\d{2}-\d{2})"#,
            r#"itemprop="datePublished"\s+content="(\d{4}-\d{2}-\d{2})"#,
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    });

    patterns
        .iter()
        .filter_map(|re| re.captures(html))
        .find_map(|caps| NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok())
        .or_else(|| date_from_url(url_hint))
}

/// "Monday January 6, 2025" style headers; leading weekday optional.
pub fn parse_long_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%B %d, %Y").ok().or_else(|| {
        let (_, rest) = text.split_once(char::is_whitespace)?;
        NaiveDate::parse_from_str(rest.trim(), "%B %d, %Y").ok()
    })
}

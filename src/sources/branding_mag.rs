use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::Html;
use tracing::debug;

use super::{absolutize, get_text, in_window, Fetcher, MAX_PROBED_ARTICLES};
use crate::content::{element_text, selector};
use crate::error::FetchError;
use crate::types::{Article, Source};

const LISTING_URL: &str = "https://www.brandingmag.com/";
const MIN_TITLE_CHARS: usize = 26;
const EXCLUDED_SEGMENTS: [&str; 7] = [
    "/product/",
    "/category/",
    "/author/",
    "/tag/",
    "/about/",
    "/contact/",
    "/subscribe/",
];

static DATE_PUBLISHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""datePublished":"(\d{4}-\d{2}-\d{2})"#).unwrap());
static DATE_MODIFIED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"itemprop="dateModified" content="(\d{4}-\d{2}-\d{2})"#).unwrap());

pub struct BrandingMagFetcher {
    client: Client,
    timeout: Duration,
}

impl BrandingMagFetcher {
    pub fn new(client: Client, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Fetcher for BrandingMagFetcher {
    fn source(&self) -> Source {
        Source::BrandingMag
    }

    /// The homepage carries no dates, so every candidate page is probed.
    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Article>, FetchError> {
        let site = Source::BrandingMag.name();
        let page = get_text(&self.client, LISTING_URL, self.timeout, site).await?;

        let mut out = Vec::new();
        for (title, link) in parse_candidates(&page).into_iter().take(MAX_PROBED_ARTICLES) {
            let body = match get_text(&self.client, &link, self.timeout, site).await {
                Ok(b) => b,
                Err(e) => {
                    debug!(url = %link, error = %e, "article_probe_failed");
                    continue;
                }
            };
            if let Some(date) = page_date(&body).filter(|d| in_window(*d, start, end)) {
                out.push(Article::new(title, link, date, Source::BrandingMag));
            }
        }
        Ok(out)
    }
}

/// (title, link) pairs for on-site anchors with article-length text, first link wins.
pub fn parse_candidates(page: &str) -> Vec<(String, String)> {
    let doc = Html::parse_document(page);
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for a in doc.select(&anchors) {
        let href = absolutize(a.value().attr("href").unwrap_or_default(), "https://www.brandingmag.com");
        let title = element_text(&a);
        if !href.contains("brandingmag.com/") || title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }
        if EXCLUDED_SEGMENTS.iter().any(|seg| href.contains(seg)) {
            continue;
        }
        if seen.insert(href.clone()) {
            out.push((title, href));
        }
    }
    out
}

pub fn page_date(body: &str) -> Option<NaiveDate> {
    DATE_PUBLISHED
        .captures(body)
        .or_else(|| DATE_MODIFIED.captures(body))
        .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_skip_short_and_section_links() {
        let page = r#"
          <a href="/2025/03/02/why-brands-are-rethinking-their-logos/">Why brands are rethinking their logos now</a>
          <a href="https://www.brandingmag.com/2025/03/02/why-brands-are-rethinking-their-logos/">Duplicate of the same article link</a>
          <a href="/category/design/">A category link that is quite long indeed</a>
          <a href="/short/">Short</a>
          <a href="https://elsewhere.test/article-with-a-very-long-title">An offsite article with a very long title</a>"#;
        let got = parse_candidates(page);
        assert_eq!(
            got,
            vec![(
                "Why brands are rethinking their logos now".to_string(),
                "https://www.brandingmag.com/2025/03/02/why-brands-are-rethinking-their-logos/".to_string()
            )]
        );
    }

    #[test]
    fn page_date_prefers_json_ld() {
        assert_eq!(
            page_date(r#"{"datePublished":"2025-03-02T08:00:00"} <meta itemprop="dateModified" content="2025-03-05">"#),
            NaiveDate::from_ymd_opt(2025, 3, 2)
        );
        assert_eq!(
            page_date(r#"<meta itemprop="dateModified" content="2025-03-05">"#),
            NaiveDate::from_ymd_opt(2025, 3, 5)
        );
        assert_eq!(page_date("<html></html>"), None);
    }
}

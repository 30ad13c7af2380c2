use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use scraper::Html;
use tracing::debug;

use super::{absolutize, get_text, in_window, parse_article_date_from_html, Fetcher, MAX_PROBED_ARTICLES};
use crate::content::{element_text, selector};
use crate::error::FetchError;
use crate::types::{Article, Source};

const ORIGIN: &str = "https://www.thedrum.com";
const SEED_URLS: [&str; 2] = ["https://www.thedrum.com/", "https://www.thedrum.com/news"];
const MIN_TITLE_CHARS: usize = 15;
const ARTICLE_SEGMENTS: [&str; 3] = ["/news/", "/opinion/", "/work/"];
const EXCLUDED_SEGMENTS: [&str; 6] = ["/author/", "/topic/", "/topics/", "/events/", "/jobs/", "/directory/"];

pub struct TheDrumFetcher {
    client: Client,
    timeout: Duration,
}

impl TheDrumFetcher {
    pub fn new(client: Client, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Fetcher for TheDrumFetcher {
    fn source(&self) -> Source {
        Source::TheDrum
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Article>, FetchError> {
        let site = Source::TheDrum.name();
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for seed in SEED_URLS {
            let page = get_text(&self.client, seed, self.timeout, site).await?;
            for (title, link) in parse_candidates(&page) {
                if seen.insert(link.clone()) {
                    candidates.push((title, link));
                }
            }
        }

        let mut out = Vec::new();
        for (title, link) in candidates.into_iter().take(MAX_PROBED_ARTICLES) {
            let body = match get_text(&self.client, &link, self.timeout, site).await {
                Ok(b) => b,
                Err(e) => {
                    debug!(url = %link, error = %e, "article_probe_failed");
                    continue;
                }
            };
            if let Some(date) = parse_article_date_from_html(&body, &link).filter(|d| in_window(*d, start, end)) {
                out.push(Article::new(title, link, date, Source::TheDrum));
            }
        }
        Ok(out)
    }
}

/// Editorial links from a seed page, query and fragment stripped.
pub fn parse_candidates(page: &str) -> Vec<(String, String)> {
    let doc = Html::parse_document(page);
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for a in doc.select(&anchors) {
        let mut href = absolutize(a.value().attr("href").unwrap_or_default(), ORIGIN);
        if !href.starts_with("https://www.thedrum.com/") {
            continue;
        }
        if let Some(cut) = href.find(['#', '?']) {
            href.truncate(cut);
        }
        if !ARTICLE_SEGMENTS.iter().any(|s| href.contains(s)) || EXCLUDED_SEGMENTS.iter().any(|s| href.contains(s)) {
            continue;
        }
        let title = element_text(&a);
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }
        if seen.insert(href.clone()) {
            out.push((title, href));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_links_are_filtered_and_stripped() {
        let page = r#"
          <a href="/news/2025/03/04/agency-wins-big-pitch?utm_source=home#top">Agency wins a big pitch today</a>
          <a href="/news/2025/03/04/agency-wins-big-pitch">Agency wins a big pitch again</a>
          <a href="/author/someone/news/">Some author page with a long name</a>
          <a href="/opinion/short">Too short</a>
          <a href="https://elsewhere.test/news/x">Offsite news article link text</a>"#;
        assert_eq!(
            parse_candidates(page),
            vec![(
                "Agency wins a big pitch today".to_string(),
                "https://www.thedrum.com/news/2025/03/04/agency-wins-big-pitch".to_string()
            )]
        );
    }
}

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use scraper::Html;

use super::{date_from_url, get_text, in_window, Fetcher};
use crate::content::{element_text, selector};
use crate::error::FetchError;
use crate::types::{Article, Source};

const LISTING_URL: &str = "https://bpando.org/";
const MIN_TITLE_CHARS: usize = 6;
/// Section labels glued to the front of card titles.
const TITLE_PREFIXES: [&str; 2] = ["BP&O VoicesPackaging:", "BP&O VoicesJobs:"];

pub struct BpandoFetcher {
    client: Client,
    timeout: Duration,
}

impl BpandoFetcher {
    pub fn new(client: Client, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Fetcher for BpandoFetcher {
    fn source(&self) -> Source {
        Source::Bpando
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Article>, FetchError> {
        let page = get_text(&self.client, LISTING_URL, self.timeout, Source::Bpando.name()).await?;
        Ok(parse_listing(&page, start, end))
    }
}

/// Dates come from the `/YYYY/MM/DD/` permalink.
pub fn parse_listing(page: &str, start: NaiveDate, end: NaiveDate) -> Vec<Article> {
    let doc = Html::parse_document(page);
    let (Some(anchors), Some(heading)) = (selector("a[href]"), selector("h1, h2, h3")) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for a in doc.select(&anchors) {
        let href = a.value().attr("href").unwrap_or_default().trim();
        let mut title = a
            .select(&heading)
            .next()
            .map(|h| element_text(&h))
            .unwrap_or_else(|| element_text(&a));
        let Some(date) = date_from_url(href) else {
            continue;
        };
        if title.chars().count() < MIN_TITLE_CHARS || !in_window(date, start, end) {
            continue;
        }
        for prefix in TITLE_PREFIXES {
            title = title.replace(prefix, "");
        }
        if seen.insert(href.to_string()) {
            out.push(Article::new(title.trim(), href, date, Source::Bpando));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permalink_dates_and_prefix_cleanup() {
        let page = r#"
          <a href="https://bpando.org/2025/03/04/new-pack/"><h2>BP&amp;O VoicesPackaging: New Pack Design</h2></a>
          <a href="https://bpando.org/2025/03/04/new-pack/">New Pack Design</a>
          <a href="https://bpando.org/2025/01/01/old/">An older article</a>
          <a href="https://bpando.org/about/">About BP&amp;O</a>
          <a href="https://bpando.org/2025/03/05/x/">Tiny</a>"#;
        let got = parse_listing(
            page,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
        );
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, "New Pack Design");
        assert_eq!(got[0].date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
    }
}

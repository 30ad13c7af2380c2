use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use scraper::Html;

use super::{get_text, in_window, parse_long_date, Fetcher};
use crate::content::{element_text, selector};
use crate::error::FetchError;
use crate::types::{Article, Source};

const LISTING_URL: &str = "https://www.thebrandingjournal.com/";

pub struct BrandingJournalFetcher {
    client: Client,
    timeout: Duration,
}

impl BrandingJournalFetcher {
    pub fn new(client: Client, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Fetcher for BrandingJournalFetcher {
    fn source(&self) -> Source {
        Source::BrandingJournal
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Article>, FetchError> {
        let page = get_text(&self.client, LISTING_URL, self.timeout, Source::BrandingJournal.name()).await?;
        Ok(parse_listing(&page, start, end))
    }
}

pub fn parse_listing(page: &str, start: NaiveDate, end: NaiveDate) -> Vec<Article> {
    let doc = Html::parse_document(page);
    let (Some(cards), Some(title_sel), Some(date_sel), Some(link_sel)) = (
        selector("article"),
        selector("h2.cs-entry__title, h3.cs-entry__title"),
        selector("div.cs-meta-date"),
        selector("a[href]"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for card in doc.select(&cards) {
        let (Some(title_el), Some(date_el)) = (card.select(&title_sel).next(), card.select(&date_sel).next())
        else {
            continue;
        };
        let Some(link_el) = title_el.select(&link_sel).next() else {
            continue;
        };
        let Some(date) = parse_long_date(&element_text(&date_el)) else {
            continue;
        };
        if !in_window(date, start, end) {
            continue;
        }
        let link = link_el.value().attr("href").unwrap_or_default().trim();
        out.push(Article::new(element_text(&link_el), link, date, Source::BrandingJournal));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cards_need_title_link_and_date() {
        let page = r#"
          <article>
            <h2 class="cs-entry__title"><a href="https://www.thebrandingjournal.com/2025/03/fresh/">Fresh Identity</a></h2>
            <div class="cs-meta-date">March 4, 2025</div>
          </article>
          <article>
            <h3 class="cs-entry__title"><a href="https://www.thebrandingjournal.com/old/">Old One</a></h3>
            <div class="cs-meta-date">January 4, 2024</div>
          </article>
          <article><h2 class="cs-entry__title">No link</h2><div class="cs-meta-date">March 4, 2025</div></article>"#;
        let got = parse_listing(
            page,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
        );
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, "Fresh Identity");
        assert_eq!(got[0].link, "https://www.thebrandingjournal.com/2025/03/fresh/");
    }
}

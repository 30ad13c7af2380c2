use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use scraper::{ElementRef, Html};

use super::{get_text, in_window, parse_long_date, Fetcher};
use crate::content::selector;
use crate::error::FetchError;
use crate::types::{collapse_ws, Article, Source};

const LISTING_URL: &str = "https://www.underconsideration.com/brandnew/";
/// Category labels that show up as the h2 of a module instead of a title.
const GENERIC_CATEGORIES: [&str; 5] = ["Quirky", "News", "Nice", "Job Board", "Linked"];
const CATEGORY_CLASS: &str = "homepage_editorial_category";

pub struct BrandNewFetcher {
    client: Client,
    timeout: Duration,
}

impl BrandNewFetcher {
    pub fn new(client: Client, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Fetcher for BrandNewFetcher {
    fn source(&self) -> Source {
        Source::BrandNew
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Article>, FetchError> {
        let page = get_text(&self.client, LISTING_URL, self.timeout, Source::BrandNew.name()).await?;
        Ok(parse_listing(&page, start, end))
    }
}

/// Text of a heading minus the category badge span.
fn heading_text(el: &ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let in_badge = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| e.classes().any(|c| c == CATEGORY_CLASS))
        });
        if !in_badge {
            out.push_str(text);
        }
    }
    collapse_ws(&out)
}

fn is_archive_link(href: &str) -> bool {
    href.contains("brandnew/archives/") && href.ends_with(".php")
}

/// Daily sections within the window; one article per module.
pub fn parse_listing(page: &str, start: NaiveDate, end: NaiveDate) -> Vec<Article> {
    let doc = Html::parse_document(page);
    let (Some(sections), Some(date_h1), Some(modules), Some(anchors), Some(titled), Some(h1), Some(h2)) = (
        selector("section.daily"),
        selector("h1.daily_date"),
        selector("div.module"),
        selector("a[href]"),
        selector("h1 a[href], h2 a[href]"),
        selector("h1"),
        selector("h2"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for section in doc.select(&sections) {
        let Some(date) = section
            .select(&date_h1)
            .next()
            .and_then(|h| parse_long_date(&collapse_ws(&h.text().collect::<String>())))
        else {
            continue;
        };
        if !in_window(date, start, end) {
            continue;
        }

        for module in section.select(&modules) {
            let link_el = module
                .select(&anchors)
                .find(|a| a.value().attr("href").is_some_and(is_archive_link))
                .or_else(|| module.select(&titled).next());
            let Some(link_el) = link_el else { continue };
            let Some(link) = link_el.value().attr("href").map(str::trim) else {
                continue;
            };
            if link.contains("/category/") || link.ends_with("#respond") {
                continue;
            }

            let h1_text = module.select(&h1).next().map(|e| heading_text(&e)).unwrap_or_default();
            let h2_text = module.select(&h2).next().map(|e| heading_text(&e)).unwrap_or_default();
            let title = if GENERIC_CATEGORIES.contains(&h2_text.as_str()) && !h1_text.is_empty() {
                h1_text
            } else if !h2_text.is_empty() {
                h2_text
            } else if !h1_text.is_empty() {
                h1_text
            } else {
                collapse_ws(&link_el.text().collect::<String>())
            };

            out.push(Article::new(title, link, date, Source::BrandNew));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
      <section class="daily">
        <h1 class="daily_date">Monday March 3, 2025</h1>
        <div class="module">
          <h1><span class="homepage_editorial_category">Reviewed</span>New Logo for Acme</h1>
          <h2>Quirky</h2>
          <a href="https://www.underconsideration.com/brandnew/archives/new_logo_for_acme.php">Read</a>
        </div>
        <div class="module">
          <h2><a href="https://www.underconsideration.com/brandnew/archives/linked_story.php">A Linked Story</a></h2>
        </div>
        <div class="module">
          <h2><a href="https://www.underconsideration.com/brandnew/category/news/">News</a></h2>
        </div>
      </section>
      <section class="daily">
        <h1 class="daily_date">Friday January 3, 2025</h1>
        <div class="module"><h2><a href="https://www.underconsideration.com/brandnew/archives/old.php">Old</a></h2></div>
      </section>"#;

    #[test]
    fn listing_picks_titles_and_filters_window() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let got = parse_listing(PAGE, start, end);
        let titles: Vec<_> = got.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["New Logo for Acme", "A Linked Story"]);
        assert!(got.iter().all(|a| a.date == end && a.source == Source::BrandNew));
    }
}

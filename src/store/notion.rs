// src/store/notion.rs
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::error;

use super::{Existence, RecordStore, StoredEntry};
use crate::error::StoreError;
use crate::types::{truncate_chars, Article, ContentBlock, Source};

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const ERROR_TEXT_LIMIT: usize = 500;

/// Notion database client. Without credentials every lookup is `Unknown`
/// (so nothing gets created) and every write fails with `NotConfigured`.
#[derive(Clone)]
pub struct NotionStore {
    client: Client,
    token: Option<String>,
    database_id: Option<String>,
    api_base: String,
    timeout: Duration,
}

impl NotionStore {
    pub fn new(token: Option<String>, database_id: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::new(),
            token: token.filter(|t| !t.trim().is_empty()),
            database_id: database_id.filter(|d| !d.trim().is_empty()),
            api_base: NOTION_API.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Point at a different API base (used against local fakes).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.database_id.is_some()
    }

    fn credentials(&self) -> Result<(&str, &str), StoreError> {
        match (self.token.as_deref(), self.database_id.as_deref()) {
            (Some(t), Some(d)) => Ok((t, d)),
            _ => Err(StoreError::NotConfigured),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, StoreError> {
        let (token, _) = self.credentials()?;
        let rsp = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(token)
            .header("Notion-Version", NOTION_VERSION)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;
        let status = rsp.status();
        if status.is_success() {
            return Ok(rsp.json::<Value>().await?);
        }
        let text = rsp.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message: error_text(&text),
        })
    }

    async fn query(&self, payload: &Value) -> Result<Value, StoreError> {
        let (_, db) = self.credentials()?;
        self.post(&format!("/databases/{db}/query"), payload).await
    }
}

/// Extract the store's error message, truncated.
fn error_text(body: &str) -> String {
    let text = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        _ => body.to_string(),
    };
    let text = text.trim();
    if text.chars().count() > ERROR_TEXT_LIMIT {
        format!("{}...(truncated)", truncate_chars(text, ERROR_TEXT_LIMIT))
    } else {
        text.to_string()
    }
}

fn rich_text(text: &str) -> Value {
    json!({ "rich_text": [ { "text": { "content": text } } ] })
}

pub fn block_json(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Paragraph(t) => {
            json!({ "object": "block", "type": "paragraph", "paragraph": rich_text(t) })
        }
        ContentBlock::Heading(t) => {
            json!({ "object": "block", "type": "heading_2", "heading_2": rich_text(t) })
        }
        ContentBlock::BulletedItem(t) => json!({
            "object": "block",
            "type": "bulleted_list_item",
            "bulleted_list_item": rich_text(t)
        }),
        ContentBlock::Image(url) => json!({
            "object": "block",
            "type": "image",
            "image": { "type": "external", "external": { "url": url } }
        }),
    }
}

pub fn page_json(database_id: &str, article: &Article, blocks: Option<&[ContentBlock]>) -> Value {
    let properties = json!({
        "Name": { "title": [ { "text": { "content": article.title } } ] },
        "URL": { "url": article.link },
        "Status": { "select": { "name": "Not Published" } },
        "Platform": { "select": { "name": "Web" } },
        "Date": { "date": { "start": article.date.to_string() } },
        "Blog Name": { "select": { "name": article.source.store_label() } },
    });

    let mut page = json!({
        "parent": { "database_id": database_id },
        "properties": properties,
    });
    if let Some(blocks) = blocks {
        page["children"] = Value::Array(blocks.iter().map(block_json).collect());
    }
    page
}

/// Map a Notion page object into a flat entry.
pub fn parse_entry(page: &Value) -> StoredEntry {
    let props = &page["properties"];

    let title = props["Name"]["title"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["plain_text"].as_str())
                .collect::<String>()
        })
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let url = props["URL"]["url"]
        .as_str()
        .filter(|u| !u.is_empty())
        .or_else(|| page["url"].as_str())
        .unwrap_or_default()
        .to_string();

    let raw_source = props["Blog Name"]["select"]["name"]
        .as_str()
        .or_else(|| props["Blog Name"]["multi_select"][0]["name"].as_str())
        .map(str::trim)
        .unwrap_or_default();
    let source = if raw_source.is_empty() {
        "Unknown".to_string()
    } else {
        Source::from_store_label(raw_source)
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| raw_source.to_string())
    };

    StoredEntry {
        title,
        url,
        source,
        date: props["Date"]["date"]["start"].as_str().unwrap_or_default().to_string(),
        created_time: page["created_time"].as_str().unwrap_or_default().to_string(),
    }
}

fn results(body: &Value) -> Vec<StoredEntry> {
    body["results"]
        .as_array()
        .map(|pages| pages.iter().map(parse_entry).collect())
        .unwrap_or_default()
}

#[async_trait]
impl RecordStore for NotionStore {
    async fn exists(&self, url_variants: &[String]) -> Existence {
        for candidate in url_variants {
            let payload = json!({ "filter": { "property": "URL", "url": { "equals": candidate } } });
            match self.query(&payload).await {
                Ok(body) => {
                    if body["results"].as_array().is_some_and(|r| !r.is_empty()) {
                        return Existence::Found;
                    }
                }
                Err(e) => {
                    error!(url = %candidate, error = %e, "store_url_query_failed");
                    return Existence::Unknown;
                }
            }
        }
        Existence::NotFound
    }

    async fn create_page(
        &self,
        article: &Article,
        blocks: Option<&[ContentBlock]>,
    ) -> Result<(), StoreError> {
        let (_, db) = self.credentials()?;
        let body = page_json(db, article, blocks);
        self.post("/pages", &body).await.map(|_| ())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredEntry>, StoreError> {
        let payload = json!({
            "page_size": limit.clamp(1, 100),
            "sorts": [ { "timestamp": "created_time", "direction": "descending" } ],
        });
        Ok(results(&self.query(&payload).await?))
    }

    async fn since(&self, start: NaiveDate, page_size: usize) -> Result<Vec<StoredEntry>, StoreError> {
        let payload = json!({
            "page_size": page_size.clamp(1, 100),
            "filter": { "property": "Date", "date": { "on_or_after": start.to_string() } },
            "sorts": [ { "property": "Date", "direction": "descending" } ],
        });
        Ok(results(&self.query(&payload).await?))
    }

    async fn scan(&self, max_pages: usize) -> Result<Vec<StoredEntry>, StoreError> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..max_pages.max(1) {
            let mut payload = json!({
                "page_size": 100,
                "sorts": [ { "timestamp": "created_time", "direction": "descending" } ],
            });
            if let Some(c) = &cursor {
                payload["start_cursor"] = json!(c);
            }
            let body = match self.query(&payload).await {
                Ok(b) => b,
                // keep what earlier pages returned
                Err(e) if !out.is_empty() => {
                    error!(error = %e, "store_scan_page_failed");
                    break;
                }
                Err(e) => return Err(e),
            };
            out.extend(results(&body));
            if !body["has_more"].as_bool().unwrap_or(false) {
                break;
            }
            cursor = body["next_cursor"].as_str().map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        Ok(out)
    }
}

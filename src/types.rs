// src/types.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Hard cap on blocks stored per article.
pub const MAX_BLOCKS: usize = 50;
/// Cap on blocks rendered from stored metadata when the page is unavailable.
pub const FALLBACK_MAX_BLOCKS: usize = 8;
/// Store limit for a single rich-text payload.
pub const MAX_BLOCK_CHARS: usize = 2000;

/// How often a source is expected to publish; drives the default zero-yield threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily,
    Weekly,
}

/// The fixed set of publications the service knows how to sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    BrandNew,
    BrandingJournal,
    BrandingMag,
    Bpando,
    TheDrum,
    ForbesCmo,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::BrandNew,
        Source::BrandingJournal,
        Source::BrandingMag,
        Source::Bpando,
        Source::TheDrum,
        Source::ForbesCmo,
    ];

    /// Stable numeric id used by operator requests (0 is reserved for "all").
    pub fn id(self) -> u8 {
        match self {
            Source::BrandNew => 1,
            Source::BrandingJournal => 2,
            Source::BrandingMag => 3,
            Source::Bpando => 4,
            Source::TheDrum => 5,
            Source::ForbesCmo => 6,
        }
    }

    pub fn from_id(id: u8) -> Option<Source> {
        Source::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Source::BrandNew => "Brand New",
            Source::BrandingJournal => "Branding Journal",
            Source::BrandingMag => "Branding Mag",
            Source::Bpando => "BP&O",
            Source::TheDrum => "The Drum",
            Source::ForbesCmo => "Forbes CMO Network",
        }
    }

    /// Config-file key (snake case).
    pub fn key(self) -> &'static str {
        match self {
            Source::BrandNew => "brand_new",
            Source::BrandingJournal => "branding_journal",
            Source::BrandingMag => "branding_mag",
            Source::Bpando => "bpando",
            Source::TheDrum => "the_drum",
            Source::ForbesCmo => "forbes_cmo",
        }
    }

    /// Option name in the store's "Blog Name" select column.
    pub fn store_label(self) -> &'static str {
        match self {
            Source::BrandNew => "underconsideration",
            Source::BrandingJournal => "Branding Journal",
            Source::BrandingMag => "Brand Mag",
            Source::Bpando => "Bpando",
            Source::TheDrum => "The Drum",
            Source::ForbesCmo => "Forbes CMO Network",
        }
    }

    pub fn from_store_label(label: &str) -> Option<Source> {
        let label = label.trim();
        Source::ALL.into_iter().find(|s| s.store_label() == label)
    }

    pub fn from_name(name: &str) -> Option<Source> {
        let name = name.trim();
        Source::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name) || s.key() == name)
    }

    /// Scheme + host used to absolutize relative links on the source's pages.
    pub fn origin(self) -> &'static str {
        match self {
            Source::BrandNew => "https://www.underconsideration.com",
            Source::BrandingJournal => "https://www.thebrandingjournal.com",
            Source::BrandingMag => "https://www.brandingmag.com",
            Source::Bpando => "https://bpando.org",
            Source::TheDrum => "https://www.thedrum.com",
            Source::ForbesCmo => "https://www.forbes.com",
        }
    }

    pub fn cadence(self) -> Cadence {
        match self {
            Source::BrandNew => Cadence::Daily,
            _ => Cadence::Weekly,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An article reference produced by a fetcher. Lives for one sync invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub date: NaiveDate,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, link: impl Into<String>, date: NaiveDate, source: Source) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            date,
            source,
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        let summary = summary.into();
        self.summary = (!summary.trim().is_empty()).then_some(summary);
        self
    }

    /// Text rendered when the article body cannot be extracted: summary, else title.
    pub fn fallback_text(&self) -> &str {
        match self.summary.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => &self.title,
        }
    }
}

/// One unit of article body content as stored in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContentBlock {
    Paragraph(String),
    Heading(String),
    BulletedItem(String),
    Image(String),
}

impl ContentBlock {
    pub fn paragraph(text: &str) -> Option<Self> {
        clip_text(text).map(ContentBlock::Paragraph)
    }

    pub fn heading(text: &str) -> Option<Self> {
        clip_text(text).map(ContentBlock::Heading)
    }

    pub fn bullet(text: &str) -> Option<Self> {
        clip_text(text).map(ContentBlock::BulletedItem)
    }

    pub fn image(url: &str) -> Option<Self> {
        let url = url.trim();
        (!url.is_empty()).then(|| ContentBlock::Image(url.to_string()))
    }

    /// Text payload; `None` for images.
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentBlock::Paragraph(t) | ContentBlock::Heading(t) | ContentBlock::BulletedItem(t) => {
                Some(t)
            }
            ContentBlock::Image(_) => None,
        }
    }
}

/// Collapse whitespace to single spaces and trim.
pub fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clip_text(text: &str) -> Option<String> {
    let content = collapse_ws(text);
    if content.is_empty() {
        return None;
    }
    if content.chars().count() > MAX_BLOCK_CHARS {
        return Some(content.chars().take(MAX_BLOCK_CHARS).collect());
    }
    Some(content)
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

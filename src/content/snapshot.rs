// src/content/snapshot.rs
//! Stand-in body for articles whose page could not be extracted.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{collapse_ws, Article, ContentBlock};

pub const SNAPSHOT_MAX_BLOCKS: usize = 12;
const MAX_SUMMARY_BULLETS: usize = 4;
const MIN_SENTENCE_CHARS: usize = 20;
/// Title echoes that differ only by a few characters still count.
const TITLE_SIMILARITY: f64 = 0.9;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Lower-case, typographic quotes folded, punctuation removed, whitespace collapsed.
pub fn normalize_for_compare(text: &str) -> String {
    let folded = text
        .to_lowercase()
        .replace(['\u{2019}', '\u{2018}'], "'")
        .replace(['\u{201c}', '\u{201d}'], "\"");
    collapse_ws(&NON_ALNUM.replace_all(&folded, " "))
}

/// True when a block merely repeats the article's title or summary.
pub fn is_echo_of_metadata(block: &ContentBlock, article: &Article) -> bool {
    let Some(text) = block.text() else {
        return false;
    };
    let body = normalize_for_compare(text);
    let title = normalize_for_compare(&article.title);
    if body == title || (!title.is_empty() && strsim::normalized_levenshtein(&body, &title) >= TITLE_SIMILARITY) {
        return true;
    }

    let summary = normalize_for_compare(article.summary.as_deref().unwrap_or_default());
    !summary.is_empty() && (body == summary || summary.contains(&body) || body.contains(&summary))
}

fn sentences(summary: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(summary) {
        // keep the terminal punctuation with its sentence
        out.push(summary[start..m.start() + 1].trim().to_string());
        start = m.end();
    }
    out.push(summary[start..].trim().to_string());
    out.retain(|s| s.chars().count() >= MIN_SENTENCE_CHARS);
    out
}

/// Snapshot: summary bullets (or a metadata note), then the source URL and a notice.
pub fn snapshot_blocks(article: &Article, url: &str) -> Vec<ContentBlock> {
    let summary = collapse_ws(article.summary.as_deref().unwrap_or_default());
    let title = collapse_ws(&article.title);

    let mut blocks: Vec<ContentBlock> = ContentBlock::heading("Article Snapshot").into_iter().collect();

    let mut bullets = sentences(&summary);
    if bullets.is_empty() && summary.chars().count() >= MIN_SENTENCE_CHARS {
        bullets.push(summary.clone());
    }
    let added_summary = !bullets.is_empty();
    blocks.extend(
        bullets
            .iter()
            .take(MAX_SUMMARY_BULLETS)
            .filter_map(|s| ContentBlock::bullet(s)),
    );

    if !added_summary && !title.is_empty() {
        blocks.extend(ContentBlock::paragraph(&format!(
            "Summary unavailable. Added article metadata only for: {title}"
        )));
    }

    blocks.extend(ContentBlock::heading("Source"));
    blocks.extend(ContentBlock::paragraph(url));
    blocks.extend(ContentBlock::paragraph(
        "Full article body could not be extracted automatically due to source restrictions.",
    ));
    blocks.truncate(SNAPSHOT_MAX_BLOCKS);
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::types::Source;

    fn forbes(title: &str, summary: Option<&str>) -> Article {
        let a = Article::new(
            title,
            "https://www.forbes.com/sites/x/2025/03/01/y",
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            Source::ForbesCmo,
        );
        match summary {
            Some(s) => a.with_summary(s),
            None => a,
        }
    }

    #[test]
    fn title_echo_is_detected_through_punctuation_and_quotes() {
        let a = forbes("Why CMOs Can\u{2019}t Ignore AI", None);
        let block = ContentBlock::Paragraph("why cmos can't ignore AI!".into());
        assert!(is_echo_of_metadata(&block, &a));
    }

    #[test]
    fn summary_containment_counts_as_echo() {
        let a = forbes("Title", Some("Brands are rethinking loyalty. Here is how the best ones do it."));
        let block = ContentBlock::Paragraph("Brands are rethinking loyalty.".into());
        assert!(is_echo_of_metadata(&block, &a));
    }

    #[test]
    fn real_body_is_not_an_echo() {
        let a = forbes("Why CMOs Can't Ignore AI", Some("A short look at AI budgets."));
        let block = ContentBlock::Paragraph("Marketing leaders interviewed for this piece described three shifts.".into());
        assert!(!is_echo_of_metadata(&block, &a));
        assert!(!is_echo_of_metadata(&ContentBlock::Image("https://x/y.png".into()), &a));
    }

    #[test]
    fn snapshot_with_summary_lists_sentences() {
        let a = forbes(
            "Title",
            Some("First sentence is long enough here. Tiny. Second sentence also qualifies!"),
        );
        let blocks = snapshot_blocks(&a, &a.link);
        assert_eq!(blocks[0], ContentBlock::Heading("Article Snapshot".into()));
        assert_eq!(blocks[1], ContentBlock::BulletedItem("First sentence is long enough here.".into()));
        assert_eq!(blocks[2], ContentBlock::BulletedItem("Second sentence also qualifies!".into()));
        assert_eq!(blocks[3], ContentBlock::Heading("Source".into()));
        assert_eq!(blocks[4], ContentBlock::Paragraph(a.link.clone()));
        assert_eq!(blocks.len(), 6);
    }

    #[test]
    fn snapshot_without_summary_notes_metadata_only() {
        let a = forbes("The Big Rebrand", None);
        let blocks = snapshot_blocks(&a, &a.link);
        assert_eq!(
            blocks[1],
            ContentBlock::Paragraph("Summary unavailable. Added article metadata only for: The Big Rebrand".into())
        );
        assert!(blocks.len() <= SNAPSHOT_MAX_BLOCKS);
    }
}

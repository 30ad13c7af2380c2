// src/report.rs
//! Plain-text operator reports rendered from health records and stored entries.
//! Every chat-bound message passes through [`trim_message`].

use chrono::{DateTime, Utc};

use crate::health::SourceHealthRecord;
use crate::metrics::{Counter, CounterSnapshot};
use crate::store::StoredEntry;
use crate::types::Source;

pub const MESSAGE_LIMIT: usize = 3900;
pub const MESSAGE_CUT: usize = 3800;
pub const TRUNCATED_NOTE: &str = "... output truncated.";
pub const CSV_HEADER: [&str; 5] = ["title", "source", "date", "url", "created_time"];

/// Join lines; when the result is too long, keep whole lines up to the cut and
/// append a note.
pub fn trim_message(lines: &[String]) -> String {
    let message = lines.join("\n");
    let message = message.trim();
    if message.chars().count() <= MESSAGE_LIMIT {
        return message.to_string();
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut len = 0usize;
    for line in lines {
        let next = len + line.chars().count() + 1;
        if next > MESSAGE_CUT {
            break;
        }
        kept.push(line);
        len = next;
    }
    kept.push("");
    kept.push(TRUNCATED_NOTE);
    kept.join("\n").trim().to_string()
}

/// Keep at most `max` chars, replacing the tail with `...` when cut.
pub fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

fn one_line(text: &str) -> String {
    text.replace('\n', " ").trim().to_string()
}

fn or_default<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    let t = text.trim();
    if t.is_empty() {
        fallback
    } else {
        t
    }
}

fn title_of(entry: &StoredEntry, max: usize) -> String {
    let title = one_line(&entry.title);
    ellipsize(or_default(&title, "Untitled"), max)
}

pub fn human_utc(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(t) => t.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "Never".to_string(),
    }
}

pub fn format_status_message(
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    counters: &CounterSnapshot,
    sources: &[(Source, SourceHealthRecord)],
) -> String {
    let uptime_hours = (now - started_at).num_seconds().max(0) as f64 / 3600.0;
    let mut lines = vec![
        "Branding Scraper status".to_string(),
        format!("Uptime: {uptime_hours:.2}h"),
        format!(
            "Sync runs total={}, success={}, failed={}",
            counters.get(Counter::SyncRuns),
            counters.get(Counter::SyncRunsSuccess),
            counters.get(Counter::SyncRunsFailure)
        ),
        format!(
            "Articles uploaded total={}",
            counters.get(Counter::ArticlesUploaded)
        ),
        String::new(),
    ];

    for (source, rec) in sources {
        let last_error = rec
            .last_error
            .as_deref()
            .map(|e| ellipsize(e, 150))
            .unwrap_or_else(|| "None".to_string());
        lines.push(format!("{}:", source.name()));
        lines.push(format!("Last success: {}", human_utc(rec.last_success)));
        lines.push(format!("Last added count: {}", rec.last_added_count));
        lines.push(format!("Last error: {last_error}"));
        if rec.last_error.is_some() {
            lines.push(format!("Last error time: {}", human_utc(rec.last_error_at)));
        }
        lines.push(String::new());
    }
    trim_message(&lines)
}

pub fn format_recent_entries_message(entries: &[StoredEntry], requested: usize) -> String {
    if entries.is_empty() {
        return format!("No entries found in Notion for last {requested} items.");
    }
    let mut lines = vec![format!("Latest {} entries from Notion:", entries.len())];
    for (i, e) in entries.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, title_of(e, 110)));
        lines.push(or_default(&e.url, "No URL").to_string());
        lines.push(String::new());
    }
    trim_message(&lines)
}

/// Case-insensitive substring match over title, url, source and date.
pub fn search_entries(entries: &[StoredEntry], term: &str, limit: usize) -> Vec<StoredEntry> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    entries
        .iter()
        .filter(|e| {
            let haystack = [e.title.as_str(), e.url.as_str(), e.source.as_str(), e.date.as_str()]
                .join(" ")
                .to_lowercase();
            haystack.contains(&needle)
        })
        .take(limit)
        .cloned()
        .collect()
}

pub fn format_search_results_message(term: &str, entries: &[StoredEntry], limit: usize) -> String {
    if entries.is_empty() {
        return format!("No matches found for \"{term}\".");
    }
    let mut lines = vec![format!(
        "Search results for \"{term}\" ({} shown):",
        entries.len()
    )];
    for (i, e) in entries.iter().take(limit).enumerate() {
        lines.push(format!("{}. {}", i + 1, title_of(e, 100)));
        lines.push(format!(
            "{} | {}",
            or_default(&e.source, "Unknown"),
            or_default(&e.date, "No date")
        ));
        lines.push(or_default(&e.url, "No URL").to_string());
        lines.push(String::new());
    }
    trim_message(&lines)
}

pub fn entries_to_markdown(entries: &[StoredEntry], title: &str) -> String {
    let mut lines = vec![format!("# {title}"), String::new()];
    for (i, e) in entries.iter().enumerate() {
        let entry_title = or_default(&one_line(&e.title), "Untitled").to_string();
        let url = e.url.trim();
        if url.is_empty() {
            lines.push(format!("{}. {entry_title}", i + 1));
        } else {
            lines.push(format!("{}. [{entry_title}]({url})", i + 1));
        }
        let meta = [or_default(&e.source, "Unknown"), e.date.trim()]
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" | ");
        if !meta.is_empty() {
            lines.push(format!("   - {meta}"));
        }
    }
    format!("{}\n", lines.join("\n").trim())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let row = fields.into_iter().map(csv_field).collect::<Vec<_>>().join(",");
    format!("{row}\r\n")
}

/// RFC 4180 rows with CRLF line endings.
pub fn entries_to_csv(entries: &[StoredEntry]) -> String {
    let mut out = csv_row(CSV_HEADER);
    for e in entries {
        out.push_str(&csv_row([
            e.title.as_str(),
            e.source.as_str(),
            e.date.as_str(),
            e.url.as_str(),
            e.created_time.as_str(),
        ]));
    }
    out
}

fn push_digest_group(lines: &mut Vec<String>, name: &str, group: &[&StoredEntry], per_source: usize) {
    lines.push(format!("{name} ({}):", group.len()));
    for (i, e) in group.iter().take(per_source).enumerate() {
        lines.push(format!("{}. {}", i + 1, title_of(e, 105)));
        lines.push(or_default(&e.url, "No URL").to_string());
    }
    lines.push(String::new());
}

/// Entries grouped by source in id order, then any unrecognised source names in
/// first-seen order.
pub fn format_weekly_digest_message(entries: &[StoredEntry], days: i64, per_source: usize) -> String {
    if entries.is_empty() {
        return format!("No entries found in Notion for the last {days} days.");
    }

    let mut groups: Vec<(String, Vec<&StoredEntry>)> = Source::ALL
        .iter()
        .map(|s| (s.name().to_string(), Vec::new()))
        .collect();
    for e in entries {
        let name = or_default(&e.source, "Unknown");
        match groups.iter_mut().find(|(n, _)| n == name) {
            Some((_, g)) => g.push(e),
            None => groups.push((name.to_string(), vec![e])),
        }
    }

    let mut lines = vec![
        format!("Weekly digest (last {days} days)"),
        format!("Total new entries: {}", entries.len()),
        String::new(),
    ];
    for (name, group) in groups.iter().filter(|(_, g)| !g.is_empty()) {
        push_digest_group(&mut lines, name, group, per_source);
    }
    trim_message(&lines)
}

// src/url_norm.rs
//! Canonical article URLs. Two links name the same article iff their
//! normalized forms are equal.

use url::{form_urlencoded, Url};

/// Query keys that only carry campaign/click tracking.
pub const TRACKING_QUERY_KEYS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
    "fbclid",
    "gclid",
    "mc_cid",
    "mc_eid",
];

fn has_scheme(s: &str) -> bool {
    match s.split_once("://") {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

fn has_opaque_scheme(s: &str) -> bool {
    match s.split_once(':') {
        Some((prefix, rest)) => {
            !prefix.is_empty()
                && prefix.chars().all(|c| c.is_ascii_alphabetic())
                && !rest.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Normalize an article URL. Never fails: unparseable or host-less input yields "".
///
/// `https` scheme, lower-cased host without `www.`, no trailing slash on non-root
/// paths, tracking and blank query pairs removed, remaining pairs sorted, no fragment.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let candidate = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else if has_scheme(trimmed) {
        trimmed.to_string()
    } else if trimmed.starts_with('/') || has_opaque_scheme(trimmed) {
        // relative path or a non-web scheme such as mailto:
        return String::new();
    } else {
        format!("https://{trimmed}")
    };

    let Ok(parsed) = Url::parse(&candidate) else {
        return String::new();
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return String::new();
    }
    let Some(host) = parsed.host_str() else {
        return String::new();
    };
    let host = host.to_ascii_lowercase();
    let mut host = host.as_str();
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest;
    }
    if host.is_empty() {
        return String::new();
    }

    // Output is always https, where 443 is implied.
    let mut out = format!("https://{host}");
    if let Some(port) = parsed.port().filter(|p| *p != 443) {
        out.push_str(&format!(":{port}"));
    }

    let path = parsed.path();
    let path = if path == "/" || path.is_empty() {
        "/"
    } else {
        match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        }
    };
    out.push_str(path);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, v)| !v.is_empty() && !is_tracking_key(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    if !pairs.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&pairs)
            .finish();
        out.push('?');
        out.push_str(&query);
    }

    out
}

fn is_tracking_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    TRACKING_QUERY_KEYS.contains(&lower.as_str())
}

fn push_unique(out: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !out.iter().any(|v| v == value) {
        out.push(value.to_string());
    }
}

/// Ordered candidate spellings of one article URL for store lookups:
/// raw, raw without fragment, canonical, canonical without query,
/// canonical with the trailing slash toggled.
pub fn url_variants(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    push_unique(&mut out, raw);
    push_unique(&mut out, raw.split('#').next().unwrap_or_default());

    let canonical = normalize(raw);
    if canonical.is_empty() {
        return out;
    }
    push_unique(&mut out, &canonical);

    if let Ok(parsed) = Url::parse(&canonical) {
        let mut bare = parsed.clone();
        bare.set_query(None);
        push_unique(&mut out, bare.as_str());

        let path = parsed.path().to_string();
        if path != "/" {
            let mut toggled = parsed;
            if let Some(stripped) = path.strip_suffix('/') {
                toggled.set_path(stripped);
            } else {
                toggled.set_path(&format!("{path}/"));
            }
            push_unique(&mut out, toggled.as_str());
        }
    }

    out
}

// src/config/thresholds.rs
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::types::Source;

const ENV_PATH: &str = "SYNC_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/sync.toml";

#[derive(Debug, Default, Deserialize)]
struct SyncFile {
    #[serde(default)]
    zero_alert_days: HashMap<String, i64>,
}

/// Per-source zero-alert thresholds from a TOML file:
///
/// ```toml
/// [zero_alert_days]
/// brand_new = 3
/// the_drum = 21
/// ```
pub fn load_overrides_from(path: &Path) -> Result<HashMap<Source, i64>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sync config from {}", path.display()))?;
    parse_overrides(&content)
}

/// 1) `$SYNC_CONFIG_PATH` (must exist), 2) `config/sync.toml`, 3) none.
pub fn load_overrides_default() -> Result<HashMap<Source, i64>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
        return load_overrides_from(&pb);
    }
    let default = PathBuf::from(DEFAULT_PATH);
    if default.exists() {
        return load_overrides_from(&default);
    }
    Ok(HashMap::new())
}

pub fn parse_overrides(s: &str) -> Result<HashMap<Source, i64>> {
    let file: SyncFile = toml::from_str(s).context("parsing sync config toml")?;
    let mut out = HashMap::new();
    for (key, days) in file.zero_alert_days {
        match Source::from_name(&key) {
            Some(source) if days > 0 => {
                out.insert(source, days);
            }
            Some(_) => warn!(key = %key, days, "non_positive_threshold_ignored"),
            None => warn!(key = %key, "unknown_source_in_sync_config"),
        }
    }
    Ok(out)
}

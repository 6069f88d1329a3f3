//! Shared helpers for the CLI: store location and argument parsing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{IndexConfig, KeyPair, RealmRef};

/// Gets the SQLite store path.
///
/// Uses `config.store_path` when set, else `{data_dir}/phrasedex/store.db`
/// where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn get_store_path(config: &IndexConfig) -> Result<PathBuf> {
    if let Some(path) = &config.store_path {
        return Ok(path.clone());
    }
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("phrasedex").join("store.db"))
}

/// Ensures the parent directory of the store file exists.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_store_directory(store_path: &Path) -> Result<()> {
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create store directory: {}", parent.display())
        })?;
    }
    Ok(())
}

/// Parses comma-separated tags, trimming each and dropping empty ones.
///
/// # Examples
///
/// ```
/// use phrasedex::utils::parse_tags;
///
/// assert_eq!(parse_tags("animals, pets, "), vec!["animals", "pets"]);
/// ```
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Reads a realm argument: digits name a realm pk, anything else a name.
pub fn parse_realm(input: &str) -> RealmRef {
    match input.trim().parse::<u32>() {
        Ok(pk) => RealmRef::from(pk),
        Err(_) => RealmRef::from(input),
    }
}

/// Parses `LABEL=REALM:PHRASE` into a relation edge.
pub fn parse_relation(input: &str) -> Result<(String, KeyPair), String> {
    let (label, key) = input
        .rsplit_once('=')
        .ok_or_else(|| format!("expected LABEL=REALM:PHRASE, got {input:?}"))?;
    let label = label.trim();
    if label.is_empty() {
        return Err(format!("missing relation label in {input:?}"));
    }
    let key = key.trim().parse::<KeyPair>().map_err(|e| e.to_string())?;
    Ok((label.to_string(), key))
}

/// Parses `LABEL=REVERSE` into a relation pair; a bare `LABEL` is symmetric.
pub fn parse_relation_pair(input: &str) -> Result<(String, String), String> {
    let (label, reverse) = input.split_once('=').unwrap_or((input, input));
    let (label, reverse) = (label.trim(), reverse.trim());
    if label.is_empty() || reverse.is_empty() {
        return Err(format!("expected LABEL or LABEL=REVERSE, got {input:?}"));
    }
    Ok((label.to_string(), reverse.to_string()))
}

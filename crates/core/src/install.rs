//! Linked-package records of an existing deployment tree.
//!
//! A deployed environment records each installed distribution as a JSON file
//! under `<prefix>/conda-meta/`. The record's `files` list names the paths
//! (relative to the prefix) that unlinking removes.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::Result;

const META_DIR: &str = "conda-meta";

#[derive(Debug, Default, Deserialize)]
struct InstallRecord {
    #[serde(default)]
    files: Vec<String>,
}

/// The distributions currently linked into `prefix`, sorted.
pub fn linked(prefix: &Path) -> Result<Vec<String>> {
    let meta = prefix.join(META_DIR);
    let mut dists = Vec::new();
    if !meta.exists() {
        return Ok(dists);
    }
    for entry in fs::read_dir(meta)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                dists.push(stem.to_string());
            }
        }
    }
    dists.sort();
    Ok(dists)
}

/// Remove the install record for `dist` from `prefix`, along with every file
/// it lists. Files already gone are ignored.
pub fn unlink(prefix: &Path, dist: &str) -> Result<()> {
    let record_path = prefix.join(META_DIR).join(format!("{dist}.json"));
    let record: InstallRecord = match fs::read_to_string(&record_path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
        Err(_) => InstallRecord::default(),
    };
    for file in &record.files {
        let path = prefix.join(file);
        if path.exists() {
            fs::remove_file(&path)?;
        }
    }
    if record_path.exists() {
        fs::remove_file(&record_path)?;
    }
    debug!(dist, prefix = %prefix.display(), "unlinked");
    Ok(())
}

/// Whether `dist`'s tarball is already present in the SOURCES cache.
pub fn is_fetched(cache: &Path, dist: &str) -> bool {
    cache.join(format!("{dist}.tar.bz2")).exists()
}

//! Channel index queries and tarball fetching.
//!
//! A channel is an HTTP(S) URL serving a `repodata.json` index whose
//! `packages` map is keyed by tarball filename. Index queries are always
//! fresh; only fetched tarballs are cached (in the target's SOURCES
//! directory).

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{Error, Result};

/// One distribution record from a channel index.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub build: String,
    #[serde(default)]
    pub build_number: u64,
}

impl PackageRecord {
    /// The `name-version-build` distribution id.
    pub fn dist(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.build)
    }
}

#[derive(Debug, Deserialize)]
struct RawIndex {
    #[serde(default)]
    packages: BTreeMap<String, PackageRecord>,
}

/// A channel's index, keyed by tarball filename.
#[derive(Debug)]
pub struct ChannelIndex {
    channel: String,
    packages: BTreeMap<String, PackageRecord>,
}

impl ChannelIndex {
    /// Fetch `<channel>/repodata.json`, bypassing any cache.
    pub fn fetch(channel: &str) -> Result<Self> {
        let url = format!("{}/repodata.json", channel.trim_end_matches('/'));
        debug!(%url, "fetching channel index");
        let body = get_bytes(&url)?;
        let raw: RawIndex = serde_json::from_slice(&body)
            .map_err(|source| Error::IndexSyntax { url, source })?;
        Ok(Self {
            channel: channel.trim_end_matches('/').to_string(),
            packages: raw.packages,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Look up a distribution record by tarball filename.
    pub fn get(&self, tarball_name: &str) -> Option<&PackageRecord> {
        self.packages.get(tarball_name)
    }

    /// All records in the index, in filename order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &PackageRecord)> {
        self.packages.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Download `<channel>/<tarball_name>` into `cache_dir`.
    pub fn fetch_package(&self, tarball_name: &str, cache_dir: &Path) -> Result<PathBuf> {
        let url = format!("{}/{}", self.channel, tarball_name);
        info!(%url, "fetching");
        let bytes = get_bytes(&url)?;
        fs::create_dir_all(cache_dir)?;
        let dest = cache_dir.join(tarball_name);
        let mut file = File::create(&dest)?;
        file.write_all(&bytes)?;
        debug!(dest = %dest.display(), "downloaded");
        Ok(dest)
    }
}

fn get_bytes(url: &str) -> Result<Vec<u8>> {
    let map_err = |source: reqwest::Error| Error::Fetch {
        url: url.to_string(),
        source,
    };
    let response = reqwest::blocking::get(url).map_err(map_err)?;
    let response = response.error_for_status().map_err(map_err)?;
    Ok(response.bytes().map_err(map_err)?.to_vec())
}

//! Environment manifest and spec parsing.
//!
//! `env.manifest` is a newline-separated list of `channel<TAB>distribution`
//! pairs; `env.spec` is a YAML document whose optional `env` key carries the
//! requested requirement strings. Both are read from blobs at a git commit.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::{Error, Result};

/// One immutable package build in one channel.
///
/// `dist` encodes name-version-build uniquely within the channel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PackageRef {
    pub channel: String,
    pub dist: String,
}

impl PackageRef {
    /// The tarball filename for this distribution.
    pub fn tarball_name(&self) -> String {
        format!("{}.tar.bz2", self.dist)
    }
}

/// The exact package set for one environment at one git ref.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<PackageRef>,
}

impl Manifest {
    /// Parse `env.manifest` text. Lines are sorted lexicographically for
    /// determinism; blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (channel, dist) = line.split_once('\t').ok_or_else(|| Error::ManifestLine {
                line: line.to_string(),
            })?;
            entries.push(PackageRef {
                channel: channel.to_string(),
                dist: dist.to_string(),
            });
        }
        entries.sort();
        entries.dedup();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[PackageRef] {
        &self.entries
    }

    /// The set of distribution ids named by this manifest.
    pub fn dists(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|p| p.dist.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Structured data read from `env.spec` at a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSpec {
    /// Version-constrained requirement strings, e.g. `python 2.*`.
    pub env: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEnvSpec {
    #[serde(default)]
    env: Vec<String>,
}

impl EnvSpec {
    /// Parse `env.spec` YAML; an absent `env` key defaults to an empty list.
    /// `tag` names the snapshot in parse errors.
    pub fn parse(text: &str, tag: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawEnvSpec =
            serde_yaml::from_str(text).map_err(|source| Error::EnvSpecSyntax {
                tag: tag.to_string(),
                source,
            })?;
        Ok(Self { env: raw.env })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_sorted_and_deduped() {
        let manifest = Manifest::parse("chanB\tpkg2-2.0-1\nchanA\tpkg1-1.0-0\nchanA\tpkg1-1.0-0\n")
            .unwrap();
        let entries = manifest.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].channel, "chanA");
        assert_eq!(entries[0].dist, "pkg1-1.0-0");
        assert_eq!(entries[1].dist, "pkg2-2.0-1");
    }

    #[test]
    fn test_manifest_blank_lines_skipped() {
        let manifest = Manifest::parse("\nchanA\tpkg1-1.0-0\n\n").unwrap();
        assert_eq!(manifest.entries().len(), 1);
    }

    #[test]
    fn test_manifest_line_without_tab() {
        let err = Manifest::parse("chanA pkg1-1.0-0\n").unwrap_err();
        assert!(matches!(err, Error::ManifestLine { .. }));
    }

    #[test]
    fn test_dists() {
        let manifest = Manifest::parse("chanA\tpkg1-1.0-0\nchanB\tpkg2-2.0-1\n").unwrap();
        let dists: Vec<_> = manifest.dists().into_iter().collect();
        assert_eq!(dists, vec!["pkg1-1.0-0", "pkg2-2.0-1"]);
    }

    #[test]
    fn test_env_spec_with_requirements() {
        let spec = EnvSpec::parse("env:\n  - udunits2 < 2.21\n  - python 2.*\n", "env-a-1").unwrap();
        assert_eq!(spec.env, vec!["udunits2 < 2.21", "python 2.*"]);
    }

    #[test]
    fn test_env_spec_key_absent_defaults_empty() {
        let spec = EnvSpec::parse("notes: nothing here\n", "env-a-1").unwrap();
        assert!(spec.env.is_empty());
    }

    #[test]
    fn test_env_spec_empty_document() {
        let spec = EnvSpec::parse("", "env-a-1").unwrap();
        assert!(spec.env.is_empty());
    }

    #[test]
    fn test_env_spec_bad_yaml() {
        let err = EnvSpec::parse("env: [unclosed\n", "env-a-1").unwrap_err();
        assert!(matches!(err, Error::EnvSpecSyntax { .. }));
    }

    #[test]
    fn test_tarball_name() {
        let pkg = PackageRef {
            channel: "chanA".to_string(),
            dist: "pkg1-1.0-0".to_string(),
        };
        assert_eq!(pkg.tarball_name(), "pkg1-1.0-0.tar.bz2");
    }
}

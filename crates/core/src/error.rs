//! Error types for envrpm-core
//!
//! Every anomaly aborts the whole run. There is no retry or recovery tier;
//! the tool is expected to run under external orchestration that re-runs the
//! whole job on failure.

use std::path::PathBuf;

use thiserror::Error;

use crate::lock::LockError;
use crate::walker::GitError;

/// Errors that can occur while generating the rpmbuild structure
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("the configuration file '{}' does not exist", .0.display())]
    ConfigMissing(PathBuf),

    #[error("YAML error in configuration file '{}': {source}", .file.display())]
    ConfigSyntax {
        file: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("the configuration file '{}' does not contain key(s) [{}]", .file.display(), .keys.join("], ["))]
    ConfigKeysMissing { file: PathBuf, keys: Vec<String> },

    #[error("the tag '{tag}' doesn't have a manifested environment")]
    ManifestMissing { tag: String },

    #[error("the tag '{tag}' doesn't have an environment specification")]
    EnvSpecMissing { tag: String },

    #[error("malformed line in env.manifest: '{line}'")]
    ManifestLine { line: String },

    #[error("YAML error in env.spec at tag '{tag}': {source}")]
    EnvSpecSyntax {
        tag: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("the tag '{tag}' does not name an environment snapshot (expected 'env-<name>-<suffix>')")]
    TagName { tag: String },

    #[error("distribution {dist} is no longer available in the channel {channel}")]
    DistributionUnavailable { dist: String, channel: String },

    #[error("no python found in the channels")]
    NoPythonFound,

    #[error("spec file '{}' has no {field} field", .spec.display())]
    IdentityField {
        spec: PathBuf,
        field: &'static str,
    },

    #[error("rpmbuild failed for '{}' ({status})", .spec.display())]
    BuildFailed {
        spec: PathBuf,
        status: std::process::ExitStatus,
    },

    #[error("failed to fetch '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("channel index at '{url}' is malformed: {source}")]
    IndexSyntax {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("package archive '{}' has no info/index.json", .path.display())]
    PackageIndexMissing { path: PathBuf },

    #[error("malformed package archive '{}': {source}", .path.display())]
    PackageArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metadata in package archive '{}': {source}", .path.display())]
    PackageMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

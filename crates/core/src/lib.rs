//! envrpm-core: incremental RPM build-plan computation for git-tracked
//! conda environments.
//!
//! A git repository encodes environments as paired branches (an environment
//! branch plus a `_manifest_`-prefixed manifest branch), immutable snapshots
//! as `env-<name>-<suffix>` tags, and movable labels as blobs under a
//! `labels/` directory. This crate walks that structure and produces the
//! minimal set of `rpmbuild` inputs (SPECS and SOURCES) that are not yet
//! covered by existing RPMs.

pub mod build;
pub mod channel;
pub mod config;
pub mod error;
pub mod identity;
pub mod install;
pub mod installer;
pub mod lock;
pub mod manifest;
pub mod materialize;
pub mod render;
pub mod resolver;
pub mod walker;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use error::Error;
pub use lock::RunLock;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

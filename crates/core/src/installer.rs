//! Installer spec emission.
//!
//! Every run re-resolves the latest interpreter package from the configured
//! channels, caches its tarball alongside the package sources, ships the
//! fixed installer script, and rewrites the installer spec unconditionally.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::channel::ChannelIndex;
use crate::config::Config;
use crate::resolver::{MatchSpec, find_latest};
use crate::{Error, Result, install, render};

/// The default interpreter match specification.
pub const DEFAULT_PYTHON_SPEC: &str = "python";

/// The link tool shipped into SOURCES next to the interpreter tarball.
const INSTALLER_SCRIPT: &str = include_str!("../assets/install.py");

/// Resolve the latest interpreter matching `python_spec`, stage its tarball
/// and the installer script, and write `<rpm_prefix>-installer.spec`.
pub fn create_rpm_installer(target: &Path, config: &Config, python_spec: &str) -> Result<()> {
    let spec = MatchSpec::parse(python_spec);
    let mut indexes = Vec::with_capacity(config.channels.len());
    for channel in &config.channels {
        indexes.push(ChannelIndex::fetch(channel)?);
    }
    let (index, record) = find_latest(&indexes, &spec).ok_or(Error::NoPythonFound)?;
    let dist = record.dist();
    info!(%dist, channel = index.channel(), "resolved interpreter");

    let pkg_cache = target.join("SOURCES");
    if !install::is_fetched(&pkg_cache, &dist) {
        index.fetch_package(&format!("{dist}.tar.bz2"), &pkg_cache)?;
    }

    fs::create_dir_all(&pkg_cache)?;
    fs::write(pkg_cache.join("install.py"), INSTALLER_SCRIPT)?;

    let spec_dir = target.join("SPECS");
    fs::create_dir_all(&spec_dir)?;
    let spec_path = spec_dir.join(format!("{}-installer.spec", config.rpm_prefix));
    fs::write(&spec_path, render::render_installer(record, config))?;
    info!(spec = %spec_path.display(), "wrote installer spec");
    Ok(())
}

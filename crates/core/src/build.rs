//! Build-staleness checking and `rpmbuild` invocation.
//!
//! Spec filenames and RPM identities are the only bookkeeping: an artifact
//! named `<name>-<version>-<release>.x86_64.rpm` in the RPM directory means
//! the corresponding spec does not need building.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::identity::SpecIdentity;
use crate::{Error, Result};

/// Return the spec files under `specs_dir` whose built RPM is absent from
/// `rpm_dir`, sorted by filename.
pub fn needs_build(specs_dir: &Path, rpm_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut specs = Vec::new();
    if !specs_dir.exists() {
        return Ok(specs);
    }
    for entry in fs::read_dir(specs_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "spec") {
            specs.push(path);
        }
    }
    specs.sort();

    let mut stale = Vec::new();
    for spec in specs {
        let identity = SpecIdentity::parse(&fs::read_to_string(&spec)?);
        let rpm_name = identity.rpm_filename(&spec)?;
        if rpm_dir.join(&rpm_name).exists() {
            debug!(spec = %spec.display(), rpm = %rpm_name, "already built");
        } else {
            stale.push(spec);
        }
    }
    Ok(stale)
}

/// Build every spec under `<rpmbuild_dir>/SPECS` that has no RPM in
/// `rpm_dir` yet.
///
/// The first `rpmbuild` failure aborts the run; there is no partial-failure
/// recovery.
pub fn build_new(rpmbuild_dir: &Path, rpm_dir: &Path) -> Result<()> {
    let specs_dir = rpmbuild_dir.join("SPECS");
    for spec in needs_build(&specs_dir, rpm_dir)? {
        info!(spec = %spec.display(), "building");
        let status = Command::new("rpmbuild")
            .arg("-bb")
            .arg("--define")
            .arg(format!("_topdir {}", rpmbuild_dir.display()))
            .arg(&spec)
            .arg("--force")
            .status()?;
        if !status.success() {
            return Err(Error::BuildFailed { spec, status });
        }
    }
    Ok(())
}

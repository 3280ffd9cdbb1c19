//! Spec-file text rendering.
//!
//! Each renderer is a pure function from structured data to the text of one
//! RPM spec file. The generated `Name:`/`Version:`/`Release:` headers are
//! the interop contract with the staleness checker; the bodies install under
//! the configured prefix and carry no timestamps, so re-rendering the same
//! inputs always produces identical text.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use bzip2::read::BzDecoder;
use serde::Deserialize;
use tar::Archive;

use crate::channel::PackageRecord;
use crate::config::Config;
use crate::{Error, Result};

/// Package metadata embedded in a tarball as `info/index.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageIndex {
    pub name: String,
    pub version: String,
    pub build: String,
    #[serde(default)]
    pub build_number: u64,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
}

/// Optional recipe metadata embedded as `info/recipe.json`.
#[derive(Debug, Clone, Default, Deserialize)]
struct RecipeMeta {
    #[serde(default)]
    about: RecipeAbout,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RecipeAbout {
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

/// Read one member of a `.tar.bz2` archive, if present.
fn read_member(tarball: &Path, member: &str) -> Result<Option<Vec<u8>>> {
    let archive_err = |source: std::io::Error| Error::PackageArchive {
        path: tarball.to_path_buf(),
        source,
    };
    let file = File::open(tarball).map_err(archive_err)?;
    let mut archive = Archive::new(BzDecoder::new(file));
    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        let path = entry.path().map_err(archive_err)?;
        if path.to_str() == Some(member) {
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(archive_err)?;
            return Ok(Some(data));
        }
    }
    Ok(None)
}

/// Render the spec for one package distribution from its fetched tarball.
///
/// `info/index.json` is required; `info/recipe.json` is consulted for
/// license and summary when present.
pub fn render_dist_spec(tarball: &Path, config: &Config) -> Result<String> {
    let metadata_err = |source: serde_json::Error| Error::PackageMetadata {
        path: tarball.to_path_buf(),
        source,
    };
    let index_data = read_member(tarball, "info/index.json")?.ok_or_else(|| {
        Error::PackageIndexMissing {
            path: tarball.to_path_buf(),
        }
    })?;
    let pkginfo: PackageIndex = serde_json::from_slice(&index_data).map_err(metadata_err)?;

    let meta = match read_member(tarball, "info/recipe.json")? {
        Some(data) => serde_json::from_slice::<RecipeMeta>(&data).map_err(metadata_err)?,
        None => RecipeMeta::default(),
    };

    let license = meta
        .about
        .license
        .or_else(|| pkginfo.license.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let summary = meta
        .about
        .summary
        .unwrap_or_else(|| format!("The {} package", pkginfo.name));

    let dist = format!("{}-{}-{}", pkginfo.name, pkginfo.version, pkginfo.build);
    let prefix = &config.install_prefix;

    let mut spec = String::new();
    let _ = writeln!(spec, "Name: {}-pkg-{}", config.rpm_prefix, pkginfo.name);
    let _ = writeln!(spec, "Version: {}", pkginfo.version);
    let _ = writeln!(spec, "Release: {}", pkginfo.build);
    let _ = writeln!(spec, "Summary: {summary}");
    let _ = writeln!(spec, "License: {license}");
    let _ = writeln!(spec, "Prefix: {prefix}");
    let _ = writeln!(spec, "AutoReqProv: no");
    let _ = writeln!(spec, "Source0: {dist}.tar.bz2");
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%description");
    let _ = writeln!(spec, "{summary}");
    let _ = writeln!(spec, "Generated from the conda distribution {dist}.");
    for dep in &pkginfo.depends {
        let _ = writeln!(spec, "Conda depends: {dep}");
    }
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%install");
    let _ = writeln!(spec, "mkdir -p %{{buildroot}}{prefix}/pkgs/{dist}");
    let _ = writeln!(
        spec,
        "tar --no-same-owner -xjf %{{SOURCE0}} -C %{{buildroot}}{prefix}/pkgs/{dist}"
    );
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%files");
    let _ = writeln!(spec, "{prefix}/pkgs/{dist}");
    Ok(spec)
}

/// Render the spec for a tagged environment.
///
/// `pkgs` are the manifest's distribution ids; each becomes an exact-version
/// requirement on its package RPM.
pub fn render_taggedenv(
    env_name: &str,
    tag: &str,
    pkgs: &[String],
    config: &Config,
    env_spec: &[String],
) -> String {
    let rpm_prefix = &config.rpm_prefix;
    let prefix = &config.install_prefix;
    let manifest_path = format!("{prefix}/envs/.{env_name}-{tag}.manifest");

    let mut spec = String::new();
    let _ = writeln!(spec, "Name: {rpm_prefix}-env-{env_name}-tag-{tag}");
    let _ = writeln!(spec, "Version: 1");
    let _ = writeln!(spec, "Release: 0");
    let _ = writeln!(
        spec,
        "Summary: The {env_name} environment at tag {tag}"
    );
    let _ = writeln!(spec, "License: Unknown");
    let _ = writeln!(spec, "Prefix: {prefix}");
    let _ = writeln!(spec, "AutoReqProv: no");
    let _ = writeln!(spec, "Requires: {rpm_prefix}-installer");
    for dist in pkgs {
        if let Some((name, version, build)) = split_dist(dist) {
            let _ = writeln!(
                spec,
                "Requires: {rpm_prefix}-pkg-{name} = {version}-{build}"
            );
        }
    }
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%description");
    let _ = writeln!(spec, "The {env_name} environment at tag {tag}.");
    for requirement in env_spec {
        let _ = writeln!(spec, "Requested: {requirement}");
    }
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%install");
    let _ = writeln!(spec, "mkdir -p %{{buildroot}}{prefix}/envs");
    let _ = writeln!(spec, "cat > %{{buildroot}}{manifest_path} << 'EOF'");
    for dist in pkgs {
        let _ = writeln!(spec, "{dist}");
    }
    let _ = writeln!(spec, "EOF");
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%files");
    let _ = writeln!(spec, "{manifest_path}");
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%post");
    let _ = writeln!(
        spec,
        "{prefix}/bin/python {prefix}/bin/install.py --link {prefix}/envs/{env_name}-{tag} {manifest_path}"
    );
    spec
}

/// Render the spec for a labeled environment.
///
/// The Version is the count of commits reachable from the branch tip, so it
/// increases monotonically with the environment's git history.
pub fn render_env(
    branch: &str,
    label: &str,
    tag_suffix: &str,
    commit_num: usize,
    config: &Config,
) -> String {
    let rpm_prefix = &config.rpm_prefix;
    let prefix = &config.install_prefix;

    let mut spec = String::new();
    let _ = writeln!(spec, "Name: {rpm_prefix}-env-{branch}-label-{label}");
    let _ = writeln!(spec, "Version: {commit_num}");
    let _ = writeln!(spec, "Release: 0");
    let _ = writeln!(
        spec,
        "Summary: The {label} label of the {branch} environment"
    );
    let _ = writeln!(spec, "License: Unknown");
    let _ = writeln!(spec, "Prefix: {prefix}");
    let _ = writeln!(spec, "AutoReqProv: no");
    let _ = writeln!(spec, "Requires: {rpm_prefix}-env-{branch}-tag-{tag_suffix}");
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%description");
    let _ = writeln!(
        spec,
        "The {label} label of the {branch} environment, currently at tag {tag_suffix}."
    );
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%install");
    let _ = writeln!(spec, "mkdir -p %{{buildroot}}{prefix}/envs/{branch}");
    let _ = writeln!(
        spec,
        "ln -snf {branch}-{tag_suffix} %{{buildroot}}{prefix}/envs/{branch}/{label}"
    );
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%files");
    let _ = writeln!(spec, "{prefix}/envs/{branch}/{label}");
    spec
}

/// Render the installer spec for the resolved interpreter package.
pub fn render_installer(record: &PackageRecord, config: &Config) -> String {
    let rpm_prefix = &config.rpm_prefix;
    let prefix = &config.install_prefix;
    let dist = record.dist();

    let mut spec = String::new();
    let _ = writeln!(spec, "Name: {rpm_prefix}-installer");
    let _ = writeln!(spec, "Version: {}", record.version);
    let _ = writeln!(spec, "Release: {}", record.build);
    let _ = writeln!(spec, "Summary: Bootstrap installer for {prefix}");
    let _ = writeln!(spec, "License: Unknown");
    let _ = writeln!(spec, "Prefix: {prefix}");
    let _ = writeln!(spec, "AutoReqProv: no");
    let _ = writeln!(spec, "Source0: install.py");
    let _ = writeln!(spec, "Source1: {dist}.tar.bz2");
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%description");
    let _ = writeln!(
        spec,
        "Installs {dist} into {prefix} and provides the link tool used by the"
    );
    let _ = writeln!(spec, "environment RPMs.");
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%install");
    let _ = writeln!(spec, "mkdir -p %{{buildroot}}{prefix}/bin");
    let _ = writeln!(spec, "mkdir -p %{{buildroot}}{prefix}/pkgs/{dist}");
    let _ = writeln!(
        spec,
        "tar --no-same-owner -xjf %{{SOURCE1}} -C %{{buildroot}}{prefix}/pkgs/{dist}"
    );
    let _ = writeln!(spec, "install -m 0755 %{{SOURCE0}} %{{buildroot}}{prefix}/bin/install.py");
    let _ = writeln!(spec);
    let _ = writeln!(spec, "%files");
    let _ = writeln!(spec, "{prefix}/bin/install.py");
    let _ = writeln!(spec, "{prefix}/pkgs/{dist}");
    spec
}

/// Split a `name-version-build` distribution id from the right; the name may
/// itself contain hyphens.
pub fn split_dist(dist: &str) -> Option<(&str, &str, &str)> {
    let mut parts = dist.rsplitn(3, '-');
    let build = parts.next()?;
    let version = parts.next()?;
    let name = parts.next()?;
    Some((name, version, build))
}

//! Environment manifest materialization.
//!
//! Reconciles a build target against one environment's manifest: prunes
//! stale linked packages, fetches missing tarballs into SOURCES, and emits
//! one spec file per package that has none yet.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::channel::ChannelIndex;
use crate::config::Config;
use crate::manifest::Manifest;
use crate::{Error, Result, install, render};

/// Bring `target` up to date with `manifest`.
///
/// If the target's linked set already equals the manifest's distribution
/// set, this returns without fetching or writing anything. That fast path
/// does not re-verify the integrity of existing packages.
pub fn materialize(manifest: &Manifest, target: &Path, config: &Config) -> Result<()> {
    let desired: BTreeSet<String> = manifest.dists().iter().map(|d| d.to_string()).collect();
    let pkg_cache = target.join("SOURCES");

    let linked: Vec<String> = if target.exists() {
        let linked = install::linked(target)?;
        for dist in &linked {
            if !desired.contains(dist) {
                info!(%dist, "unlinking stale package");
                install::unlink(target, dist)?;
            }
        }
        linked
    } else {
        Vec::new()
    };

    let linked: BTreeSet<String> = linked.into_iter().collect();
    if linked == desired {
        debug!(target = %target.display(), "already materialized");
        return Ok(());
    }

    let spec_dir = target.join("SPECS");
    fs::create_dir_all(&spec_dir)?;

    for pkg in manifest.entries() {
        // The index is fetched fresh for every entry; a stale cache could
        // hide a distribution that was pulled from the channel.
        let index = ChannelIndex::fetch(&pkg.channel)?;
        let tar_name = pkg.tarball_name();
        if index.get(&tar_name).is_none() {
            return Err(Error::DistributionUnavailable {
                dist: tar_name,
                channel: pkg.channel.clone(),
            });
        }
        if !install::is_fetched(&pkg_cache, &pkg.dist) {
            info!(dist = %pkg.dist, "fetching");
            index.fetch_package(&tar_name, &pkg_cache)?;
        }
        let spec_path = spec_dir.join(format!("{}-pkg-{}.spec", config.rpm_prefix, pkg.dist));
        if !spec_path.exists() {
            let spec = render::render_dist_spec(&pkg_cache.join(&tar_name), config)?;
            fs::write(&spec_path, spec)?;
            debug!(spec = %spec_path.display(), "wrote package spec");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{package_tarball, test_config};
    use tempfile::TempDir;

    const TWO_PKG_REPODATA: &str = r#"{
        "packages": {
            "pkg1-1.0-0.tar.bz2": {"name": "pkg1", "version": "1.0", "build": "0"},
            "pkg2-2.0-1.tar.bz2": {"name": "pkg2", "version": "2.0", "build": "1", "build_number": 1}
        }
    }"#;

    fn two_pkg_manifest(channel: &str) -> Manifest {
        Manifest::parse(&format!(
            "{channel}\tpkg1-1.0-0\n{channel}\tpkg2-2.0-1\n"
        ))
        .unwrap()
    }

    fn mock_channel(server: &mut mockito::Server) -> Vec<mockito::Mock> {
        vec![
            server
                .mock("GET", "/repodata.json")
                .with_body(TWO_PKG_REPODATA)
                .create(),
            server
                .mock("GET", "/pkg1-1.0-0.tar.bz2")
                .with_body(package_tarball("pkg1", "1.0", "0"))
                .create(),
            server
                .mock("GET", "/pkg2-2.0-1.tar.bz2")
                .with_body(package_tarball("pkg2", "2.0", "1"))
                .create(),
        ]
    }

    fn link(target: &Path, dist: &str) {
        let meta = target.join("conda-meta");
        fs::create_dir_all(&meta).unwrap();
        fs::write(meta.join(format!("{dist}.json")), r#"{"files": []}"#).unwrap();
    }

    #[test]
    fn test_empty_target_gets_specs_and_sources() {
        let mut server = mockito::Server::new();
        let _mocks = mock_channel(&mut server);
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("build");

        materialize(&two_pkg_manifest(&server.url()), &target, &test_config()).unwrap();

        assert!(target.join("SPECS/SciTools-pkg-pkg1-1.0-0.spec").exists());
        assert!(target.join("SPECS/SciTools-pkg-pkg2-2.0-1.spec").exists());
        assert!(target.join("SOURCES/pkg1-1.0-0.tar.bz2").exists());
        assert!(target.join("SOURCES/pkg2-2.0-1.tar.bz2").exists());
    }

    #[test]
    fn test_idempotent_second_call_rewrites_nothing() {
        let mut server = mockito::Server::new();
        let _mocks = mock_channel(&mut server);
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("build");
        let manifest = two_pkg_manifest(&server.url());

        materialize(&manifest, &target, &test_config()).unwrap();
        let spec_path = target.join("SPECS/SciTools-pkg-pkg1-1.0-0.spec");
        let before = fs::metadata(&spec_path).unwrap().modified().unwrap();

        materialize(&manifest, &target, &test_config()).unwrap();
        let after = fs::metadata(&spec_path).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_exact_linked_set_short_circuits() {
        // The channel URL is unreachable; the fast path must not touch it.
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("build");
        link(&target, "pkg1-1.0-0");
        link(&target, "pkg2-2.0-1");

        let manifest = two_pkg_manifest("http://127.0.0.1:1");
        materialize(&manifest, &target, &test_config()).unwrap();

        assert!(!target.join("SPECS").exists());
        assert!(!target.join("SOURCES").exists());
    }

    #[test]
    fn test_stale_linked_package_unlinked() {
        let mut server = mockito::Server::new();
        let _mocks = mock_channel(&mut server);
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("build");
        link(&target, "pkg1-1.0-0");
        link(&target, "obsolete-0.1-0");

        materialize(&two_pkg_manifest(&server.url()), &target, &test_config()).unwrap();

        let linked = install::linked(&target).unwrap();
        assert_eq!(linked, vec!["pkg1-1.0-0"]);
    }

    #[test]
    fn test_unavailable_distribution_is_fatal() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/repodata.json")
            .with_body(r#"{"packages": {}}"#)
            .create();
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("build");

        let manifest =
            Manifest::parse(&format!("{}\tpkg1-1.0-0\n", server.url())).unwrap();
        let err = materialize(&manifest, &target, &test_config()).unwrap_err();
        match err {
            Error::DistributionUnavailable { dist, .. } => {
                assert_eq!(dist, "pkg1-1.0-0.tar.bz2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failure_keeps_specs_already_written() {
        let mut server = mockito::Server::new();
        let _index = server
            .mock("GET", "/repodata.json")
            .with_body(
                r#"{"packages": {"pkg1-1.0-0.tar.bz2": {"name": "pkg1", "version": "1.0", "build": "0"}}}"#,
            )
            .create();
        let _tarball = server
            .mock("GET", "/pkg1-1.0-0.tar.bz2")
            .with_body(package_tarball("pkg1", "1.0", "0"))
            .create();
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("build");

        // pkg1 sorts first and is served; pkg2 is absent from the index.
        let err = materialize(&two_pkg_manifest(&server.url()), &target, &test_config())
            .unwrap_err();
        match err {
            Error::DistributionUnavailable { dist, .. } => {
                assert_eq!(dist, "pkg2-2.0-1.tar.bz2");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(target.join("SPECS/SciTools-pkg-pkg1-1.0-0.spec").exists());
        assert!(!target.join("SPECS/SciTools-pkg-pkg2-2.0-1.spec").exists());
    }

    #[test]
    fn test_cached_tarball_not_refetched() {
        let mut server = mockito::Server::new();
        let _index = server
            .mock("GET", "/repodata.json")
            .with_body(TWO_PKG_REPODATA)
            .create();
        // No tarball mocks: a download attempt would fail.
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("build");
        let sources = target.join("SOURCES");
        fs::create_dir_all(&sources).unwrap();
        fs::write(
            sources.join("pkg1-1.0-0.tar.bz2"),
            package_tarball("pkg1", "1.0", "0"),
        )
        .unwrap();
        fs::write(
            sources.join("pkg2-2.0-1.tar.bz2"),
            package_tarball("pkg2", "2.0", "1"),
        )
        .unwrap();

        materialize(&two_pkg_manifest(&server.url()), &target, &test_config()).unwrap();
        assert!(target.join("SPECS/SciTools-pkg-pkg1-1.0-0.spec").exists());
    }
}

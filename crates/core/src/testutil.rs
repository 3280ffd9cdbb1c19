//! Test helpers shared across module tests.

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::Config;

/// A config with fixed prefixes and no channels.
pub(crate) fn test_config() -> Config {
    Config {
        rpm_prefix: "SciTools".to_string(),
        install_prefix: "/opt/scitools".to_string(),
        channels: vec![],
    }
}

/// Build a minimal conda-style `.tar.bz2` in memory.
pub(crate) fn make_tarball(members: &[(&str, &str)]) -> Vec<u8> {
    let encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Write a tarball with the given members to `dir`.
pub(crate) fn write_tarball(dir: &Path, filename: &str, members: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(filename);
    let mut file = File::create(&path).unwrap();
    file.write_all(&make_tarball(members)).unwrap();
    path
}

/// A tarball carrying only `info/index.json` for the given identity.
pub(crate) fn package_tarball(name: &str, version: &str, build: &str) -> Vec<u8> {
    let index = format!(r#"{{"name": "{name}", "version": "{version}", "build": "{build}"}}"#);
    make_tarball(&[("info/index.json", &index)])
}

/// Run git in `dir`, panicking on failure.
pub(crate) fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.invalid")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.invalid")
        .status()
        .expect("failed to run git");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

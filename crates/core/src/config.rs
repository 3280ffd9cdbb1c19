//! Typed YAML configuration.
//!
//! The configuration is validated eagerly at load time and every missing
//! required key is reported at once, with its full dotted path.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{Error, Result};

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix baked into every generated RPM name and spec filename.
    pub rpm_prefix: String,
    /// Filesystem root the generated RPMs install into.
    pub install_prefix: String,
    /// Channel URLs queried by the installer resolver.
    pub channels: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    rpm: Option<RawRpm>,
    install: Option<RawInstall>,
    channels: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRpm {
    prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInstall {
    prefix: Option<String>,
}

impl Config {
    /// Load and validate the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigMissing(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let raw: RawConfig = serde_yaml::from_str(&text).map_err(|source| Error::ConfigSyntax {
            file: path.to_path_buf(),
            source,
        })?;
        Self::validate(raw, path)
    }

    fn validate(raw: RawConfig, path: &Path) -> Result<Self> {
        let mut missing = Vec::new();
        let rpm_prefix = raw.rpm.unwrap_or_default().prefix;
        if rpm_prefix.is_none() {
            missing.push("rpm.prefix".to_string());
        }
        let install_prefix = raw.install.unwrap_or_default().prefix;
        if install_prefix.is_none() {
            missing.push("install.prefix".to_string());
        }
        if !missing.is_empty() {
            return Err(Error::ConfigKeysMissing {
                file: path.to_path_buf(),
                keys: missing,
            });
        }
        Ok(Self {
            rpm_prefix: rpm_prefix.unwrap_or_default(),
            install_prefix: install_prefix.unwrap_or_default(),
            channels: raw.channels.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, text: &str) -> std::path::PathBuf {
        let path = dir.path().join("config.yaml");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_load_complete() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "rpm:\n  prefix: SciTools\ninstall:\n  prefix: /opt/scitools\nchannels:\n  - https://example.invalid/channel\n",
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.rpm_prefix, "SciTools");
        assert_eq!(config.install_prefix, "/opt/scitools");
        assert_eq!(config.channels.len(), 1);
    }

    #[test]
    fn test_channels_default_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "rpm:\n  prefix: P\ninstall:\n  prefix: /opt/p\n");
        let config = Config::load(&path).unwrap();
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_all_missing_keys_reported_at_once() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "channels: []\n");
        let err = Config::load(&path).unwrap_err();
        match err {
            Error::ConfigKeysMissing { keys, .. } => {
                assert_eq!(keys, vec!["rpm.prefix", "install.prefix"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_nested_key_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "rpm: {}\ninstall:\n  prefix: /opt/p\n");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("[rpm.prefix]"));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, Error::ConfigMissing(_)));
    }

    #[test]
    fn test_bad_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "rpm: [unclosed\n");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigSyntax { .. }));
    }
}

//! RPM identity resolution from spec-file text.

use std::path::Path;

use crate::{Error, Result};

/// The (name, version, release) triple declared by a spec file.
///
/// Fields are taken from the first `Name:`, `Version:` and `Release:` lines;
/// later duplicates are ignored so that hand-edited or templated specs which
/// redeclare values do not change the computed identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecIdentity {
    pub name: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
}

impl SpecIdentity {
    /// Extract the identity from spec-file text. First field wins.
    pub fn parse(text: &str) -> Self {
        let mut identity = Self::default();
        for line in text.lines() {
            if let Some(value) = line.strip_prefix("Name:") {
                if identity.name.is_none() {
                    identity.name = Some(value.trim().to_string());
                }
            } else if let Some(value) = line.strip_prefix("Version:") {
                if identity.version.is_none() {
                    identity.version = Some(value.trim().to_string());
                }
            } else if let Some(value) = line.strip_prefix("Release:") {
                if identity.release.is_none() {
                    identity.release = Some(value.trim().to_string());
                }
            }
        }
        identity
    }

    /// The filename of the built artifact, `<name>-<version>-<release>.x86_64.rpm`.
    ///
    /// A missing field is fatal; `spec` names the offending file in the error.
    pub fn rpm_filename(&self, spec: &Path) -> Result<String> {
        let field = |value: &Option<String>, field: &'static str| {
            value.clone().ok_or(Error::IdentityField {
                spec: spec.to_path_buf(),
                field,
            })
        };
        Ok(format!(
            "{}-{}-{}.x86_64.rpm",
            field(&self.name, "Name")?,
            field(&self.version, "Version")?,
            field(&self.release, "Release")?
        ))
    }
}

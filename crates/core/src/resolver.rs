//! "Latest match" resolution over channel indexes.
//!
//! The ordering below defines "latest": version segments compare numerically
//! where both sides are numeric, lexically otherwise, with the build number
//! as a tiebreaker. This is the resolver's intrinsic ordering, not a
//! guaranteed semantic-version ordering.

use std::cmp::Ordering;

use crate::channel::{ChannelIndex, PackageRecord};

/// A package match specification: a name plus an optional version prefix,
/// e.g. `python` or `python 2.*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpec {
    pub name: String,
    pub version: Option<String>,
}

impl MatchSpec {
    /// Parse a match specification of the form `<name>[ <version-pattern>]`.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(char::is_whitespace) {
            Some((name, version)) => Self {
                name: name.to_string(),
                version: Some(version.trim().to_string()),
            },
            None => Self {
                name: spec.to_string(),
                version: None,
            },
        }
    }

    fn matches(&self, record: &PackageRecord) -> bool {
        if record.name != self.name {
            return false;
        }
        match &self.version {
            None => true,
            Some(pattern) => match pattern.strip_suffix('*') {
                Some(prefix) => record.version.starts_with(prefix),
                None => record.version == *pattern,
            },
        }
    }
}

/// Pick the highest-sorted record matching `spec` across `indexes`.
pub fn find_latest<'a>(
    indexes: &'a [ChannelIndex],
    spec: &MatchSpec,
) -> Option<(&'a ChannelIndex, &'a PackageRecord)> {
    let mut best: Option<(&ChannelIndex, &PackageRecord)> = None;
    for index in indexes {
        for (_, record) in index.records() {
            if !spec.matches(record) {
                continue;
            }
            let better = match &best {
                None => true,
                Some((_, current)) => compare_records(record, current) == Ordering::Greater,
            };
            if better {
                best = Some((index, record));
            }
        }
    }
    best
}

fn compare_records(a: &PackageRecord, b: &PackageRecord) -> Ordering {
    compare_versions(&a.version, &b.version).then(a.build_number.cmp(&b.build_number))
}

/// Compare two version strings segment by segment.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = segments(a);
    let mut right = segments(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(m), Ok(n)) => m.cmp(&n),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn segments(version: &str) -> impl Iterator<Item = &str> {
    version
        .split(['.', '_', '-'])
        .filter(|s| !s.is_empty())
}

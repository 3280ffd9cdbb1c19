//! Branch, tag and label traversal of an environment repository.
//!
//! Environments live on paired branches: the environment branch itself and a
//! `_manifest_`-prefixed manifest branch carrying resolver output. Branches
//! without a manifest counterpart are not buildable and are skipped. Each
//! qualifying branch's `labels/` directory maps label names to
//! `env-<name>-<suffix>` tags; every labelled tag is materialized and gets a
//! tagged-environment spec, and every label gets an environment spec whose
//! version is the branch's commit count.
//!
//! Historical file content is read directly from blobs at the relevant
//! commits; the working tree is never checked out or mutated. Labels are
//! still read once per branch, before any tag is inspected.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use gix::ObjectId;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::manifest::{EnvSpec, Manifest};
use crate::materialize::materialize;
use crate::{Error, Result, render};

/// Reserved name prefix marking a manifest branch.
pub const MANIFEST_BRANCH_PREFIX: &str = "_manifest_";

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from the underlying git store.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to clone repository '{url}': {source}")]
    Clone {
        url: String,
        #[source]
        source: BoxedError,
    },

    #[error("failed to enumerate references: {source}")]
    Refs {
        #[source]
        source: BoxedError,
    },

    #[error("tag '{tag}' not found in the repository")]
    TagNotFound { tag: String },

    #[error("failed to read {what}: {source}")]
    Read {
        what: String,
        #[source]
        source: BoxedError,
    },
}

impl GitError {
    fn refs(source: impl Into<BoxedError>) -> Self {
        Self::Refs {
            source: source.into(),
        }
    }

    fn read(what: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        Self::Read {
            what: what.into(),
            source: source.into(),
        }
    }
}

/// Clone `url` into `dest` and return the opened repository.
pub fn clone_repo(url: &str, dest: &Path) -> Result<gix::Repository> {
    info!(url, dest = %dest.display(), "cloning repository");
    let mut prepared = gix::prepare_clone(url, dest).map_err(|e| GitError::Clone {
        url: url.to_string(),
        source: Box::new(e),
    })?;

    let (mut checkout, _outcome) = prepared
        .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| GitError::Clone {
            url: url.to_string(),
            source: Box::new(e),
        })?;

    let (repo, _outcome) = checkout
        .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| GitError::Clone {
            url: url.to_string(),
            source: Box::new(e),
        })?;

    Ok(repo)
}

/// Walk every qualifying environment branch and emit the rpmbuild content
/// for its labelled tags.
pub fn create_rpmbuild_content(
    repo: &gix::Repository,
    target: &Path,
    config: &Config,
) -> Result<()> {
    let branches = branch_tips(repo)?;
    let names: Vec<&str> = branches.iter().map(|(name, _)| name.as_str()).collect();

    for (branch, tip) in &branches {
        if branch.starts_with(MANIFEST_BRANCH_PREFIX) {
            continue;
        }
        let manifest_branch = format!("{MANIFEST_BRANCH_PREFIX}{branch}");
        if !names.contains(&manifest_branch.as_str()) {
            debug!(%branch, "no manifest branch, skipping environment");
            continue;
        }

        // Labels are read once per branch, before any tag is inspected.
        let labels = labels_at(repo, *tip)?;
        let commit_num = commit_count(repo, *tip)?;
        debug!(%branch, commits = commit_num, labels = labels.len(), "walking environment");

        let spec_dir = target.join("SPECS");
        fs::create_dir_all(&spec_dir)?;
        for (label, tag_name) in &labels {
            create_rpmbuild_for_tag(repo, tag_name, target, config)?;
            let (_, tag_suffix) = parse_tag_name(tag_name)?;
            let spec = render::render_env(branch, label, tag_suffix, commit_num, config);
            let fname = format!("{}-env-{}-label-{}.spec", config.rpm_prefix, branch, label);
            fs::write(spec_dir.join(fname), spec)?;
        }
    }
    Ok(())
}

/// Materialize the environment snapshot named by `tag_name` and write its
/// tagged-environment spec.
pub fn create_rpmbuild_for_tag(
    repo: &gix::Repository,
    tag_name: &str,
    target: &Path,
    config: &Config,
) -> Result<()> {
    info!(tag = tag_name, "creating rpmbuild content for tag");
    let commit = resolve_tag(repo, tag_name)?;

    let manifest_text =
        read_blob(repo, commit, "env.manifest")?.ok_or_else(|| Error::ManifestMissing {
            tag: tag_name.to_string(),
        })?;
    let spec_text = read_blob(repo, commit, "env.spec")?.ok_or_else(|| Error::EnvSpecMissing {
        tag: tag_name.to_string(),
    })?;

    let manifest_text = String::from_utf8(manifest_text)
        .map_err(|e| GitError::read(format!("'env.manifest' at tag '{tag_name}'"), e))?;
    let spec_text = String::from_utf8(spec_text)
        .map_err(|e| GitError::read(format!("'env.spec' at tag '{tag_name}'"), e))?;

    let manifest = Manifest::parse(&manifest_text)?;
    let env_spec = EnvSpec::parse(&spec_text, tag_name)?;

    materialize(&manifest, target, config)?;

    let (env_name, tag_suffix) = parse_tag_name(tag_name)?;
    let pkgs: Vec<String> = manifest.entries().iter().map(|p| p.dist.clone()).collect();
    let spec = render::render_taggedenv(env_name, tag_suffix, &pkgs, config, &env_spec.env);

    let spec_dir = target.join("SPECS");
    fs::create_dir_all(&spec_dir)?;
    let fname = format!(
        "{}-env-{}-tag-{}.spec",
        config.rpm_prefix, env_name, tag_suffix
    );
    fs::write(spec_dir.join(fname), spec)?;
    Ok(())
}

/// Split an `env-<name>-<suffix>` tag name into its environment name and
/// suffix. The suffix may itself contain hyphens.
pub fn parse_tag_name(tag: &str) -> Result<(&str, &str)> {
    let mut parts = tag.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("env"), Some(name), Some(suffix)) if !name.is_empty() && !suffix.is_empty() => {
            Ok((name, suffix))
        }
        _ => Err(Error::TagName {
            tag: tag.to_string(),
        }),
    }
}

/// All branch tips, local first, then remote-tracking branches under their
/// short names. The first occurrence of a name wins.
fn branch_tips(repo: &gix::Repository) -> Result<Vec<(String, ObjectId)>> {
    let mut tips: Vec<(String, ObjectId)> = Vec::new();
    let mut push = |name: String, id: ObjectId| {
        if name != "HEAD" && !tips.iter().any(|(n, _)| *n == name) {
            tips.push((name, id));
        }
    };

    let platform = repo.references().map_err(GitError::refs)?;
    for reference in platform.local_branches().map_err(GitError::refs)? {
        let mut reference = reference.map_err(GitError::refs)?;
        let name = reference.name().shorten().to_string();
        let id = reference
            .peel_to_id_in_place()
            .map_err(|e| GitError::read(format!("branch '{name}'"), e))?
            .detach();
        push(name, id);
    }
    for reference in platform.remote_branches().map_err(GitError::refs)? {
        let mut reference = reference.map_err(GitError::refs)?;
        let full = reference.name().shorten().to_string();
        // Strip the remote segment from e.g. `origin/main`.
        let name = match full.split_once('/') {
            Some((_, rest)) => rest.to_string(),
            None => full,
        };
        if name == "HEAD" {
            continue;
        }
        let id = reference
            .peel_to_id_in_place()
            .map_err(|e| GitError::read(format!("branch '{name}'"), e))?
            .detach();
        push(name, id);
    }
    Ok(tips)
}

/// Resolve a tag name to the commit it points at.
fn resolve_tag(repo: &gix::Repository, tag: &str) -> Result<ObjectId> {
    let mut reference = repo
        .find_reference(&format!("refs/tags/{tag}"))
        .map_err(|_| GitError::TagNotFound {
            tag: tag.to_string(),
        })?;
    let id = reference
        .peel_to_id_in_place()
        .map_err(|e| GitError::read(format!("tag '{tag}'"), e))?
        .detach();
    Ok(id)
}

/// Read the blob at `path` in the tree of `commit`, if present.
fn read_blob(repo: &gix::Repository, commit: ObjectId, path: &str) -> Result<Option<Vec<u8>>> {
    let context = || format!("'{path}' at {commit}");
    let tree = repo
        .find_object(commit)
        .map_err(|e| GitError::read(context(), e))?
        .try_into_commit()
        .map_err(|e| GitError::read(context(), e))?
        .tree()
        .map_err(|e| GitError::read(context(), e))?;
    let Some(entry) = tree
        .lookup_entry_by_path(path)
        .map_err(|e| GitError::read(context(), e))?
    else {
        return Ok(None);
    };
    let object = entry.object().map_err(|e| GitError::read(context(), e))?;
    Ok(Some(object.detach().data))
}

/// Read the label-to-tag mapping from the `labels/` directory at `commit`.
/// Each blob's filename is the label; its trimmed content names the tag.
fn labels_at(repo: &gix::Repository, commit: ObjectId) -> Result<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();
    let context = || format!("'labels' at {commit}");
    let tree = repo
        .find_object(commit)
        .map_err(|e| GitError::read(context(), e))?
        .try_into_commit()
        .map_err(|e| GitError::read(context(), e))?
        .tree()
        .map_err(|e| GitError::read(context(), e))?;
    let Some(entry) = tree
        .lookup_entry_by_path("labels")
        .map_err(|e| GitError::read(context(), e))?
    else {
        return Ok(labels);
    };
    let labels_tree = entry
        .object()
        .map_err(|e| GitError::read(context(), e))?
        .try_into_tree()
        .map_err(|e| GitError::read(context(), e))?;
    for entry in labels_tree.iter() {
        let entry = entry.map_err(|e| GitError::read(context(), e))?;
        if !entry.mode().is_blob() {
            continue;
        }
        let label = entry.filename().to_string();
        let object = repo
            .find_object(entry.oid().to_owned())
            .map_err(|e| GitError::read(format!("label '{label}'"), e))?;
        let tag = String::from_utf8(object.detach().data)
            .map_err(|e| GitError::read(format!("label '{label}'"), e))?;
        labels.insert(label, tag.trim().to_string());
    }
    Ok(labels)
}

/// The number of commits reachable from `tip`.
fn commit_count(repo: &gix::Repository, tip: ObjectId) -> Result<usize> {
    let walk = repo
        .rev_walk(Some(tip))
        .all()
        .map_err(|e| GitError::read(format!("history of {tip}"), e))?;
    let mut count = 0;
    for info in walk {
        info.map_err(|e| GitError::read(format!("history of {tip}"), e))?;
        count += 1;
    }
    Ok(count)
}

//! Validating and unpacking the data subtree of a pack.
//!
//! Validation walks every member before anything is written; a single
//! unsafe member rejects the whole pack.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::{data_relative, normalize_member, Pack};
use crate::common::{ensure_dir_exists, ensure_parent_exists};
use crate::error::ChrootError;

/// Counts of what was written into the root.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub dirs: usize,
    pub links: usize,
}

impl ExtractSummary {
    pub fn total(&self) -> usize {
        self.files + self.dirs + self.links
    }
}

fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

fn beneath_link(data_links: &HashSet<PathBuf>, rel: &Path) -> bool {
    rel.ancestors().skip(1).any(|a| data_links.contains(a))
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// True if a proper ancestor of `rel` (below `root`) is a symlink on disk.
fn crosses_symlink(root: &Path, rel: &Path) -> bool {
    rel.ancestors()
        .skip(1)
        .filter(|a| !a.as_os_str().is_empty())
        .any(|a| is_symlink(&root.join(a)))
}

fn unsafe_member(member: PathBuf, reason: &'static str) -> anyhow::Error {
    ChrootError::UnsafeArchive { member, reason }.into()
}

/// Check every member of the pack. Returns the number of members.
///
/// Rejects:
/// - names with a `..` component
/// - hard links whose target has a `..` component, sits outside `DATA/`
///   or lies beneath a symlink member
/// - data members lying beneath a symlink member of the data subtree
/// - directories or hard links at the path of an earlier symlink member
pub fn validate_members(pack: &Pack) -> Result<usize> {
    let mut archive = pack.archive()?;
    let mut data_links: HashSet<PathBuf> = HashSet::new();
    let mut count = 0;

    for entry in archive.entries().context("Failed to list pack members")? {
        let entry = entry.context("Failed to read pack member")?;
        let name = normalize_member(&entry.path()?);
        let kind = entry.header().entry_type();
        count += 1;

        if has_parent_component(&name) {
            return Err(unsafe_member(name, "parent directory component in name"));
        }

        let rel = data_relative(&name);

        if kind.is_hard_link() {
            if let Some(link) = entry.link_name()? {
                let link = normalize_member(&link);
                if has_parent_component(&link) {
                    return Err(unsafe_member(name, "hard link target has a parent directory component"));
                }
                match data_relative(&link) {
                    None if rel.is_some() => {
                        return Err(unsafe_member(name, "hard link target outside the data subtree"));
                    }
                    Some(target) if beneath_link(&data_links, &target) => {
                        return Err(unsafe_member(name, "hard link target lies beneath a symlink"));
                    }
                    _ => {}
                }
            }
        }

        if let Some(rel) = rel {
            if beneath_link(&data_links, &rel) {
                return Err(unsafe_member(name, "member lies beneath a symlink"));
            }
            if data_links.contains(&rel) && (kind.is_dir() || kind.is_hard_link()) {
                return Err(unsafe_member(name, "member replaces a symlink"));
            }
            if kind.is_symlink() {
                data_links.insert(rel);
            }
        }
    }

    debug!(members = count, "pack validated");
    Ok(count)
}

/// Unpack the data subtree of `pack` into `root`, stripping the `DATA/` prefix.
///
/// Preserves file modes, mtimes and symlink targets. Directory modes are
/// applied last so read-only directories can still be filled.
/// Call [`validate_members`] first.
pub fn extract_data(pack: &Pack, root: &Path) -> Result<ExtractSummary> {
    let mut archive = pack.archive()?;
    let mut summary = ExtractSummary::default();
    let mut dir_modes = Vec::new();

    for entry in archive.entries().context("Failed to list pack members")? {
        let mut entry = entry.context("Failed to read pack member")?;
        let name = normalize_member(&entry.path()?);
        let Some(rel) = data_relative(&name) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }

        if crosses_symlink(root, &rel) {
            return Err(unsafe_member(name, "member lies beneath a symlink"));
        }
        let dest = root.join(&rel);
        ensure_parent_exists(&dest)?;
        let kind = entry.header().entry_type();

        if kind.is_dir() {
            if is_symlink(&dest) {
                return Err(unsafe_member(name, "member replaces a symlink"));
            }
            ensure_dir_exists(&dest)?;
            if let Ok(mode) = entry.header().mode() {
                dir_modes.push((dest, mode));
            }
            summary.dirs += 1;
        } else if kind.is_hard_link() {
            let source = entry
                .link_name()?
                .and_then(|l| data_relative(&l))
                .ok_or_else(|| unsafe_member(name.clone(), "hard link target outside the data subtree"))?;
            if crosses_symlink(root, &source) {
                return Err(unsafe_member(name, "hard link target lies beneath a symlink"));
            }
            fs::hard_link(root.join(&source), &dest).with_context(|| {
                format!("Failed to link {} to {}", dest.display(), source.display())
            })?;
            summary.files += 1;
        } else {
            entry.set_preserve_permissions(true);
            entry.set_preserve_mtime(true);
            entry
                .unpack(&dest)
                .with_context(|| format!("Failed to extract {}", name.display()))?;
            if kind.is_symlink() {
                summary.links += 1;
            } else {
                summary.files += 1;
            }
        }
    }

    for (dir, mode) in dir_modes.into_iter().rev() {
        if is_symlink(&dir) {
            continue;
        }
        fs::set_permissions(&dir, fs::Permissions::from_mode(mode & 0o7777))
            .with_context(|| format!("Failed to set permissions: {}", dir.display()))?;
    }

    debug!(
        files = summary.files,
        dirs = summary.dirs,
        links = summary.links,
        "data subtree extracted"
    );
    Ok(summary)
}

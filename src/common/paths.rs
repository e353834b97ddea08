//! Path helpers for writing inside a target root.
//!
//! Host paths recorded in a pack are absolute (`/usr/lib/libfoo.so`). Inside
//! the target they live at `<root>/usr/lib/libfoo.so`, and any symlink that is
//! already in the root must be interpreted the way the process will see it
//! after the chroot: absolute link targets restart at the root, never at the
//! host's `/`.

use anyhow::{bail, Context, Result};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Maximum number of symlinks followed while resolving one path.
pub const MAX_LINK_HOPS: usize = 40;

/// A path component after dropping `.` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Part {
    Root,
    Up,
    Name(OsString),
}

pub(crate) fn parts(path: &Path) -> VecDeque<Part> {
    path.components()
        .filter_map(|c| match c {
            Component::Prefix(_) | Component::RootDir => Some(Part::Root),
            Component::CurDir => None,
            Component::ParentDir => Some(Part::Up),
            Component::Normal(name) => Some(Part::Name(name.to_os_string())),
        })
        .collect()
}

/// Strip the leading `/` from a host path, rejecting `..` components.
pub fn root_relative(path: &Path) -> Result<PathBuf> {
    let mut rel = PathBuf::new();
    for part in parts(path) {
        match part {
            Part::Root => {}
            Part::Up => bail!("path {} contains a parent directory component", path.display()),
            Part::Name(name) => rel.push(name),
        }
    }
    Ok(rel)
}

/// Resolve `path` as seen from inside `root`.
///
/// Symlinks that exist under `root` are followed, absolute targets restart
/// at `root` and `..` stops at `root`. Components that do not exist yet are
/// appended as-is, so the result is where a subsequent create would land.
pub fn resolve_in_root(root: &Path, path: &Path) -> Result<PathBuf> {
    let mut resolved = PathBuf::new();
    let mut pending = parts(path);
    let mut hops = 0;

    while let Some(part) = pending.pop_front() {
        match part {
            Part::Root => resolved = PathBuf::new(),
            Part::Up => {
                resolved.pop();
            }
            Part::Name(name) => {
                let candidate = resolved.join(&name);
                let full = root.join(&candidate);
                let is_link = fs::symlink_metadata(&full)
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if !is_link {
                    resolved = candidate;
                    continue;
                }

                hops += 1;
                if hops > MAX_LINK_HOPS {
                    bail!(
                        "too many levels of symbolic links resolving {} under {}",
                        path.display(),
                        root.display()
                    );
                }
                let target = fs::read_link(&full)
                    .with_context(|| format!("Failed to read link {}", full.display()))?;
                let mut target_parts = parts(&target);
                while let Some(p) = target_parts.pop_back() {
                    pending.push_front(p);
                }
            }
        }
    }

    Ok(root.join(resolved))
}

/// Where a host path should be written inside `root`.
///
/// The parent is resolved with [`resolve_in_root`]; the final component is
/// kept literal so a symlink can be created at that exact name.
pub fn resolve_parent_in_root(root: &Path, host_path: &Path) -> Result<PathBuf> {
    let rel = root_relative(host_path)?;
    let Some(name) = rel.file_name() else {
        return Ok(root.to_path_buf());
    };
    let parent = rel.parent().unwrap_or_else(|| Path::new(""));
    Ok(resolve_in_root(root, parent)?.join(name))
}

/// True if something (including a dangling symlink) exists at `path`.
pub fn exists_no_follow(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Create a directory and all missing parents. Existing directories are fine.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))?;
    Ok(())
}

/// Ensure all parent directories of a file exist.
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }
    Ok(())
}

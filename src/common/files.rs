//! File writing and copying helpers.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

use super::paths::ensure_parent_exists;

/// Write a file, creating parent directories as needed. Truncates existing content.
pub fn write_file_with_dirs<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, content: C) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_exists(path)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write a file with specific Unix permissions, creating parent directories as needed.
///
/// # Arguments
/// * `path` - Path to the file to write
/// * `content` - Content to write
/// * `mode` - Unix permission bits (e.g., 0o755 for scripts)
pub fn write_file_mode<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
    mode: u32,
) -> Result<()> {
    let path = path.as_ref();
    write_file_with_dirs(path, content)?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to set permissions: {}", path.display()))?;
    Ok(())
}

/// Copy `src` to `dest` without dereferencing a symlink at `src`.
///
/// A symlink is recreated with the same target string, a directory is
/// created, anything else is copied with its permission bits. Parent
/// directories of `dest` are created as needed.
pub fn copy_preserving_links(src: &Path, dest: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(src)
        .with_context(|| format!("Failed to read metadata: {}", src.display()))?;
    ensure_parent_exists(dest)?;

    if meta.file_type().is_symlink() {
        let target = fs::read_link(src)
            .with_context(|| format!("Failed to read link {}", src.display()))?;
        symlink(&target, dest)
            .with_context(|| format!("Failed to create symlink {}", dest.display()))?;
    } else if meta.is_dir() {
        fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create directory {}", dest.display()))?;
    } else {
        fs::copy(src, dest).with_context(|| {
            format!("Failed to copy {} to {}", src.display(), dest.display())
        })?;
    }
    Ok(())
}

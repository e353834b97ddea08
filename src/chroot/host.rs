//! Copying files of unpacked packages from this host into the root.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::links::find_all_links;
use super::record;
use crate::common::{copy_preserving_links, exists_no_follow, resolve_parent_in_root};
use crate::error::Warning;
use crate::pack::PackConfig;

/// Outcome of installing one host path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installed {
    Copied,
    /// Something already exists at the destination.
    Present,
    MissingOnHost,
    /// The destination would land outside the root.
    OutsideRoot,
}

/// Copy a single host path (not following a symlink at the leaf) into `root`.
pub fn install_host_path(root: &Path, host_path: &Path) -> Result<Installed> {
    let dest = match resolve_parent_in_root(root, host_path) {
        Ok(dest) => dest,
        Err(e) => {
            debug!("cannot place {} in root: {:#}", host_path.display(), e);
            return Ok(Installed::OutsideRoot);
        }
    };
    if exists_no_follow(&dest) {
        return Ok(Installed::Present);
    }
    if !exists_no_follow(host_path) {
        return Ok(Installed::MissingOnHost);
    }
    copy_preserving_links(host_path, &dest)?;
    debug!("copied {} from host", host_path.display());
    Ok(Installed::Copied)
}

/// Install `host_path` together with every symlink on its way.
///
/// Returns the number of entries copied and the paths missing on the host.
pub fn install_with_links(
    root: &Path,
    host_path: &Path,
    warnings: &mut Vec<Warning>,
) -> Result<(usize, Vec<PathBuf>)> {
    let mut copied = 0;
    let mut missing = Vec::new();
    for path in find_all_links(host_path) {
        match install_host_path(root, &path)? {
            Installed::Copied => copied += 1,
            Installed::Present => {}
            Installed::MissingOnHost => missing.push(path),
            Installed::OutsideRoot => record(warnings, Warning::UnsafeDestination { path }),
        }
    }
    Ok((copied, missing))
}

/// Fill in the files of every package that was not captured in the pack.
///
/// Packages with `packfiles = true` are not touched. Files missing on this
/// host are reported as warnings and skipped.
pub fn copy_unpacked_packages(
    root: &Path,
    config: &PackConfig,
    warnings: &mut Vec<Warning>,
) -> Result<usize> {
    let unpacked: Vec<_> = config.unpacked_packages().collect();
    if unpacked.is_empty() {
        return Ok(0);
    }

    let names: Vec<&str> = unpacked.iter().map(|p| p.name.as_str()).collect();
    info!(
        "some files were left out of the pack because they belong to: {}; copying them from this host",
        names.join(", ")
    );

    let mut copied = 0;
    for package in unpacked {
        for file in &package.files {
            let (n, missing) = install_with_links(root, file, warnings)?;
            copied += n;
            for path in missing {
                record(
                    warnings,
                    Warning::MissingSourceFile {
                        path,
                        package: package.name.clone(),
                    },
                );
            }
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::Package;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn package(name: &str, packfiles: bool, files: &[&Path]) -> Package {
        Package {
            name: name.to_string(),
            version: None,
            size: None,
            packfiles,
            files: files.iter().map(|f| f.to_path_buf()).collect(),
        }
    }

    fn pack_config(packages: Vec<Package>) -> PackConfig {
        PackConfig {
            packages,
            ..Default::default()
        }
    }

    #[test]
    fn test_install_skips_present_destination() {
        let temp = TempDir::new().unwrap();
        let host = temp.path().join("host.txt");
        fs::write(&host, "host").unwrap();
        let root = temp.path().join("root");
        let dest = root.join(host.strip_prefix("/").unwrap());
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, "packed").unwrap();

        assert_eq!(install_host_path(&root, &host).unwrap(), Installed::Present);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "packed");
    }

    #[test]
    fn test_install_twice_is_harmless() {
        let temp = TempDir::new().unwrap();
        let host = temp.path().join("lib.so");
        fs::write(&host, "elf").unwrap();
        let root = temp.path().join("root");

        assert_eq!(install_host_path(&root, &host).unwrap(), Installed::Copied);
        assert_eq!(install_host_path(&root, &host).unwrap(), Installed::Present);
    }

    #[test]
    fn test_packed_packages_untouched() {
        let temp = TempDir::new().unwrap();
        let host = temp.path().join("packed.so");
        fs::write(&host, "elf").unwrap();
        let root = temp.path().join("root");
        fs::create_dir(&root).unwrap();

        let mut warnings = Vec::new();
        let pkgs = pack_config(vec![package("packed", true, &[&host])]);
        let copied = copy_unpacked_packages(&root, &pkgs, &mut warnings).unwrap();

        assert_eq!(copied, 0);
        assert!(warnings.is_empty());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_host_file_is_a_warning() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir(&root).unwrap();
        let missing = temp.path().join("not-there.so");

        let mut warnings = Vec::new();
        let pkgs = pack_config(vec![package("ghost", false, &[&missing])]);
        let copied = copy_unpacked_packages(&root, &pkgs, &mut warnings).unwrap();

        assert_eq!(copied, 0);
        assert_eq!(
            warnings,
            vec![Warning::MissingSourceFile {
                path: missing,
                package: "ghost".to_string(),
            }]
        );
    }

    #[test]
    fn test_symlink_recreated_not_followed() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().canonicalize().unwrap();
        fs::write(base.join("libfoo.so.1"), "real").unwrap();
        symlink("libfoo.so.1", base.join("libfoo.so")).unwrap();
        let root = base.join("root");
        fs::create_dir(&root).unwrap();

        let mut warnings = Vec::new();
        let pkgs = pack_config(vec![package("libfoo", false, &[&base.join("libfoo.so")])]);
        let copied = copy_unpacked_packages(&root, &pkgs, &mut warnings).unwrap();

        let rel = base.strip_prefix("/").unwrap();
        assert_eq!(copied, 2);
        assert!(root.join(rel).join("libfoo.so").is_symlink());
        assert_eq!(
            fs::read_to_string(root.join(rel).join("libfoo.so.1")).unwrap(),
            "real"
        );
        assert!(warnings.is_empty());
    }
}

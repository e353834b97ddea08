//! Recreating working directories the archive left out.
//!
//! Tar only records directories that hold something, so a directory that
//! was only ever a `cd` target can be missing after extraction.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::record;
use crate::common::{ensure_dir_exists, resolve_in_root};
use crate::error::Warning;
use crate::pack::{list_working_directories, Pack};

/// Create every working directory recorded in the pack's trace store.
///
/// Never fails: a missing or unreadable store is a warning. Returns the
/// number of directories created.
pub fn reconcile_working_directories(pack: &Pack, root: &Path, warnings: &mut Vec<Warning>) -> usize {
    let dirs = match list_working_directories(pack) {
        Ok(Some(dirs)) => dirs,
        Ok(None) => {
            record(
                warnings,
                Warning::MetadataUnavailable {
                    reason: "pack has no trace store".to_string(),
                },
            );
            return 0;
        }
        Err(e) => {
            record(
                warnings,
                Warning::MetadataUnavailable {
                    reason: format!("{:#}", e),
                },
            );
            return 0;
        }
    };
    debug!("{} working directories recorded", dirs.len());
    ensure_working_directories(root, &dirs, warnings)
}

/// Make sure each of `dirs` exists as a directory inside `root`.
pub fn ensure_working_directories(
    root: &Path,
    dirs: &BTreeSet<PathBuf>,
    warnings: &mut Vec<Warning>,
) -> usize {
    let mut created = 0;
    for dir in dirs {
        let dest = match resolve_in_root(root, dir) {
            Ok(dest) => dest,
            Err(e) => {
                record(
                    warnings,
                    Warning::DirectoryNotCreated {
                        path: dir.clone(),
                        reason: format!("{:#}", e),
                    },
                );
                continue;
            }
        };
        if dest.is_dir() {
            continue;
        }
        match ensure_dir_exists(&dest) {
            Ok(()) => {
                debug!("created working directory {}", dir.display());
                created += 1;
            }
            Err(e) => record(
                warnings,
                Warning::DirectoryNotCreated {
                    path: dir.clone(),
                    reason: format!("{:#}", e),
                },
            ),
        }
    }
    created
}

//! Symlink chains on the host.
//!
//! To make `/usr/lib/libfoo.so` usable in another root it is not enough to
//! copy the file it points to: every symlink crossed on the way (including
//! symlinked directories such as `/lib -> usr/lib`) has to exist there too.

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::paths::{parts, Part, MAX_LINK_HOPS};

/// List every host path that must exist for `path` to resolve.
///
/// Resolution walks from `/` to the leaf. Each symlink met on the way is
/// recorded and resolution continues from its target. The walk ends at the
/// first missing component (the unresolved path is returned last) or at the
/// leaf, which is returned last. A chain of `n` symlinks ending in a real
/// file therefore yields `n + 1` entries, in resolution order.
pub fn find_all_links(path: &Path) -> Vec<PathBuf> {
    let mut chain = Vec::new();
    let mut current = PathBuf::from("/");
    let mut pending = parts(path);

    while let Some(part) = pending.pop_front() {
        let name = match part {
            Part::Root => {
                current = PathBuf::from("/");
                continue;
            }
            Part::Up => {
                current.pop();
                continue;
            }
            Part::Name(name) => name,
        };

        let candidate = current.join(&name);
        let meta = match fs::symlink_metadata(&candidate) {
            Ok(meta) => meta,
            Err(_) => {
                let mut missing = candidate;
                for rest in pending {
                    match rest {
                        Part::Root => missing = PathBuf::from("/"),
                        Part::Up => {
                            missing.pop();
                        }
                        Part::Name(n) => missing.push(n),
                    }
                }
                chain.push(missing);
                return chain;
            }
        };

        if !meta.file_type().is_symlink() {
            current = candidate;
            continue;
        }

        if chain.len() >= MAX_LINK_HOPS || chain.contains(&candidate) {
            return chain;
        }
        let Ok(target) = fs::read_link(&candidate) else {
            chain.push(candidate);
            return chain;
        };
        chain.push(candidate);

        let mut target_parts = parts(&target);
        while let Some(p) = target_parts.pop_back() {
            pending.push_front(p);
        }
    }

    chain.push(current);
    chain
}

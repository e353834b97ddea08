//! Shared utilities across packroot modules.

pub mod files;
pub mod paths;
pub mod shell;

pub use files::{copy_preserving_links, write_file_mode};
pub use paths::{
    ensure_dir_exists, ensure_parent_exists, exists_no_follow, resolve_in_root,
    resolve_parent_in_root, root_relative,
};
pub use shell::{join_escaped, shell_escape};

//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `chroot` - Rebuild a root filesystem from a pack
//! - `show` - Display information

pub mod chroot;
pub mod show;

pub use chroot::cmd_chroot;
pub use show::cmd_show;

//! packroot library exports.
//!
//! Rebuilds a chroot-able root filesystem from a captured pack. The binary
//! in `main.rs` is a thin CLI over [`chroot::create_chroot`]; everything is
//! exposed here for integration testing.

pub mod chroot;
pub mod common;
pub mod config;
pub mod error;
pub mod pack;
pub mod process;
pub mod timing;

pub use chroot::{create_chroot, create_chroot_with, ChrootReport};
pub use config::Config;
pub use error::{ChrootError, Warning};

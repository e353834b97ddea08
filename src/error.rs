//! Error and warning types for root reconstruction.
//!
//! Fatal conditions are `ChrootError` values carried inside `anyhow::Error`;
//! recover them with `err.downcast_ref::<ChrootError>()`. Recoverable
//! conditions are `Warning` values collected into the run report.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort reconstruction.
#[derive(Debug, Error)]
pub enum ChrootError {
    /// The target directory must not exist before reconstruction starts.
    #[error("target directory {} already exists", .0.display())]
    TargetExists(PathBuf),

    /// A pack member would be written outside the target root.
    #[error("pack contains unsafe member '{}': {reason}", member.display())]
    UnsafeArchive { member: PathBuf, reason: &'static str },

    /// The interpreter's dependencies could not be listed or installed.
    #[error("cannot install interpreter {}: {reason}", interpreter.display())]
    DependencyResolution { interpreter: PathBuf, reason: String },
}

/// Conditions that are reported but never abort reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A file of an unpacked package is missing on this host.
    MissingSourceFile { path: PathBuf, package: String },
    /// The trace store is absent or unreadable; working directories were not checked.
    MetadataUnavailable { reason: String },
    /// A destination resolved outside the target root and was skipped.
    UnsafeDestination { path: PathBuf },
    /// A working directory could not be created inside the root.
    DirectoryNotCreated { path: PathBuf, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingSourceFile { path, package } => write!(
                f,
                "missing file {} (from package {}) on host, experiment will probably miss it",
                path.display(),
                package
            ),
            Warning::MetadataUnavailable { reason } => write!(
                f,
                "trace metadata unavailable, can't create working directories: {}",
                reason
            ),
            Warning::UnsafeDestination { path } => write!(
                f,
                "skipping {}: destination resolves outside the root",
                path.display()
            ),
            Warning::DirectoryNotCreated { path, reason } => write!(
                f,
                "could not create working directory {}: {}",
                path.display(),
                reason
            ),
        }
    }
}

//! Target layout shared by all reconstruction stages.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::script::SCRIPT_NAME;
use crate::common::exists_no_follow;
use crate::error::ChrootError;

/// Paths of one reconstruction target.
#[derive(Debug, Clone)]
pub struct ChrootContext {
    /// Directory created for this reconstruction.
    pub target: PathBuf,
    /// Reconstructed filesystem, `<target>/root`. Always absolute.
    pub root: PathBuf,
}

impl ChrootContext {
    /// Describe a target that does not exist yet. Nothing is created.
    ///
    /// The target must be valid UTF-8 since the replay script names the root.
    pub fn new(target: &Path) -> Result<Self> {
        if exists_no_follow(target) {
            return Err(ChrootError::TargetExists(target.to_path_buf()).into());
        }
        let target = if target.is_absolute() {
            target.to_path_buf()
        } else {
            std::env::current_dir()
                .context("Failed to read current directory")?
                .join(target)
        };
        if target.to_str().is_none() {
            bail!(
                "Target {} is not valid UTF-8; the replay script can't name it",
                target.display()
            );
        }
        let root = target.join("root");
        Ok(Self { target, root })
    }

    /// Create the target and its empty root.
    pub fn create_dirs(&self) -> Result<()> {
        fs::create_dir(&self.target)
            .with_context(|| format!("Failed to create {}", self.target.display()))?;
        fs::create_dir(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))?;
        Ok(())
    }

    /// Location of the replay script.
    pub fn script_path(&self) -> PathBuf {
        self.target.join(SCRIPT_NAME)
    }
}

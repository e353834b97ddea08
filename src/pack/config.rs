//! Recorded configuration embedded in a pack (`METADATA/config.yml`).

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

/// User and group used when a run does not record its own.
pub const DEFAULT_UID: u32 = 1000;
pub const DEFAULT_GID: u32 = 1000;

/// Everything the tracing phase recorded about the experiment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackConfig {
    /// Format version written by the packer.
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: Option<String>,
    /// Recorded process invocations, in replay order.
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub packages: Vec<Package>,
    /// Files that belong to no package. Always packed.
    #[serde(default)]
    pub other_files: Vec<PathBuf>,
}

/// One recorded process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Run {
    pub binary: PathBuf,
    #[serde(default)]
    pub argv: Vec<String>,
    pub workingdir: PathBuf,
    #[serde(default)]
    pub uid: Option<u32>,
    #[serde(default)]
    pub gid: Option<u32>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub hostname: Option<String>,
}

impl Run {
    /// `uid:gid` for `chroot --userspec`.
    pub fn userspec(&self) -> String {
        format!(
            "{}:{}",
            self.uid.unwrap_or(DEFAULT_UID),
            self.gid.unwrap_or(DEFAULT_GID)
        )
    }
}

/// A host package and the files the experiment used from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Whether the package's files were captured in the pack.
    #[serde(default = "default_packfiles")]
    pub packfiles: bool,
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

fn default_packfiles() -> bool {
    true
}

/// Accept `version: 0.4` as well as `version: '0.4'`.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_yaml::Value::Null) => None,
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a string or number, got {:?}",
                other
            )))
        }
    })
}

impl PackConfig {
    /// Parse `config.yml` content.
    pub fn parse(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse pack configuration (config.yml)")
    }

    /// Packages whose files must be taken from this host.
    pub fn unpacked_packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter().filter(|p| !p.packfiles)
    }
}

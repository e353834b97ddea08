//! Reading captured packs.
//!
//! A pack is a tar archive, optionally gzip-compressed, laid out as:
//! - `DATA/...` - captured files, relative to the traced host's `/`
//! - `METADATA/config.yml` - recorded runs and packages
//! - `METADATA/trace.sqlite3` - trace store (optional)

pub mod config;
pub mod extract;
pub mod trace;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tar::Archive;

pub use config::{Package, PackConfig, Run};
pub use extract::{extract_data, validate_members, ExtractSummary};
pub use trace::{list_working_directories, FILE_WDIR};

/// Top-level directory holding the captured filesystem.
pub const DATA_PREFIX: &str = "DATA";
/// Member holding the recorded configuration.
pub const CONFIG_MEMBER: &str = "METADATA/config.yml";
/// Member holding the trace store.
pub const TRACE_MEMBER: &str = "METADATA/trace.sqlite3";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Handle on a pack file. Each read re-opens the archive from the start.
#[derive(Debug, Clone)]
pub struct Pack {
    path: PathBuf,
}

impl Pack {
    /// Open a pack, checking that the file exists.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("Pack not found: {}", path.display());
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Open the underlying tar stream, decompressing if needed.
    pub(crate) fn archive(&self) -> Result<Archive<Box<dyn Read>>> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open pack: {}", self.path.display()))?;

        let mut magic = [0u8; 2];
        let gzipped = file.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC;
        file.seek(SeekFrom::Start(0))?;

        let reader: Box<dyn Read> = if gzipped {
            Box::new(GzDecoder::new(BufReader::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Archive::new(reader))
    }

    /// Read a whole member into memory. Returns `None` if it is absent.
    pub fn read_member(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let wanted = Path::new(name);
        let mut archive = self.archive()?;
        for entry in archive.entries().context("Failed to list pack members")? {
            let mut entry = entry.context("Failed to read pack member")?;
            if normalize_member(&entry.path()?) != wanted {
                continue;
            }
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .with_context(|| format!("Failed to read {} from pack", name))?;
            return Ok(Some(content));
        }
        Ok(None)
    }

    /// Stream a member into `dest`. Returns false if it is absent.
    pub fn extract_member(&self, name: &str, dest: &Path) -> Result<bool> {
        let wanted = Path::new(name);
        let mut archive = self.archive()?;
        for entry in archive.entries().context("Failed to list pack members")? {
            let mut entry = entry.context("Failed to read pack member")?;
            if normalize_member(&entry.path()?) != wanted {
                continue;
            }
            let mut out = File::create(dest)
                .with_context(|| format!("Failed to create {}", dest.display()))?;
            io::copy(&mut entry, &mut out)
                .with_context(|| format!("Failed to extract {} from pack", name))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Load the recorded runs and packages.
    pub fn load_config(&self) -> Result<PackConfig> {
        let raw = self.read_member(CONFIG_MEMBER)?.with_context(|| {
            format!(
                "Pack {} has no {}, is this a valid pack?",
                self.path.display(),
                CONFIG_MEMBER
            )
        })?;
        let text = String::from_utf8(raw).context("config.yml is not valid UTF-8")?;
        PackConfig::parse(&text)
    }
}

/// Drop `.` components from a member name.
pub(crate) fn normalize_member(name: &Path) -> PathBuf {
    name.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Path of a member relative to the data subtree, if it lies under it.
pub fn data_relative(name: &Path) -> Option<PathBuf> {
    normalize_member(name)
        .strip_prefix(DATA_PREFIX)
        .ok()
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_relative_strips_prefix() {
        assert_eq!(
            data_relative(Path::new("DATA/bin/app")),
            Some(PathBuf::from("bin/app"))
        );
        assert_eq!(
            data_relative(Path::new("./DATA/usr/lib")),
            Some(PathBuf::from("usr/lib"))
        );
        assert_eq!(data_relative(Path::new("DATA")), Some(PathBuf::new()));
    }

    #[test]
    fn test_data_relative_matches_whole_component() {
        assert_eq!(data_relative(Path::new("DATAX/bin/app")), None);
        assert_eq!(data_relative(Path::new("METADATA/config.yml")), None);
    }

    #[test]
    fn test_open_missing_pack() {
        assert!(Pack::open(Path::new("/nonexistent_pack_12345.rpz")).is_err());
    }
}

//! Shared test utilities for packroot tests.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::Connection;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::{EntryType, Header};
use tempfile::TempDir;

use packroot::chroot::DependencyLister;
use packroot::ChrootError;

/// `opened_files.mode` for a working directory.
pub const FILE_WDIR: i64 = 4;

/// Test environment with a scratch host tree and a not-yet-created target.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Canonical base of the temporary directory
    pub base: PathBuf,
    /// Stand-in for host files referenced by packages
    pub host: PathBuf,
    /// Reconstruction target (does not exist yet)
    pub target: PathBuf,
    /// Where packs are written
    pub pack: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir
            .path()
            .canonicalize()
            .expect("Failed to canonicalize temp dir");
        let host = base.join("host");
        fs::create_dir_all(&host).expect("Failed to create host dir");

        Self {
            _temp_dir: temp_dir,
            target: base.join("exp"),
            pack: base.join("exp.rpz"),
            host,
            base,
        }
    }

    pub fn root(&self) -> PathBuf {
        self.target.join("root")
    }

    /// Where a host path ends up inside the target root.
    pub fn in_root(&self, host_path: &Path) -> PathBuf {
        self.root()
            .join(host_path.strip_prefix("/").expect("host path must be absolute"))
    }

    /// Create an executable file standing in for the interpreter.
    pub fn fake_interpreter(&self) -> PathBuf {
        let sh = self.host.join("bin/sh");
        create_mock_binary(&sh);
        sh
    }
}

// =============================================================================
// Pack building
// =============================================================================

enum Member {
    File { name: String, content: Vec<u8>, mode: u32 },
    Dir { name: String, mode: u32 },
    Symlink { name: String, target: String },
    HardLink { name: String, target: String },
}

/// Builds pack archives. Member names are written raw, so unsafe names can
/// be produced on purpose.
#[derive(Default)]
pub struct PackBuilder {
    members: Vec<Member>,
    gzip: bool,
}

fn raw_header(name: &str, kind: EntryType, size: u64, mode: u32, link: Option<&str>) -> Header {
    let mut header = Header::new_gnu();
    {
        let old = header.as_old_mut();
        old.name[..name.len()].copy_from_slice(name.as_bytes());
        if let Some(link) = link {
            old.linkname[..link.len()].copy_from_slice(link.as_bytes());
        }
    }
    header.set_entry_type(kind);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(1_600_000_000);
    header.set_cksum();
    header
}

impl PackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gzip(mut self) -> Self {
        self.gzip = true;
        self
    }

    pub fn file(mut self, name: &str, content: &str, mode: u32) -> Self {
        self.members.push(Member::File {
            name: name.to_string(),
            content: content.as_bytes().to_vec(),
            mode,
        });
        self
    }

    pub fn dir(mut self, name: &str, mode: u32) -> Self {
        self.members.push(Member::Dir {
            name: name.to_string(),
            mode,
        });
        self
    }

    pub fn symlink(mut self, name: &str, target: &str) -> Self {
        self.members.push(Member::Symlink {
            name: name.to_string(),
            target: target.to_string(),
        });
        self
    }

    pub fn hard_link(mut self, name: &str, target: &str) -> Self {
        self.members.push(Member::HardLink {
            name: name.to_string(),
            target: target.to_string(),
        });
        self
    }

    pub fn config(self, yaml: &str) -> Self {
        self.file("METADATA/config.yml", yaml, 0o644)
    }

    /// Add a trace store recording `workdirs` as working directories.
    pub fn trace(mut self, workdirs: &[&str]) -> Self {
        let content = trace_store(workdirs);
        self.members.push(Member::File {
            name: "METADATA/trace.sqlite3".to_string(),
            content,
            mode: 0o644,
        });
        self
    }

    pub fn write(self, path: &Path) {
        let file = fs::File::create(path).expect("Failed to create pack");
        if self.gzip {
            let encoder = GzEncoder::new(file, Compression::default());
            let encoder = self.append_all(encoder);
            encoder.finish().expect("Failed to finish gzip stream");
        } else {
            self.append_all(file).flush().expect("Failed to flush pack");
        }
    }

    fn append_all<W: Write>(self, writer: W) -> W {
        let mut builder = tar::Builder::new(writer);
        for member in self.members {
            match member {
                Member::File {
                    name,
                    content,
                    mode,
                } => {
                    let header =
                        raw_header(&name, EntryType::Regular, content.len() as u64, mode, None);
                    builder.append(&header, content.as_slice()).expect("append file");
                }
                Member::Dir { name, mode } => {
                    let header = raw_header(&name, EntryType::Directory, 0, mode, None);
                    builder.append(&header, std::io::empty()).expect("append dir");
                }
                Member::Symlink { name, target } => {
                    let header = raw_header(&name, EntryType::Symlink, 0, 0o777, Some(&target));
                    builder.append(&header, std::io::empty()).expect("append symlink");
                }
                Member::HardLink { name, target } => {
                    let header = raw_header(&name, EntryType::Link, 0, 0o644, Some(&target));
                    builder.append(&header, std::io::empty()).expect("append hard link");
                }
            }
        }
        builder.into_inner().expect("Failed to finish tar stream")
    }
}

/// Bytes of a trace store with an `opened_files` table.
pub fn trace_store(workdirs: &[&str]) -> Vec<u8> {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let path = temp.path().join("trace.sqlite3");
    let conn = Connection::open(&path).expect("Failed to create trace store");
    conn.execute_batch(
        "CREATE TABLE opened_files(
            id INTEGER NOT NULL PRIMARY KEY,
            run_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            mode INTEGER NOT NULL,
            is_directory BOOLEAN NOT NULL,
            process INTEGER NOT NULL
        );",
    )
    .expect("Failed to create table");

    for (i, dir) in workdirs.iter().enumerate() {
        conn.execute(
            "INSERT INTO opened_files(run_id, name, timestamp, mode, is_directory, process)
             VALUES (0, ?1, ?2, ?3, 1, 1)",
            rusqlite::params![dir, i as i64, FILE_WDIR],
        )
        .expect("Failed to insert working directory");
    }
    // A read of a regular file, which must not show up as a working directory
    conn.execute(
        "INSERT INTO opened_files(run_id, name, timestamp, mode, is_directory, process)
         VALUES (0, '/etc/passwd', 100, 1, 0, 1)",
        [],
    )
    .expect("Failed to insert file read");
    drop(conn);

    fs::read(&path).expect("Failed to read trace store")
}

/// Single-run configuration for `/bin/app --flag` in `/home/user`.
pub const APP_CONFIG: &str = r#"
version: '0.4'
runs:
- binary: /bin/app
  argv: [/bin/app, --flag]
  workingdir: /home/user
  uid: 1000
  gid: 1000
packages: []
"#;

// =============================================================================
// Dependency listers
// =============================================================================

/// Returns a fixed dependency list.
pub struct StubLister(pub Vec<PathBuf>);

impl DependencyLister for StubLister {
    fn name(&self) -> &str {
        "stub"
    }

    fn list_dependencies(&self, _binary: &Path) -> anyhow::Result<Vec<PathBuf>> {
        Ok(self.0.clone())
    }
}

/// Fails like a dependency tool exiting non-zero.
pub struct FailingLister;

impl DependencyLister for FailingLister {
    fn name(&self) -> &str {
        "failing"
    }

    fn list_dependencies(&self, binary: &Path) -> anyhow::Result<Vec<PathBuf>> {
        Err(ChrootError::DependencyResolution {
            interpreter: binary.to_path_buf(),
            reason: "exit status 1".to_string(),
        }
        .into())
    }
}

// =============================================================================
// Filesystem fixtures and assertions
// =============================================================================

/// Create a mock executable file.
pub fn create_mock_binary(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir for binary");
    }
    fs::write(path, "#!/bin/sh\necho mock\n").expect("Failed to create mock binary");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("Failed to set permissions");
}

/// Assert that a symlink exists and points to the expected target.
pub fn assert_symlink(path: &Path, expected_target: &str) {
    assert!(
        path.is_symlink(),
        "Expected symlink at {}, but it's not a symlink",
        path.display()
    );
    let target = fs::read_link(path).expect("Failed to read symlink");
    assert_eq!(
        target.to_string_lossy(),
        expected_target,
        "Symlink {} points to wrong target",
        path.display()
    );
}

pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    assert!(
        content.contains(expected),
        "File {} does not contain '{}'",
        path.display(),
        expected
    );
}

pub fn assert_dir_exists(path: &Path) {
    assert!(path.is_dir(), "Expected directory at {}", path.display());
}

pub fn assert_mode(path: &Path, expected: u32) {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::symlink_metadata(path)
        .unwrap_or_else(|e| panic!("Failed to stat {}: {}", path.display(), e))
        .permissions()
        .mode();
    assert_eq!(
        mode & 0o7777,
        expected,
        "Wrong mode on {}: {:o}",
        path.display(),
        mode & 0o7777
    );
}

//! Installing the command interpreter and its shared libraries.
//!
//! Every replayed command runs through the interpreter (`/bin/sh` by
//! default), so a root without it is unusable. Unlike the other stages,
//! failure here is fatal.
//!
//! Dependency listing sits behind [`DependencyLister`]. [`Ldd`] asks the
//! host dynamic linker; [`Readelf`] reads ELF headers and works where `ldd`
//! is unavailable or untrusted.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::host::install_with_links;
use crate::common::{ensure_parent_exists, exists_no_follow, resolve_in_root};
use crate::error::{ChrootError, Warning};
use crate::process::Cmd;

/// Interpreter used when none is configured.
pub const DEFAULT_INTERPRETER: &str = "/bin/sh";

/// Host directories searched for `NEEDED` libraries by [`Readelf`].
pub const HOST_LIB_DIRS: &[&str] = &[
    "/lib64",
    "/usr/lib64",
    "/lib",
    "/usr/lib",
    "/lib/x86_64-linux-gnu",
    "/usr/lib/x86_64-linux-gnu",
    "/lib/aarch64-linux-gnu",
    "/usr/lib/aarch64-linux-gnu",
];

/// Lists the shared objects a binary needs at run time.
pub trait DependencyLister {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Absolute host paths of the binary's dependencies.
    ///
    /// Entries that do not exist on the host (e.g. the vDSO) may be returned;
    /// callers skip them.
    fn list_dependencies(&self, binary: &Path) -> Result<Vec<PathBuf>>;
}

fn resolution_failure(binary: &Path, err: anyhow::Error) -> anyhow::Error {
    ChrootError::DependencyResolution {
        interpreter: binary.to_path_buf(),
        reason: format!("{:#}", err),
    }
    .into()
}

// =============================================================================
// ldd
// =============================================================================

/// Matches `\t[name => ]path (0xaddress)`.
const LDD_LINE_PATTERN: &str = r"^\t(?:[^ ]+ => )?([^ ]+) \([x0-9a-z]+\)$";

struct LddLineParser(Regex);

impl LddLineParser {
    fn new() -> Result<Self> {
        Ok(Self(Regex::new(LDD_LINE_PATTERN).context("Invalid ldd line pattern")?))
    }

    fn parse(&self, line: &str) -> Option<PathBuf> {
        self.0
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| PathBuf::from(m.as_str()))
    }
}

/// Parse complete `ldd` output. Lines that don't match are ignored.
///
/// Example ldd output:
/// ```text
///         linux-vdso.so.1 (0x00007ffee9bfe000)
///         libc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x00007f1234000000)
///         /lib64/ld-linux-x86-64.so.2 (0x00007f1234500000)
/// ```
pub fn parse_ldd_output(output: &str) -> Result<Vec<PathBuf>> {
    let parser = LddLineParser::new()?;
    Ok(output.lines().filter_map(|l| parser.parse(l)).collect())
}

/// Dependency listing through the host's `ldd`.
#[derive(Debug, Clone)]
pub struct Ldd {
    program: String,
}

impl Default for Ldd {
    fn default() -> Self {
        Self::new("ldd")
    }
}

impl Ldd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DependencyLister for Ldd {
    fn name(&self) -> &str {
        "ldd"
    }

    fn list_dependencies(&self, binary: &Path) -> Result<Vec<PathBuf>> {
        let parser = LddLineParser::new()?;
        let mut deps = Vec::new();
        Cmd::new(&self.program)
            .arg_path(binary)
            .error_msg(format!("'{} {}' failed", self.program, binary.display()))
            .stream_stdout(|line| {
                if let Some(path) = parser.parse(line) {
                    deps.push(path);
                }
                Ok(())
            })
            .map_err(|e| resolution_failure(binary, e))?;
        Ok(deps)
    }
}

// =============================================================================
// readelf
// =============================================================================

/// Dynamic-linking facts read from one ELF file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ElfDeps {
    /// Program interpreter (the dynamic loader), if any.
    pub interpreter: Option<PathBuf>,
    /// `NEEDED` library names, in order.
    pub needed: Vec<String>,
}

/// Parse `readelf -d -l` output.
///
/// Example readelf output:
/// ```text
///       [Requesting program interpreter: /lib64/ld-linux-x86-64.so.2]
///  0x0000000000000001 (NEEDED)             Shared library: [libtinfo.so.6]
///  0x0000000000000001 (NEEDED)             Shared library: [libc.so.6]
/// ```
pub fn parse_readelf_output(output: &str) -> ElfDeps {
    let mut deps = ElfDeps::default();

    for line in output.lines() {
        if let Some(rest) = line.trim().strip_prefix("[Requesting program interpreter: ") {
            if let Some(path) = rest.strip_suffix(']') {
                deps.interpreter = Some(PathBuf::from(path));
            }
        } else if line.contains("(NEEDED)") && line.contains("Shared library:") {
            if let (Some(start), Some(end)) = (line.find('['), line.rfind(']')) {
                if start < end {
                    deps.needed.push(line[start + 1..end].to_string());
                }
            }
        }
    }

    deps
}

/// Find a library by name in the given host directories.
pub fn find_library(search_dirs: &[PathBuf], lib_name: &str) -> Option<PathBuf> {
    search_dirs
        .iter()
        .map(|dir| dir.join(lib_name))
        .find(|p| p.exists())
}

/// Dependency listing by reading ELF headers with `readelf`.
#[derive(Debug, Clone)]
pub struct Readelf {
    program: String,
    search_dirs: Vec<PathBuf>,
}

impl Default for Readelf {
    fn default() -> Self {
        Self::new("readelf")
    }
}

impl Readelf {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            search_dirs: HOST_LIB_DIRS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Replace the library search directories.
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Libraries are read with `allow_fail`: a file readelf can't parse
    /// just contributes nothing.
    fn read(&self, path: &Path, strict: bool) -> Result<ElfDeps> {
        let mut cmd = Cmd::new(&self.program).args(["-d", "-l", "-W"]).arg_path(path);
        if !strict {
            cmd = cmd.allow_fail();
        }
        let result = cmd.run()?;
        Ok(parse_readelf_output(&result.stdout))
    }
}

impl DependencyLister for Readelf {
    fn name(&self) -> &str {
        "readelf"
    }

    /// Transitive closure: the binary's loader and `NEEDED` entries, then
    /// the `NEEDED` entries of every library found.
    fn list_dependencies(&self, binary: &Path) -> Result<Vec<PathBuf>> {
        let root_deps = self.read(binary, true).map_err(|e| resolution_failure(binary, e))?;

        let mut found = Vec::new();
        if let Some(loader) = root_deps.interpreter.clone() {
            found.push(loader);
        }

        let mut seen = HashSet::new();
        let mut to_process = vec![root_deps];
        while let Some(deps) = to_process.pop() {
            for lib_name in deps.needed {
                if !seen.insert(lib_name.clone()) {
                    continue;
                }
                let Some(lib_path) = find_library(&self.search_dirs, &lib_name) else {
                    debug!("{} not found in host library directories", lib_name);
                    continue;
                };
                match self.read(&lib_path, false) {
                    Ok(lib_deps) => to_process.push(lib_deps),
                    Err(e) => debug!("readelf failed on {}: {:#}", lib_path.display(), e),
                }
                found.push(lib_path);
            }
        }

        Ok(found)
    }
}

// =============================================================================
// Installation
// =============================================================================

/// Copy `interpreter` and its dependency closure from the host into `root`.
///
/// Dependencies missing on the host are skipped. Returns the number of
/// entries copied. Fails if listing fails or if the interpreter does not
/// resolve to a file inside the root afterwards.
pub fn install_interpreter(
    root: &Path,
    interpreter: &Path,
    lister: &dyn DependencyLister,
    warnings: &mut Vec<Warning>,
) -> Result<usize> {
    let deps = lister.list_dependencies(interpreter)?;
    info!(
        "{} lists {} dependencies for {}",
        lister.name(),
        deps.len(),
        interpreter.display()
    );

    let mut copied = 0;
    for dep in &deps {
        if !dep.is_absolute() || !exists_no_follow(dep) {
            debug!("skipping {}: not on host", dep.display());
            continue;
        }
        let (n, _) = install_with_links(root, dep, warnings)?;
        copied += n;
    }

    let (n, missing) = install_with_links(root, interpreter, warnings)?;
    copied += n;
    if let Some(path) = missing.first() {
        return Err(ChrootError::DependencyResolution {
            interpreter: interpreter.to_path_buf(),
            reason: format!("{} does not exist on this host", path.display()),
        }
        .into());
    }

    // The chain lands elsewhere when the root already has a real directory
    // where the host has a symlink (e.g. `/bin` vs `/bin -> usr/bin`).
    let inside = resolve_in_root(root, interpreter).map_err(|e| resolution_failure(interpreter, e))?;
    if !exists_no_follow(&inside) {
        ensure_parent_exists(&inside)?;
        fs::copy(interpreter, &inside).with_context(|| {
            format!("Failed to copy {} to {}", interpreter.display(), inside.display())
        })?;
        copied += 1;
    }
    if !inside.is_file() {
        return Err(ChrootError::DependencyResolution {
            interpreter: interpreter.to_path_buf(),
            reason: format!("{} is not a file after copying", inside.display()),
        }
        .into());
    }

    Ok(copied)
}

//! Rebuilding a chroot-able root filesystem from a pack.
//!
//! Stages run in order, each over the same target root:
//! 1. validate and extract the data subtree ([`crate::pack::extract`])
//! 2. copy files of unpacked packages from this host ([`host`])
//! 3. install the interpreter and its libraries ([`interpreter`])
//! 4. recreate recorded working directories ([`workdirs`])
//! 5. write the replay script ([`script`])
//!
//! Any error aborts the run and leaves the partial target in place.
//! Recoverable problems are collected as [`Warning`]s in the report.

pub mod context;
pub mod host;
pub mod interpreter;
pub mod links;
pub mod script;
pub mod workdirs;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use context::ChrootContext;
pub use interpreter::{install_interpreter, DependencyLister, Ldd, Readelf};
pub use links::find_all_links;
pub use script::{write_script, SCRIPT_NAME};

use crate::config::Config;
use crate::error::Warning;
use crate::pack::{extract_data, validate_members, Pack};
use crate::timing::Timer;

/// Log a warning and keep it for the report.
pub(crate) fn record(warnings: &mut Vec<Warning>, warning: Warning) {
    warn!("{}", warning);
    warnings.push(warning);
}

/// What a reconstruction produced.
#[derive(Debug, Clone)]
pub struct ChrootReport {
    pub target: PathBuf,
    pub root: PathBuf,
    pub script: PathBuf,
    /// Entries written from the pack's data subtree.
    pub extracted: usize,
    /// Entries copied from this host for unpacked packages.
    pub host_copied: usize,
    /// Entries copied for the interpreter and its libraries.
    pub interpreter_copied: usize,
    pub workdirs_created: usize,
    pub warnings: Vec<Warning>,
}

/// Rebuild `pack` into `target` using the configured dependency tool.
pub fn create_chroot(pack_path: &Path, target: &Path, config: &Config) -> Result<ChrootReport> {
    let lister = config.dependency_lister();
    create_chroot_with(pack_path, target, config, lister.as_ref())
}

/// Rebuild `pack` into `target`, listing interpreter dependencies with `lister`.
///
/// `target` must not exist. Nothing is written before the pack has been
/// opened, its configuration parsed and every member validated.
pub fn create_chroot_with(
    pack_path: &Path,
    target: &Path,
    config: &Config,
    lister: &dyn DependencyLister,
) -> Result<ChrootReport> {
    let ctx = ChrootContext::new(target)?;
    let pack = Pack::open(pack_path)?;
    let pack_config = pack.load_config()?;
    validate_members(&pack)?;

    ctx.create_dirs()?;
    let mut warnings = Vec::new();

    let timer = Timer::start("extract");
    let summary = extract_data(&pack, &ctx.root)?;
    timer.finish();
    info!("extracted {} entries into {}", summary.total(), ctx.root.display());

    let timer = Timer::start("host files");
    let host_copied = host::copy_unpacked_packages(&ctx.root, &pack_config, &mut warnings)?;
    timer.finish();

    let timer = Timer::start("interpreter");
    let interpreter_copied =
        install_interpreter(&ctx.root, &config.interpreter, lister, &mut warnings)?;
    timer.finish();

    let timer = Timer::start("working directories");
    let workdirs_created = workdirs::reconcile_working_directories(&pack, &ctx.root, &mut warnings);
    timer.finish();

    let script = write_script(
        &ctx.script_path(),
        &ctx.root,
        &pack_config.runs,
        &config.interpreter,
    )?;
    info!(
        "wrote {} run(s) to {}",
        pack_config.runs.len(),
        script.display()
    );

    Ok(ChrootReport {
        target: ctx.target,
        root: ctx.root,
        script,
        extracted: summary.total(),
        host_copied,
        interpreter_copied,
        workdirs_created,
        warnings,
    })
}

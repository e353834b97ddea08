//! Show command - displays information.

use anyhow::Result;
use std::path::PathBuf;

use packroot::chroot::script::run_command;
use packroot::pack::{list_working_directories, Pack};
use packroot::Config;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show recorded runs and their replay commands
    Runs { pack: PathBuf },
    /// Show recorded packages
    Packages { pack: PathBuf },
    /// Show recorded working directories
    Workdirs { pack: PathBuf },
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => {
            config.print();
        }
        ShowTarget::Runs { pack } => {
            let pack_config = Pack::open(&pack)?.load_config()?;
            if pack_config.runs.is_empty() {
                println!("No runs recorded.");
            }
            for (i, run) in pack_config.runs.iter().enumerate() {
                println!("Run {}:", i);
                println!("  binary:   {}", run.binary.display());
                println!("  user:     {}", run.userspec());
                println!("  command:  {}", run_command(run)?);
            }
        }
        ShowTarget::Packages { pack } => {
            let pack_config = Pack::open(&pack)?.load_config()?;
            if pack_config.packages.is_empty() {
                println!("No packages recorded.");
            }
            for package in &pack_config.packages {
                let origin = if package.packfiles { "packed" } else { "host" };
                println!(
                    "  {:<30} {:<16} {:>6} files  [{}]",
                    package.name,
                    package.version.as_deref().unwrap_or("-"),
                    package.files.len(),
                    origin
                );
            }
            if !pack_config.other_files.is_empty() {
                println!("  ({} files outside any package)", pack_config.other_files.len());
            }
        }
        ShowTarget::Workdirs { pack } => {
            let pack = Pack::open(&pack)?;
            match list_working_directories(&pack)? {
                Some(dirs) => {
                    for dir in dirs {
                        println!("  {}", dir.display());
                    }
                }
                None => println!("Pack has no trace store."),
            }
        }
    }
    Ok(())
}

//! packroot - rebuild a traced experiment's root filesystem from its pack.
//!
//! Unpacks a pack into `<target>/root`, fills in what the pack left out
//! (host package files, the interpreter, empty working directories) and
//! writes `<target>/script.sh` to replay the recorded runs under chroot.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use packroot::Config;

#[derive(Parser)]
#[command(name = "packroot")]
#[command(about = "Rebuild a chroot environment from a captured pack")]
#[command(
    after_help = "QUICK START:\n  packroot chroot exp.rpz exp   Rebuild exp/root and exp/script.sh\n  sudo sh exp/script.sh         Replay the recorded runs\n  packroot show runs exp.rpz    Inspect the recorded runs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the pack's root filesystem and replay script in TARGET
    Chroot {
        /// Pack file to unpack
        pack: PathBuf,
        /// Directory to create (must not exist)
        target: PathBuf,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show recorded runs and the command each replays
    Runs { pack: PathBuf },
    /// Show recorded packages and whether their files were packed
    Packages { pack: PathBuf },
    /// Show working directories recorded in the trace store
    Workdirs { pack: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = Config::load();

    match cli.command {
        Commands::Chroot { pack, target } => {
            commands::cmd_chroot(&pack, &target, &config)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Runs { pack } => commands::show::ShowTarget::Runs { pack },
                ShowTarget::Packages { pack } => commands::show::ShowTarget::Packages { pack },
                ShowTarget::Workdirs { pack } => commands::show::ShowTarget::Workdirs { pack },
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}

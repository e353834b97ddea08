//! Chroot command - rebuilds a root filesystem from a pack.

use anyhow::Result;
use std::path::Path;
use walkdir::WalkDir;

use packroot::{create_chroot, ChrootReport, Config};

/// Execute the chroot command.
pub fn cmd_chroot(pack: &Path, target: &Path, config: &Config) -> Result<()> {
    println!("Unpacking {} into {}...", pack.display(), target.display());
    let report = create_chroot(pack, target, config)?;
    print_summary(&report);
    Ok(())
}

fn count_entries(root: &Path) -> usize {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .count()
}

fn print_summary(report: &ChrootReport) {
    println!();
    println!("Root: {}", report.root.display());
    println!("  From pack:          {}", report.extracted);
    println!("  From host packages: {}", report.host_copied);
    println!("  Interpreter:        {}", report.interpreter_copied);
    println!("  Working dirs:       {}", report.workdirs_created);
    println!("  Total entries:      {}", count_entries(&report.root));

    if !report.warnings.is_empty() {
        println!();
        println!("{} warning(s):", report.warnings.len());
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }

    println!();
    println!("Experiment set up, run {} to start", report.script.display());
}

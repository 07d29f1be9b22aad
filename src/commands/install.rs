// src/commands/install.rs
//! The `install` subcommand

use super::{resolve_catalog, resolve_layout};
use crate::cache::InstallCache;
use crate::catalog::{options_from_flags, JsonCatalog, ProcessRunner, StagedBottles, StandardCleaner};
use crate::config::InstallFlags;
use crate::install::{InstallOutcome, Installer};
use crate::lock::LockManager;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

/// Arguments for one `cellar install` invocation
#[allow(clippy::too_many_arguments)]
pub fn cmd_install(
    formula: &str,
    prefix: Option<PathBuf>,
    catalog: Option<PathBuf>,
    with: Vec<String>,
    without: Vec<String>,
    head: bool,
    flags: InstallFlags,
) -> Result<()> {
    let layout = resolve_layout(prefix)?;
    let store = JsonCatalog::new(resolve_catalog(&layout, catalog));
    let bottles = StagedBottles::new(layout.bottles.clone());
    let builder = ProcessRunner;
    let cleaner = StandardCleaner;
    let locks = LockManager::new(layout.locks.clone());
    let cache = InstallCache::new();

    info!("installing {formula} into {}", layout.prefix.display());
    if flags.verbose {
        println!("Installing {formula} into {}", layout.prefix.display());
    }

    let mut installer = Installer::new(
        &layout, flags, &store, &bottles, &builder, &locks, &cache,
    )
    .with_cleaner(&cleaner);

    let options = options_from_flags(&with, &without, head);
    let outcome = installer
        .install(formula, options)
        .with_context(|| format!("failed to install {formula}"))?;

    match outcome {
        InstallOutcome::Installed {
            keg,
            linked,
            poured,
            warnings,
        } => {
            let how = if poured { "poured bottle" } else { "built from source" };
            println!("Installed {} ({how})", keg.spec());
            if linked {
                println!("  Linked into {}", layout.prefix.display());
            }
            for warning in warnings {
                println!("  Warning: {warning}");
            }
        }
        InstallOutcome::AlreadyInstalled { keg } => {
            println!("{} is already installed", keg.spec());
        }
        InstallOutcome::DependenciesOnly { installed } => {
            println!("Installed dependencies of {formula} ({installed} in plan)");
        }
        InstallOutcome::DryRun { plan } => {
            if plan.is_empty() {
                println!("Would install {formula} (no dependencies)");
            } else {
                println!("Would install, in order:");
                for name in &plan {
                    println!("  {name}");
                }
                println!("  {formula}");
            }
        }
    }
    Ok(())
}

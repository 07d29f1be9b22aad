// src/commands/uninstall.rs
//! The `uninstall` subcommand

use super::resolve_layout;
use crate::keg::Keg;
use crate::link::Linker;
use crate::lock::LockManager;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Remove one keg: unlink it, drop its opt alias, delete it and its rack
/// when empty
pub fn cmd_uninstall(formula: &str, version: Option<String>, prefix: Option<PathBuf>) -> Result<()> {
    let layout = resolve_layout(prefix)?;
    let locks = LockManager::new(layout.locks.clone());
    let _token = locks
        .acquire_all([formula])
        .with_context(|| format!("cannot uninstall {formula}"))?;

    let versions = Keg::installed_versions(&layout, formula)?;
    if versions.is_empty() {
        bail!("{formula} is not installed");
    }
    let version = match version {
        Some(version) => {
            if !versions.contains(&version) {
                bail!(
                    "{formula} {version} is not installed (installed: {})",
                    versions.join(", ")
                );
            }
            version
        }
        None => {
            if versions.len() > 1 {
                bail!(
                    "{formula} has multiple versions installed ({}); pass --version",
                    versions.join(", ")
                );
            }
            versions[0].clone()
        }
    };

    let keg = Keg::new(&layout, formula, &version);
    let linker = Linker::new(&layout);
    let removed = linker
        .unlink(&keg)
        .with_context(|| format!("failed to unlink {}", keg.spec()))?;
    linker.unoptlink(&keg)?;
    keg.remove()
        .with_context(|| format!("failed to remove {}", keg.spec()))?;

    println!("Uninstalled {} ({removed} links removed)", keg.spec());
    Ok(())
}

// src/commands/link.rs
//! The `link` and `unlink` subcommands
//!
//! `link` is also the recovery path after an install finished with a link
//! conflict: the keg stays installed, the conflict is fixed (or --overwrite
//! accepted), and linking is retried without rebuilding anything.

use super::resolve_layout;
use crate::keg::Keg;
use crate::link::Linker;
use crate::lock::LockManager;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub fn cmd_link(
    formula: &str,
    version: Option<String>,
    overwrite: bool,
    prefix: Option<PathBuf>,
) -> Result<()> {
    let layout = resolve_layout(prefix)?;
    let locks = LockManager::new(layout.locks.clone());
    let _token = locks
        .acquire_all([formula])
        .with_context(|| format!("cannot link {formula}"))?;

    let versions = Keg::installed_versions(&layout, formula)?;
    if versions.is_empty() {
        bail!("{formula} is not installed");
    }
    let version = match version {
        Some(version) if versions.contains(&version) => version,
        Some(version) => bail!(
            "{formula} {version} is not installed (installed: {})",
            versions.join(", ")
        ),
        None if versions.len() == 1 => versions[0].clone(),
        None => bail!(
            "{formula} has multiple versions installed ({}); pass --version",
            versions.join(", ")
        ),
    };

    let keg = Keg::new(&layout, formula, &version);
    let linker = Linker::new(&layout);
    linker.optlink(&keg)?;
    let report = linker.link(&keg, overwrite)?;
    println!(
        "Linked {} ({} symlinks, {} already present)",
        keg.spec(),
        report.created,
        report.already
    );
    Ok(())
}

pub fn cmd_unlink(formula: &str, prefix: Option<PathBuf>) -> Result<()> {
    let layout = resolve_layout(prefix)?;
    let locks = LockManager::new(layout.locks.clone());
    let _token = locks
        .acquire_all([formula])
        .with_context(|| format!("cannot unlink {formula}"))?;

    let versions = Keg::installed_versions(&layout, formula)?;
    if versions.is_empty() {
        bail!("{formula} is not installed");
    }

    let linker = Linker::new(&layout);
    let mut removed = 0;
    for version in &versions {
        let keg = Keg::new(&layout, formula, version);
        removed += linker.unlink(&keg)?;
    }
    println!("Unlinked {formula} ({removed} symlinks removed)");
    Ok(())
}

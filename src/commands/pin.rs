// src/commands/pin.rs
//! The `pin` and `unpin` subcommands
//!
//! A pin records the formula's current keg in the pin registry. An install
//! whose plan would require a different version of a pinned formula is
//! refused structurally before any mutation.

use super::resolve_layout;
use crate::keg::Keg;
use crate::link::resolve_symlink;
use anyhow::{bail, Result};
use std::fs;
use std::path::PathBuf;

pub fn cmd_pin(formula: &str, prefix: Option<PathBuf>) -> Result<()> {
    let layout = resolve_layout(prefix)?;
    let versions = Keg::installed_versions(&layout, formula)?;
    let Some(version) = versions.last() else {
        bail!("{formula} is not installed, nothing to pin");
    };
    if versions.len() > 1 {
        bail!(
            "{formula} has multiple versions installed ({}); uninstall the extras first",
            versions.join(", ")
        );
    }

    let keg = Keg::new(&layout, formula, version);
    let pin = layout.pin(formula);
    if fs::symlink_metadata(&pin).is_ok() {
        fs::remove_file(&pin)?;
    }
    std::os::unix::fs::symlink(keg.path(), &pin)?;
    println!("Pinned {}", keg.spec());
    Ok(())
}

pub fn cmd_unpin(formula: &str, prefix: Option<PathBuf>) -> Result<()> {
    let layout = resolve_layout(prefix)?;
    let pin = layout.pin(formula);
    if resolve_symlink(&pin).is_none() {
        bail!("{formula} is not pinned");
    }
    fs::remove_file(&pin)?;
    println!("Unpinned {formula}");
    Ok(())
}

// src/commands/list.rs
//! The `list` subcommand

use super::resolve_layout;
use crate::keg::Keg;
use anyhow::{bail, Result};
use std::path::PathBuf;

/// List installed kegs; `*` marks the linked version, `pinned` a pin
pub fn cmd_list(formula: Option<String>, prefix: Option<PathBuf>) -> Result<()> {
    let layout = resolve_layout(prefix)?;

    let kegs = match &formula {
        Some(name) => {
            let versions = Keg::installed_versions(&layout, name)?;
            if versions.is_empty() {
                bail!("{name} is not installed");
            }
            versions
                .into_iter()
                .map(|v| Keg::new(&layout, name, v))
                .collect()
        }
        None => Keg::all_installed(&layout)?,
    };

    if kegs.is_empty() {
        println!("No kegs installed under {}", layout.cellar.display());
        return Ok(());
    }

    for keg in kegs {
        let linked = if keg.linked(&layout) { " *" } else { "" };
        let pinned = if crate::link::resolve_symlink(&layout.pin(keg.name()))
            .is_some_and(|t| t == keg.path())
        {
            " (pinned)"
        } else {
            ""
        };
        println!("{}{linked}{pinned}", keg.spec());
    }
    Ok(())
}

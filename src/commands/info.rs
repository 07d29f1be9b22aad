// src/commands/info.rs
//! The `info` subcommand

use super::{resolve_catalog, resolve_layout};
use crate::cache::InstallCache;
use crate::catalog::JsonCatalog;
use crate::formula::FormulaStore;
use crate::keg::Keg;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Show catalog metadata and install state for one formula
pub fn cmd_info(formula: &str, prefix: Option<PathBuf>, catalog: Option<PathBuf>) -> Result<()> {
    let layout = resolve_layout(prefix)?;
    let store = JsonCatalog::new(resolve_catalog(&layout, catalog));
    let cache = InstallCache::new();

    let f = store
        .find(formula)
        .with_context(|| format!("no catalog entry for {formula}"))?;

    println!("{}: {}", f.name, f.version);
    if f.revision > 0 {
        println!("  Revision: {}", f.revision);
    }
    if let Some(bottle) = &f.bottle {
        println!("  Bottle platforms: {}", bottle.platforms.join(", "));
    } else {
        println!("  No bottle published (source-only)");
    }
    if !f.deps.is_empty() {
        println!("  Dependencies:");
        for dep in &f.deps {
            println!("    {} ({})", dep.name, dep.tags);
        }
    }
    if !f.options.is_empty() {
        println!("  Options:");
        for opt in &f.options {
            println!("    --{}: {}", opt.name, opt.description);
        }
    }

    let versions = Keg::installed_versions(&layout, formula)?;
    if versions.is_empty() {
        println!("  Not installed");
        return Ok(());
    }
    for version in versions {
        let keg = Keg::new(&layout, formula, &version);
        let receipt = cache.receipt(&keg)?;
        let state = if keg.linked(&layout) {
            "linked"
        } else if keg.opt_linked(&layout) {
            "opt-linked only"
        } else {
            "unlinked"
        };
        let how = if receipt.poured_from_bottle {
            "poured from bottle".to_string()
        } else {
            format!("built from source in {}s", receipt.build_time_seconds)
        };
        println!("  {} ({state}, {how})", keg.spec());
        if receipt.installed_as_dependency {
            println!("    Installed as a dependency");
        }
        if !receipt.runtime_dependencies.is_empty() {
            let names: Vec<String> = receipt
                .runtime_dependencies
                .iter()
                .map(|d| format!("{} {}", d.name, d.version))
                .collect();
            println!("    Runtime dependencies: {}", names.join(", "));
        }
    }
    Ok(())
}

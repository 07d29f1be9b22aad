// src/commands/mod.rs

//! Command handlers for the cellar CLI
//!
//! Each subcommand has a `cmd_*` function taking plain arguments from the
//! parsed CLI; the library does the work, these functions report it.

mod info;
mod install;
mod link;
mod list;
mod pin;
mod uninstall;

pub use info::cmd_info;
pub use install::cmd_install;
pub use link::{cmd_link, cmd_unlink};
pub use list::cmd_list;
pub use pin::{cmd_pin, cmd_unpin};
pub use uninstall::cmd_uninstall;

use crate::config::Layout;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Resolve the layout from an optional `--prefix` argument and make sure
/// its state directories exist
pub(crate) fn resolve_layout(prefix: Option<PathBuf>) -> Result<Layout> {
    let layout = match prefix {
        Some(prefix) => Layout::new(prefix),
        None => Layout::default_user(),
    };
    layout
        .ensure_dirs()
        .with_context(|| format!("failed to prepare prefix {}", layout.prefix.display()))?;
    Ok(layout)
}

/// The catalog directory: `--catalog` or `<prefix>/catalog`
pub(crate) fn resolve_catalog(layout: &Layout, catalog: Option<PathBuf>) -> PathBuf {
    catalog.unwrap_or_else(|| layout.prefix.join("catalog"))
}

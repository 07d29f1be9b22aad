// src/cli.rs

//! CLI definitions for the cellar package installer
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cellar")]
#[command(author = "Cellar Project")]
#[command(version)]
#[command(about = "Keg-based package installer with bottle pouring and conflict-aware linking", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a formula and everything it depends on
    Install {
        /// Formula name
        formula: String,

        /// Shared prefix directory (defaults to the user data directory)
        #[arg(short, long)]
        prefix: Option<PathBuf>,

        /// Formula catalog directory (defaults to <prefix>/catalog)
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Enable an optional feature (repeatable)
        #[arg(long = "with", value_name = "NAME")]
        with: Vec<String>,

        /// Disable a recommended feature (repeatable)
        #[arg(long = "without", value_name = "NAME")]
        without: Vec<String>,

        /// Install the upstream development head instead of stable
        #[arg(long)]
        head: bool,

        /// Build from source even when a bottle is available
        #[arg(short = 's', long)]
        build_from_source: bool,

        /// Fail instead of building from source when the bottle is unusable
        #[arg(long)]
        force_bottle: bool,

        /// Install the formula without its dependencies
        #[arg(long)]
        ignore_deps: bool,

        /// Install only the dependencies, not the formula itself
        #[arg(long)]
        only_deps: bool,

        /// Also install the formula's test-only dependencies
        #[arg(long)]
        include_test: bool,

        /// Displace conflicting files after backing them up
        #[arg(long)]
        overwrite: bool,

        /// Show the computed plan without making changes
        #[arg(long)]
        dry_run: bool,

        /// Report each phase as it runs
        #[arg(short, long)]
        verbose: bool,
    },

    /// Remove an installed keg and its links
    Uninstall {
        /// Formula name
        formula: String,

        /// Specific version to remove (required if several are installed)
        #[arg(long)]
        version: Option<String>,

        /// Shared prefix directory (defaults to the user data directory)
        #[arg(short, long)]
        prefix: Option<PathBuf>,
    },

    /// Link an installed keg into the shared prefix
    Link {
        /// Formula name
        formula: String,

        /// Specific version to link (defaults to the only installed one)
        #[arg(long)]
        version: Option<String>,

        /// Displace conflicting files after backing them up
        #[arg(long)]
        overwrite: bool,

        /// Shared prefix directory (defaults to the user data directory)
        #[arg(short, long)]
        prefix: Option<PathBuf>,
    },

    /// Remove a keg's links from the shared prefix
    Unlink {
        /// Formula name
        formula: String,

        /// Shared prefix directory (defaults to the user data directory)
        #[arg(short, long)]
        prefix: Option<PathBuf>,
    },

    /// Pin a formula to its currently installed version
    Pin {
        /// Formula name
        formula: String,

        /// Shared prefix directory (defaults to the user data directory)
        #[arg(short, long)]
        prefix: Option<PathBuf>,
    },

    /// Remove a formula's pin
    Unpin {
        /// Formula name
        formula: String,

        /// Shared prefix directory (defaults to the user data directory)
        #[arg(short, long)]
        prefix: Option<PathBuf>,
    },

    /// List installed kegs
    List {
        /// Show only this formula's versions
        formula: Option<String>,

        /// Shared prefix directory (defaults to the user data directory)
        #[arg(short, long)]
        prefix: Option<PathBuf>,
    },

    /// Show catalog and install information for a formula
    Info {
        /// Formula name
        formula: String,

        /// Shared prefix directory (defaults to the user data directory)
        #[arg(short, long)]
        prefix: Option<PathBuf>,

        /// Formula catalog directory (defaults to <prefix>/catalog)
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

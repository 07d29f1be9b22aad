// src/config.rs

//! Filesystem layout and install flags
//!
//! [`Layout`] derives every directory the orchestrator touches from a single
//! prefix, mirroring how installed kegs are exposed:
//!
//! ```text
//! <prefix>/
//!   bin/ etc/ include/ lib/ libexec/ sbin/ share/   shared link farm
//!   cellar/<name>/<version>/                        one keg per version
//!   opt/<name>                                      version-independent alias
//!   var/cellar/linked/<name>                        linked-keg registry
//!   var/cellar/locks/<name>.lock                    per-formula locks
//!   var/cellar/backups/<timestamp>/                 displaced-file backups
//!   var/cellar/logs/<name>/                         retained build logs
//!   var/cellar/pinned/<name>                        pin registry
//! ```
//!
//! [`InstallFlags`] is the single configuration record for one orchestration;
//! it replaces ad-hoc boolean plumbing through the install path.

use std::path::{Path, PathBuf};

/// Top-level category directories the linker mirrors into the shared prefix
pub const LINK_CATEGORIES: &[&str] = &["bin", "etc", "include", "lib", "libexec", "sbin", "share"];

/// All paths used by one cellar installation
#[derive(Debug, Clone)]
pub struct Layout {
    /// Shared prefix holding the link farm
    pub prefix: PathBuf,
    /// Directory of racks; each rack holds one keg per installed version
    pub cellar: PathBuf,
    /// Version-independent alias links
    pub opt: PathBuf,
    /// Registry of which keg is currently linked, one symlink per name
    pub linked: PathBuf,
    /// Per-formula lock files
    pub locks: PathBuf,
    /// Backups of files displaced by overwrite-mode linking
    pub backups: PathBuf,
    /// Retained build logs
    pub logs: PathBuf,
    /// Pin registry
    pub pins: PathBuf,
    /// Where the fetch collaborator stages verified bottles
    pub bottles: PathBuf,
}

impl Layout {
    /// Create a layout rooted at the given prefix
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        let state = prefix.join("var").join("cellar");
        Self {
            cellar: prefix.join("cellar"),
            opt: prefix.join("opt"),
            linked: state.join("linked"),
            locks: state.join("locks"),
            backups: state.join("backups"),
            logs: state.join("logs"),
            pins: state.join("pinned"),
            bottles: state.join("bottles"),
            prefix,
        }
    }

    /// Default layout under the user's data directory, or `./cellar-prefix`
    /// when no home is available
    pub fn default_user() -> Self {
        let prefix = dirs::data_dir()
            .map(|d| d.join("cellar"))
            .unwrap_or_else(|| PathBuf::from("cellar-prefix"));
        Self::new(prefix)
    }

    /// The rack directory for a formula (parent of all its version kegs)
    pub fn rack(&self, name: &str) -> PathBuf {
        self.cellar.join(name)
    }

    /// The opt-link path for a formula
    pub fn opt_link(&self, name: &str) -> PathBuf {
        self.opt.join(name)
    }

    /// The linked-keg registry entry for a formula
    pub fn linked_keg(&self, name: &str) -> PathBuf {
        self.linked.join(name)
    }

    /// The pin registry entry for a formula
    pub fn pin(&self, name: &str) -> PathBuf {
        self.pins.join(name)
    }

    /// Retained build log path for a formula
    pub fn build_log(&self, name: &str) -> PathBuf {
        self.logs.join(name).join("build.log")
    }

    /// Create every state directory the orchestrator expects to exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.cellar,
            &self.opt,
            &self.linked,
            &self.locks,
            &self.backups,
            &self.logs,
            &self.pins,
            &self.bottles,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// True if the path points inside this layout's cellar
    pub fn contains_keg_path(&self, path: &Path) -> bool {
        path.starts_with(&self.cellar)
    }
}

/// Configuration for one installation orchestration
///
/// Constructed once from CLI arguments and threaded through the whole run.
#[derive(Debug, Clone, Default)]
pub struct InstallFlags {
    /// Report each phase as it runs
    pub verbose: bool,
    /// Keep intermediate state for debugging
    pub debug: bool,
    /// Refuse source builds; fail if no usable bottle exists
    pub force_bottle: bool,
    /// Refuse bottles; always build from source
    pub build_from_source: bool,
    /// Install the formula without its dependencies
    pub ignore_deps: bool,
    /// Install only the dependencies, not the formula itself
    pub only_deps: bool,
    /// Follow `:test` edges of the requested formula (one level deep)
    pub include_test: bool,
    /// Displace conflicting link targets after backing them up
    pub overwrite: bool,
    /// Compute and report the plan without mutating anything
    pub dry_run: bool,
    /// Ask before each destructive step
    pub interactive: bool,
}

// src/keg.rs

//! Kegs and racks
//!
//! A keg is the installed file tree for one exact (formula, version,
//! revision): `<cellar>/<name>/<version>`. Its parent directory is the
//! formula's rack. A keg's observable state is linked, opt-linked, or
//! neither; at most one keg per formula is linked at a time, enforced by the
//! single linked-registry symlink per name.

use crate::config::Layout;
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One installed (or installing) version directory of a formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keg {
    name: String,
    version: String,
    path: PathBuf,
}

impl Keg {
    /// The keg for a (name, version) pair under the given layout
    pub fn new(layout: &Layout, name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        let path = layout.rack(&name).join(&version);
        Self {
            name,
            version,
            path,
        }
    }

    /// Reconstruct a keg from a path of the form `<cellar>/<name>/<version>`
    ///
    /// Returns None if the path does not lie inside the layout's cellar.
    pub fn from_path(layout: &Layout, path: &Path) -> Option<Self> {
        let rel = path.strip_prefix(&layout.cellar).ok()?;
        let mut parts = rel.components();
        let name = parts.next()?.as_os_str().to_str()?.to_string();
        let version = parts.next()?.as_os_str().to_str()?.to_string();
        Some(Self {
            path: layout.cellar.join(&name).join(&version),
            name,
            version,
        })
    }

    /// The keg owning the given path, if it lies inside the cellar
    ///
    /// Used by the linker to name the owner of a conflicting symlink target.
    pub fn owner_of(layout: &Layout, path: &Path) -> Option<Self> {
        Self::from_path(layout, path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The rack directory holding every installed version of this formula
    pub fn rack(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    /// Display form `name/version`
    pub fn spec(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// True if the linked-keg registry points at this exact keg
    pub fn linked(&self, layout: &Layout) -> bool {
        resolves_to(&layout.linked_keg(&self.name), &self.path)
    }

    /// True if the opt alias points at this exact keg
    pub fn opt_linked(&self, layout: &Layout) -> bool {
        resolves_to(&layout.opt_link(&self.name), &self.path)
    }

    /// Delete the keg directory, then its rack if now empty
    ///
    /// A failed install must leave no trace: the rack is removed too when
    /// this was its only keg.
    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_dir_all(&self.path)?;
            debug!("removed keg {}", self.spec());
        }
        let rack = self.rack();
        if rack.is_dir() && fs::read_dir(rack)?.next().is_none() {
            fs::remove_dir(rack)?;
            debug!("removed empty rack {}", rack.display());
        }
        Ok(())
    }

    /// All installed kegs under the layout's cellar, sorted by name then
    /// version string
    pub fn all_installed(layout: &Layout) -> Result<Vec<Keg>> {
        let mut kegs = Vec::new();
        if !layout.cellar.is_dir() {
            return Ok(kegs);
        }
        for rack in sorted_dirs(&layout.cellar)? {
            for version_dir in sorted_dirs(&rack)? {
                if let Some(keg) = Keg::from_path(layout, &version_dir) {
                    kegs.push(keg);
                }
            }
        }
        Ok(kegs)
    }

    /// Installed version directory names for one formula
    pub fn installed_versions(layout: &Layout, name: &str) -> Result<Vec<String>> {
        let rack = layout.rack(name);
        if !rack.is_dir() {
            return Ok(Vec::new());
        }
        let mut versions: Vec<String> = sorted_dirs(&rack)?
            .into_iter()
            .filter_map(|p| p.file_name()?.to_str().map(String::from))
            .collect();
        versions.sort();
        Ok(versions)
    }

    /// True if any version of the formula is installed
    pub fn any_installed(layout: &Layout, name: &str) -> bool {
        Self::installed_versions(layout, name)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }
}

/// True if `link` is a symlink resolving to exactly `target`
fn resolves_to(link: &Path, target: &Path) -> bool {
    let Ok(dest) = fs::read_link(link) else {
        return false;
    };
    let resolved = if dest.is_absolute() {
        dest
    } else {
        match link.parent() {
            Some(parent) => crate::link::lexical_normalize(&parent.join(dest)),
            None => return false,
        }
    };
    resolved == target
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

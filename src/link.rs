// src/link.rs

//! Conflict-aware symlink farm for installed kegs
//!
//! Linking mirrors a keg's category subtrees (`bin`, `lib`, `share`, ...)
//! into the shared prefix as relative symlinks. A per-subtree policy table
//! decides, for each path, whether to symlink it, create a real directory
//! and recurse (directories several kegs co-populate, such as locale trees
//! and pkg-config databases), or skip it (generated indices, OS metadata).
//!
//! One `link` call is all-or-nothing: every symlink and directory it creates
//! is recorded and unwound before any error propagates. Conflicts are
//! enumerated in full (the error names every offending path and its owning
//! keg) and never silently overwritten; overwrite mode backs each displaced
//! file into a recovery directory first.

use crate::config::{Layout, LINK_CATEGORIES};
use crate::error::{Error, LinkConflict, Result};
use crate::keg::Keg;
use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directories that several kegs co-populate: created real, recursed into
const MKPATH_PATTERNS: &[&str] = &[
    "etc",
    "etc/**",
    "lib/pkgconfig",
    "lib/cmake",
    "lib/cmake/**",
    "lib/perl5",
    "lib/perl5/**",
    "lib/python*",
    "lib/python*/**",
    "lib/ruby",
    "lib/ruby/**",
    "lib/lua",
    "lib/lua/**",
    "share/aclocal",
    "share/doc",
    "share/info",
    "share/locale",
    "share/locale/**",
    "share/man",
    "share/man/man*",
    "share/mime",
    "share/mime/**",
    "share/bash-completion",
    "share/bash-completion/**",
    "share/zsh",
    "share/zsh/**",
    "share/fish",
    "share/fish/**",
];

/// Paths never linked: generated indices and metadata local to each keg
const SKIP_PATTERNS: &[&str] = &[
    "**/.DS_Store",
    "share/info/dir",
    "lib/charset.alias",
    "**/INSTALL_RECEIPT.json",
];

/// Per-subtree linking policy, evaluated against keg-relative paths
pub struct PolicyTable {
    mkpath: Vec<Pattern>,
    skip: Vec<Pattern>,
}

impl PolicyTable {
    /// The standard policy used for every keg
    pub fn standard() -> Self {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect()
        };
        Self {
            mkpath: compile(MKPATH_PATTERNS),
            skip: compile(SKIP_PATTERNS),
        }
    }

    fn match_options() -> MatchOptions {
        MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        }
    }

    /// Should this directory be created real and recursed into?
    pub fn mkpath(&self, rel: &Path) -> bool {
        let opts = Self::match_options();
        self.mkpath.iter().any(|p| p.matches_path_with(rel, opts))
    }

    /// Should this path be left out of the link farm entirely?
    pub fn skip(&self, rel: &Path) -> bool {
        let opts = Self::match_options();
        self.skip.iter().any(|p| p.matches_path_with(rel, opts))
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Counts from one link operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Symlinks created by this call
    pub created: usize,
    /// Paths already linked into this keg (no-ops)
    pub already: usize,
    /// Paths the policy table skipped
    pub skipped: usize,
}

/// Everything one link call created or displaced, for unwinding
#[derive(Default)]
struct LinkTransaction {
    created_links: Vec<PathBuf>,
    created_dirs: Vec<PathBuf>,
    displaced: Vec<(PathBuf, PathBuf)>,
    backup_dir: Option<PathBuf>,
}

impl LinkTransaction {
    /// Undo every mutation this call made; never raises
    fn unwind(&mut self) {
        for link in self.created_links.drain(..).rev() {
            if let Err(e) = fs::remove_file(&link) {
                warn!("unwind: could not remove {}: {e}", link.display());
            }
        }
        for (original, backup) in self.displaced.drain(..).rev() {
            if let Err(e) = fs::rename(&backup, &original) {
                warn!("unwind: could not restore {}: {e}", original.display());
            }
        }
        for dir in self.created_dirs.drain(..).rev() {
            // Only removes directories left empty
            let _ = fs::remove_dir(&dir);
        }
    }
}

/// Builds and removes the shared-prefix mirror of installed kegs
pub struct Linker<'a> {
    layout: &'a Layout,
    policy: PolicyTable,
}

impl<'a> Linker<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self {
            layout,
            policy: PolicyTable::standard(),
        }
    }

    /// Link a keg into the shared prefix
    ///
    /// On success the linked-keg registry records this keg as the formula's
    /// linked version. On conflict or failure nothing the call created
    /// survives.
    pub fn link(&self, keg: &Keg, overwrite: bool) -> Result<LinkReport> {
        let mut txn = LinkTransaction::default();
        let mut report = LinkReport::default();
        let mut conflicts = Vec::new();

        let walk = self.link_categories(keg, overwrite, &mut txn, &mut report, &mut conflicts);
        match walk {
            Ok(()) if conflicts.is_empty() => {
                if let Err(e) = self.record_linked(keg) {
                    txn.unwind();
                    return Err(e);
                }
                debug!(
                    "linked {}: {} created, {} already, {} skipped",
                    keg.spec(),
                    report.created,
                    report.already,
                    report.skipped
                );
                Ok(report)
            }
            Ok(()) => {
                txn.unwind();
                Err(Error::LinkConflict {
                    keg: keg.spec(),
                    conflicts,
                })
            }
            Err(e) => {
                txn.unwind();
                Err(e)
            }
        }
    }

    fn link_categories(
        &self,
        keg: &Keg,
        overwrite: bool,
        txn: &mut LinkTransaction,
        report: &mut LinkReport,
        conflicts: &mut Vec<LinkConflict>,
    ) -> Result<()> {
        for category in LINK_CATEGORIES {
            let src_root = keg.path().join(category);
            if !src_root.is_dir() {
                continue;
            }
            let dst_root = self.layout.prefix.join(category);
            fs::create_dir_all(&dst_root)?;
            self.link_tree(
                keg,
                &src_root,
                &dst_root,
                Path::new(category),
                overwrite,
                txn,
                report,
                conflicts,
            )?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn link_tree(
        &self,
        keg: &Keg,
        src_dir: &Path,
        dst_dir: &Path,
        rel_dir: &Path,
        overwrite: bool,
        txn: &mut LinkTransaction,
        report: &mut LinkReport,
        conflicts: &mut Vec<LinkConflict>,
    ) -> Result<()> {
        for entry in sorted_entries(src_dir)? {
            let file_name = entry.file_name();
            let src = entry.path();
            let dst = dst_dir.join(&file_name);
            let rel = rel_dir.join(&file_name);

            if self.policy.skip(&rel) {
                report.skipped += 1;
                continue;
            }

            let is_dir = entry.file_type()?.is_dir();
            if is_dir {
                // Real-directory policy, or an existing shared directory
                // another keg already populates. A symlink occupying the
                // destination falls through to conflict handling instead.
                if !is_symlink(&dst) && (self.policy.mkpath(&rel) || dst.is_dir()) {
                    if !dst.is_dir() {
                        fs::create_dir(&dst)?;
                        txn.created_dirs.push(dst.clone());
                    }
                    self.link_tree(
                        keg, &src, &dst, &rel, overwrite, txn, report, conflicts,
                    )?;
                    continue;
                }
            }
            self.link_one(keg, &src, &dst, overwrite, txn, report, conflicts)?;
        }
        Ok(())
    }

    /// Place one symlink, handling whatever already occupies the destination
    fn link_one(
        &self,
        keg: &Keg,
        src: &Path,
        dst: &Path,
        overwrite: bool,
        txn: &mut LinkTransaction,
        report: &mut LinkReport,
        conflicts: &mut Vec<LinkConflict>,
    ) -> Result<()> {
        match fs::symlink_metadata(dst) {
            Ok(meta) if meta.file_type().is_symlink() => {
                if let Some(target) = resolve_symlink(dst) {
                    if target.starts_with(keg.path()) {
                        // Already linked into this keg
                        report.already += 1;
                        return Ok(());
                    }
                    let owner = Keg::owner_of(self.layout, &target).map(|k| k.spec());
                    if overwrite {
                        self.displace(dst, txn)?;
                    } else {
                        conflicts.push(LinkConflict {
                            path: dst.to_path_buf(),
                            owner,
                        });
                        return Ok(());
                    }
                } else if overwrite {
                    // Dangling symlink
                    self.displace(dst, txn)?;
                } else {
                    conflicts.push(LinkConflict {
                        path: dst.to_path_buf(),
                        owner: None,
                    });
                    return Ok(());
                }
            }
            Ok(meta) if meta.is_dir() => {
                // A real directory where a symlink is wanted cannot be
                // displaced safely, even in overwrite mode
                conflicts.push(LinkConflict {
                    path: dst.to_path_buf(),
                    owner: None,
                });
                return Ok(());
            }
            Ok(_) => {
                if overwrite {
                    self.displace(dst, txn)?;
                } else {
                    conflicts.push(LinkConflict {
                        path: dst.to_path_buf(),
                        owner: None,
                    });
                    return Ok(());
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let parent = dst.parent().unwrap_or(Path::new("/"));
        let rel_target = relative_path(parent, src);
        std::os::unix::fs::symlink(&rel_target, dst)?;
        txn.created_links.push(dst.to_path_buf());
        report.created += 1;
        Ok(())
    }

    /// Move whatever occupies `path` into the backup root, preserving its
    /// prefix-relative location
    fn displace(&self, path: &Path, txn: &mut LinkTransaction) -> Result<()> {
        let backup_root = match &txn.backup_dir {
            Some(dir) => dir.clone(),
            None => {
                let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S%.3f");
                let dir = self.layout.backups.join(stamp.to_string());
                fs::create_dir_all(&dir)?;
                txn.backup_dir = Some(dir.clone());
                dir
            }
        };
        let rel = path
            .strip_prefix(&self.layout.prefix)
            .unwrap_or(path)
            .to_path_buf();
        let backup_path = backup_root.join(&rel);
        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(path, &backup_path)?;
        warn!(
            "displaced {} to {}",
            path.display(),
            backup_path.display()
        );
        txn.displaced.push((path.to_path_buf(), backup_path));
        Ok(())
    }

    /// Remove every symlink in the prefix resolving into this keg, then
    /// prune directories the removals left empty, bottom-up
    pub fn unlink(&self, keg: &Keg) -> Result<usize> {
        let mut removed = 0;
        for category in LINK_CATEGORIES {
            let dst_root = self.layout.prefix.join(category);
            if !dst_root.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&dst_root).min_depth(1) {
                let entry = entry.map_err(|e| Error::other(e.to_string()))?;
                if !entry.path_is_symlink() {
                    continue;
                }
                if let Some(target) = resolve_symlink(entry.path())
                    && target.starts_with(keg.path())
                {
                    fs::remove_file(entry.path())?;
                    removed += 1;
                }
            }
            // Contents-first pass removes nested empty directories before
            // their parents; the category roots themselves stay
            for entry in WalkDir::new(&dst_root).min_depth(1).contents_first(true) {
                let entry = entry.map_err(|e| Error::other(e.to_string()))?;
                if entry.file_type().is_dir() {
                    let _ = fs::remove_dir(entry.path());
                }
            }
        }

        let record = self.layout.linked_keg(keg.name());
        if resolve_symlink(&record).is_some_and(|t| t == keg.path()) {
            fs::remove_file(&record)?;
        }
        debug!("unlinked {}: {removed} symlinks removed", keg.spec());
        Ok(removed)
    }

    /// Point the version-independent opt alias at this keg
    ///
    /// The alias is maintained independently of link state, so other
    /// formulas can reference "current version" even while the keg is
    /// unlinked.
    pub fn optlink(&self, keg: &Keg) -> Result<()> {
        fs::create_dir_all(&self.layout.opt)?;
        let alias = self.layout.opt_link(keg.name());
        if fs::symlink_metadata(&alias).is_ok() {
            fs::remove_file(&alias)?;
        }
        let rel = relative_path(&self.layout.opt, keg.path());
        std::os::unix::fs::symlink(rel, &alias)?;
        Ok(())
    }

    /// Drop the opt alias if it points at this keg
    pub fn unoptlink(&self, keg: &Keg) -> Result<()> {
        let alias = self.layout.opt_link(keg.name());
        if resolve_symlink(&alias).is_some_and(|t| t == keg.path()) {
            fs::remove_file(&alias)?;
        }
        Ok(())
    }

    /// Replace the linked-keg registry entry for this formula
    fn record_linked(&self, keg: &Keg) -> Result<()> {
        fs::create_dir_all(&self.layout.linked)?;
        let record = self.layout.linked_keg(keg.name());
        if fs::symlink_metadata(&record).is_ok() {
            fs::remove_file(&record)?;
        }
        std::os::unix::fs::symlink(keg.path(), &record)?;
        Ok(())
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn sorted_entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// Read a symlink and resolve its target to an absolute, lexically
/// normalized path (the target may dangle, so the filesystem is not asked)
pub fn resolve_symlink(link: &Path) -> Option<PathBuf> {
    let target = fs::read_link(link).ok()?;
    if target.is_absolute() {
        Some(lexical_normalize(&target))
    } else {
        link.parent()
            .map(|parent| lexical_normalize(&parent.join(target)))
    }
}

/// Resolve `.` and `..` components without touching the filesystem
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Relative path from one absolute directory to another absolute path
pub fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from_dir.components().collect();
    let to_parts: Vec<Component> = to.components().collect();

    let common = from
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for part in &to_parts[common..] {
        rel.push(part.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

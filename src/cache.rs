// src/cache.rs

//! Explicit memoized caches for one orchestration's process
//!
//! The original system memoizes receipt reads and tool lookups in implicit
//! global state. Here the caches are one object, owned by the orchestrator's
//! caller and passed in, with explicit invalidation at the same points the
//! state changes on disk (after an install or uninstall mutates a rack).

use crate::config::Layout;
use crate::error::Result;
use crate::install::InstallReceipt;
use crate::keg::Keg;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Compilers accepted as evidence that source builds can work here
const COMPILERS: &[&str] = &["cc", "clang", "gcc"];

/// Receipt and tool-lookup memoization
#[derive(Default)]
pub struct InstallCache {
    receipts: RefCell<HashMap<PathBuf, Arc<InstallReceipt>>>,
    tools: RefCell<HashMap<String, Option<PathBuf>>>,
}

impl InstallCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The receipt for a keg, read once and memoized
    ///
    /// Falls back to a receipt re-derived from the keg's own contents when
    /// the file is missing or unreadable.
    pub fn receipt(&self, keg: &Keg) -> Result<Arc<InstallReceipt>> {
        if let Some(receipt) = self.receipts.borrow().get(keg.path()) {
            return Ok(receipt.clone());
        }
        let receipt = Arc::new(InstallReceipt::read_or_derive(keg)?);
        self.receipts
            .borrow_mut()
            .insert(keg.path().to_path_buf(), receipt.clone());
        Ok(receipt)
    }

    /// Drop memoized receipts for every keg of the named formula
    ///
    /// Call after any mutation of the formula's rack.
    pub fn invalidate(&self, layout: &Layout, name: &str) {
        let rack = layout.rack(name);
        self.receipts
            .borrow_mut()
            .retain(|path, _| !path.starts_with(&rack));
        debug!("invalidated receipt cache for {name}");
    }

    /// Seed a tool lookup without consulting PATH
    ///
    /// Used when the caller already knows where a tool lives (or knows it is
    /// absent) and wants later lookups to agree.
    pub fn prime_tool(&self, name: impl Into<String>, path: Option<PathBuf>) {
        self.tools.borrow_mut().insert(name.into(), path);
    }

    /// Locate an executable on PATH, memoized including misses
    pub fn find_tool(&self, name: &str) -> Option<PathBuf> {
        if let Some(hit) = self.tools.borrow().get(name) {
            return hit.clone();
        }
        let found = which::which(name).ok();
        self.tools
            .borrow_mut()
            .insert(name.to_string(), found.clone());
        found
    }

    /// True if a compiler and make are available for source builds
    pub fn has_build_tools(&self) -> bool {
        COMPILERS.iter().any(|cc| self.find_tool(cc).is_some())
            && self.find_tool("make").is_some()
    }

    /// Forget tool lookups (PATH may have changed, e.g. after installing a
    /// build tool dependency)
    pub fn invalidate_tools(&self) {
        self.tools.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tool_lookup_memoizes_misses() {
        let cache = InstallCache::new();
        assert!(cache.find_tool("definitely-not-a-real-tool-xyz").is_none());
        // Second lookup hits the memo (observable only as not erroring)
        assert!(cache.find_tool("definitely-not-a-real-tool-xyz").is_none());
        cache.invalidate_tools();
        assert!(cache.find_tool("definitely-not-a-real-tool-xyz").is_none());
    }

    #[test]
    fn test_receipt_memoized_and_invalidated() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path().join("prefix"));
        layout.ensure_dirs().unwrap();
        let keg = Keg::new(&layout, "jq", "1.7.1");
        std::fs::create_dir_all(keg.path()).unwrap();

        let cache = InstallCache::new();
        let first = cache.receipt(&keg).unwrap();
        // Derived receipt: no file on disk yet
        assert!(!first.poured_from_bottle);

        let second = cache.receipt(&keg).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.invalidate(&layout, "jq");
        let third = cache.receipt(&keg).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }
}

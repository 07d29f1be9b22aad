// src/lock.rs

//! Per-formula installation locks
//!
//! Before any mutation, one orchestration acquires an exclusive advisory lock
//! per package name for the root and its full transitive closure, in a single
//! ordered pass. Acquisition never blocks: contention fails immediately with
//! a structured "operation in progress" error, so nothing ever waits on a
//! held lock and deadlock is impossible.
//!
//! Locks are released in reverse acquisition order, exactly once, on every
//! path; release itself never raises. Recursive dependency installs share
//! the manager and skip names this orchestration already holds.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Process-local registry of held per-formula locks
pub struct LockManager {
    dir: PathBuf,
    held: RefCell<HashMap<String, File>>,
}

impl LockManager {
    /// Create a manager storing lock files in the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            held: RefCell::new(HashMap::new()),
        }
    }

    /// Acquire exclusive locks for every name, in order, skipping names this
    /// manager already holds
    ///
    /// On contention every lock newly acquired by this call is released
    /// before the error returns, so a failed acquisition has no side effects.
    pub fn acquire_all<I, S>(&self, names: I) -> Result<LockToken<'_>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fs::create_dir_all(&self.dir)?;

        let mut newly: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if newly.contains(&name) || self.held.borrow().contains_key(&name) {
                continue;
            }
            match self.try_lock(&name) {
                Ok(file) => {
                    self.held.borrow_mut().insert(name.clone(), file);
                    debug!("acquired lock for {name}");
                    newly.push(name);
                }
                Err(err) => {
                    self.release_names(&newly);
                    return Err(err);
                }
            }
        }
        Ok(LockToken {
            manager: self,
            names: newly,
        })
    }

    fn try_lock(&self, name: &str) -> Result<File> {
        let path = self.dir.join(format!("{name}.lock"));
        let file = File::create(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!("lock for {name} is held elsewhere");
                Err(Error::OperationInProgress(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// True if this manager currently holds the named lock
    pub fn is_held(&self, name: &str) -> bool {
        self.held.borrow().contains_key(name)
    }

    /// Number of locks currently held by this manager
    pub fn held_count(&self) -> usize {
        self.held.borrow().len()
    }

    /// Release the given names in reverse order; never raises
    fn release_names(&self, names: &[String]) {
        for name in names.iter().rev() {
            if let Some(file) = self.held.borrow_mut().remove(name) {
                if let Err(e) = file.unlock() {
                    warn!("failed to unlock {name}: {e}");
                }
                debug!("released lock for {name}");
            }
        }
    }
}

/// The locks one `acquire_all` call added, released on drop
///
/// Only names newly acquired by the call are tracked, so a recursive install
/// releasing its token leaves the outer orchestration's locks in place.
#[must_use = "dropping the token releases the locks"]
pub struct LockToken<'a> {
    manager: &'a LockManager,
    names: Vec<String>,
}

impl LockToken<'_> {
    /// Names this token is responsible for releasing
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Release now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LockToken<'_> {
    fn drop(&mut self) {
        let names = std::mem::take(&mut self.names);
        self.manager.release_names(&names);
    }
}

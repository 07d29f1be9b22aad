// src/error.rs

//! Error types for the cellar installation orchestrator
//!
//! Errors fall into a few families with distinct recovery semantics:
//!
//! - **Structural** (cycles, pinned conflicts): raised before any mutation,
//!   retryable after the input is fixed
//! - **Concurrency** (lock held elsewhere): fatal to this invocation, retry
//!   later, never waits
//! - **Conflict** (link target owned by another keg): recoverable via
//!   explicit overwrite mode
//! - **Artifact** (bottle missing/incompatible/pour failed): auto-recovered
//!   by source fallback when build tools exist
//! - **Build**: fatal, triggers full keg rollback, logs retained

use std::path::PathBuf;
use thiserror::Error;

/// Result type for cellar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during installation orchestration
#[derive(Error, Debug)]
pub enum Error {
    /// A formula declares a dependency on itself, directly or transitively
    #[error("{formula} depends on {dependency}, which depends on {formula}")]
    CyclicDependency { formula: String, dependency: String },

    /// A formula declares a direct dependency on itself
    #[error("{0} declares a dependency on itself")]
    SelfDependency(String),

    /// A dependency is pinned at a version the plan cannot use
    #[error("{name} is pinned at {pinned} but {required} is required; unpin it first")]
    PinnedDependency {
        name: String,
        pinned: String,
        required: String,
    },

    /// Another process is already operating on this formula
    #[error("another process is already installing {0}; try again later")]
    OperationInProgress(String),

    /// The shared prefix already contains files owned elsewhere
    #[error("cannot link {keg}:\n{}", format_conflicts(.conflicts))]
    LinkConflict {
        keg: String,
        conflicts: Vec<LinkConflict>,
    },

    /// No usable bottle and no way to build from source
    #[error("no bottle available for {formula} ({reason}) and build tools are missing")]
    BuildToolsMissing { formula: String, reason: String },

    /// Unpacking a bottle into the keg failed
    #[error("pouring bottle for {formula} failed: {reason}")]
    PourFailed { formula: String, reason: String },

    /// The external build procedure failed
    #[error("build of {formula} failed during {step}; log retained at {}", .log.display())]
    BuildFailed {
        formula: String,
        step: String,
        log: PathBuf,
    },

    /// The requested formula is not known to the store
    #[error("no available formula named {0}")]
    FormulaUnavailable(String),

    /// A required capability cannot be satisfied
    #[error("{formula} requires {requirement}, which is not satisfied")]
    UnsatisfiedRequirement { formula: String, requirement: String },

    /// The orchestration was cancelled during the named phase
    #[error("cancelled during {0}")]
    Cancelled(String),

    /// Install receipt could not be read or written
    #[error("receipt error for {keg}: {reason}")]
    Receipt { keg: String, reason: String },

    /// IO error during filesystem operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with a message
    #[error("{0}")]
    Other(String),
}

/// One offending path found while linking a keg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConflict {
    /// The path inside the shared prefix that is already taken
    pub path: PathBuf,
    /// Who owns it: another keg's name, or None for an unmanaged file
    pub owner: Option<String>,
}

fn format_conflicts(conflicts: &[LinkConflict]) -> String {
    conflicts
        .iter()
        .map(|c| match &c.owner {
            Some(owner) => format!("  {} is owned by {}", c.path.display(), owner),
            None => format!("  {} already exists and is not managed", c.path.display()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    /// Create a new generic error with a message
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Structural errors are raised before any mutation and are retryable
    /// once the input is fixed
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CyclicDependency { .. }
                | Self::SelfDependency(_)
                | Self::PinnedDependency { .. }
                | Self::FormulaUnavailable(_)
        )
    }

    /// True if retrying later (without changing anything) can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OperationInProgress(_))
    }
}

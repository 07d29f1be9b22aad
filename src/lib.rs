// src/lib.rs

//! Cellar Package Installation Orchestrator
//!
//! Given a requested formula, cellar determines the closed set of packages
//! required, decides per package whether to pour a precompiled bottle or
//! build from source, serializes concurrent attempts with per-name locks,
//! installs each package into a dedicated keg, and exposes it through a
//! conflict-aware symlink farm in the shared prefix, with reversible
//! rollback when a step fails partway.
//!
//! # Architecture
//!
//! - Formulas are plain data from a loader; the resolver evaluates no code
//! - Expansion prunes edges with an explicit decision enum, never exceptions
//! - Locks are exclusive and non-blocking: contention fails fast, nothing
//!   ever waits, deadlock is impossible
//! - One keg per (formula, version, revision); at most one linked at a time
//! - Linking is all-or-nothing; a failed link unwinds every symlink it made

pub mod bottle;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
mod error;
pub mod formula;
pub mod graph;
pub mod install;
pub mod keg;
pub mod link;
pub mod lock;

pub use bottle::{pour_decision, BottleCellar, BottleSpec, PourDecision};
pub use cache::InstallCache;
pub use config::{InstallFlags, Layout, LINK_CATEGORIES};
pub use error::{Error, LinkConflict, Result};
pub use formula::{
    BuildOptions, Dependency, Formula, FormulaStore, HookSpec, OptionDef, Options, Requirement,
    SourceSpec, Tag, Tags,
};
pub use graph::{expand, standard_decision, Decision, PlanEntry};
pub use install::{
    BottleSource, BuildContext, BuildRunner, Cleaner, InstallOutcome, InstallReceipt, InstallState,
    Installer,
};
pub use keg::Keg;
pub use link::{LinkReport, Linker, PolicyTable};
pub use lock::{LockManager, LockToken};

// src/bottle.rs

//! Bottle descriptors and the pour-or-build decision
//!
//! A bottle is a precompiled artifact for one exact (formula, version,
//! platform). [`pour_decision`] is the single place that decides whether a
//! plan entry is poured or built from source; everything downstream reads the
//! decision rather than re-deriving it.

use crate::config::Layout;
use crate::formula::{BuildOptions, Formula};
use std::fmt;
use std::path::PathBuf;

/// Where a bottle expects to be installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BottleCellar {
    /// Relocatable; works in any cellar
    Any,
    /// Built for one exact cellar path; usable only there
    Fixed(PathBuf),
}

/// Descriptor of a precompiled artifact, as published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BottleSpec {
    /// Platform tags the artifact was built for, e.g. `linux-x86_64`
    pub platforms: Vec<String>,
    /// Cellar compatibility of the artifact
    pub cellar: BottleCellar,
}

impl BottleSpec {
    pub fn relocatable(platforms: Vec<String>) -> Self {
        Self {
            platforms,
            cellar: BottleCellar::Any,
        }
    }

    /// True if the artifact covers the given platform tag
    pub fn supports_platform(&self, platform: &str) -> bool {
        self.platforms.iter().any(|p| p == platform)
    }

    /// True if the artifact can be installed into the given layout
    pub fn compatible_with(&self, layout: &Layout) -> bool {
        match &self.cellar {
            BottleCellar::Any => true,
            BottleCellar::Fixed(path) => path == &layout.cellar,
        }
    }
}

/// The platform tag of the running system
pub fn current_platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Outcome of the pour-or-build decision, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PourDecision {
    /// Use the precompiled artifact
    Pour,
    /// No artifact published for this formula
    NoBottle,
    /// Artifact exists but not for this platform
    PlatformMismatch { platform: String },
    /// Artifact was built for a different cellar path
    CellarMismatch,
    /// The user asked for a source build
    SourceRequested,
    /// Build-affecting flags were passed, so the artifact does not match
    OptionsRequested,
    /// The formula's own usability predicate rejected the artifact
    PredicateRejected,
}

impl PourDecision {
    pub fn pour(&self) -> bool {
        matches!(self, Self::Pour)
    }
}

impl fmt::Display for PourDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pour => write!(f, "bottle is usable"),
            Self::NoBottle => write!(f, "no bottle is published"),
            Self::PlatformMismatch { platform } => {
                write!(f, "no bottle for platform {platform}")
            }
            Self::CellarMismatch => write!(f, "bottle was built for a different cellar"),
            Self::SourceRequested => write!(f, "source build was requested"),
            Self::OptionsRequested => write!(f, "build options were passed"),
            Self::PredicateRejected => write!(f, "formula rejects its bottle here"),
        }
    }
}

/// Decide whether a formula install pours its bottle or builds from source
///
/// Pour iff: an artifact exists for the current platform, the install layout
/// is compatible with how it was built, the user neither forced source nor
/// passed build-affecting flags, and the formula's usability predicate (if
/// any) passes.
pub fn pour_decision(
    formula: &Formula,
    opts: &BuildOptions,
    layout: &Layout,
    build_from_source: bool,
) -> PourDecision {
    if build_from_source {
        return PourDecision::SourceRequested;
    }
    if opts.build_affecting() {
        return PourDecision::OptionsRequested;
    }
    let Some(bottle) = &formula.bottle else {
        return PourDecision::NoBottle;
    };
    let platform = current_platform();
    if !bottle.supports_platform(&platform) {
        return PourDecision::PlatformMismatch { platform };
    }
    if !bottle.compatible_with(layout) {
        return PourDecision::CellarMismatch;
    }
    if let Some(check) = &formula.pour_bottle_check
        && !check()
    {
        return PourDecision::PredicateRejected;
    }
    PourDecision::Pour
}

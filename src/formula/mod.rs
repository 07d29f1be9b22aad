// src/formula/mod.rs

//! Formula metadata model
//!
//! A [`Formula`] is a plain data record produced by an external loader: name,
//! version, declared edges, option catalog, bottle descriptor, and hook
//! specs. The resolver never evaluates package-definition code; everything it
//! needs arrives as data, and the build/post-install entry points execute
//! behind the [`crate::install::BuildRunner`] seam.

mod dependency;
mod options;

pub use dependency::{Dependency, EnvHook, Requirement, SatisfiedCheck, Tag, Tags};
pub use options::{BuildOptions, OptionDef, Options, SourceSpec};

use crate::bottle::BottleSpec;
use crate::error::Result;
use semver::Version;
use std::fmt;
use std::sync::Arc;

/// An executable entry point recorded as data (argv form)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSpec {
    pub argv: Vec<String>,
}

impl HookSpec {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

/// Predicate deciding whether a bottle is usable on this system
pub type PourCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Metadata for one installable package
#[derive(Clone)]
pub struct Formula {
    /// Package name; also the rack directory name
    pub name: String,
    /// Stable version, consumed as an opaque ordered value
    pub version: Version,
    /// Packaging revision appended to the keg directory name when nonzero
    pub revision: u32,
    /// Whether an upstream development head can be installed
    pub head_available: bool,
    /// Declared dependency edges
    pub deps: Vec<Dependency>,
    /// Declared capability requirements
    pub requirements: Vec<Requirement>,
    /// Build switches this formula understands
    pub options: Vec<OptionDef>,
    /// Precompiled artifact descriptor, when one exists
    pub bottle: Option<BottleSpec>,
    /// Build entry point; formulas without one are pour-only
    pub build: Option<HookSpec>,
    /// Post-install entry point, run best-effort after linking
    pub post_install: Option<HookSpec>,
    /// Extra usability predicate consulted before pouring
    pub pour_bottle_check: Option<PourCheck>,
}

impl Formula {
    /// Minimal formula with the given name and version
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            revision: 0,
            head_available: false,
            deps: Vec::new(),
            requirements: Vec::new(),
            options: Vec::new(),
            bottle: None,
            build: None,
            post_install: None,
            pour_bottle_check: None,
        }
    }

    /// The keg directory name for this formula under the given options:
    /// `<version>` or `<version>_<revision>`, or `HEAD` for head installs
    pub fn keg_version(&self, opts: &BuildOptions) -> String {
        if opts.head() && self.head_available {
            return "HEAD".to_string();
        }
        if self.revision > 0 {
            format!("{}_{}", self.version, self.revision)
        } else {
            self.version.to_string()
        }
    }

    /// Every option flag this formula defines, including the flags implied
    /// by its optional and recommended edges
    pub fn defined_options(&self) -> Options {
        let mut defined: Options = self.options.iter().map(|o| o.name.as_str()).collect();
        for dep in &self.deps {
            if dep.tags.optional {
                defined.insert(format!("with-{}", dep.option_name()));
            }
            if dep.tags.recommended {
                defined.insert(format!("without-{}", dep.option_name()));
            }
        }
        defined
    }

    /// Build the per-install option record for the requested flags
    pub fn build_options(&self, args: Options) -> BuildOptions {
        BuildOptions::new(args, self.defined_options())
    }

    /// Edges needed at runtime by an installed copy of this formula
    pub fn runtime_deps(&self) -> impl Iterator<Item = &Dependency> {
        self.deps.iter().filter(|d| d.tags.runtime())
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formula")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("revision", &self.revision)
            .field("deps", &self.deps)
            .field("bottle", &self.bottle)
            .finish()
    }
}

/// The package-definition loader seam
///
/// Implementations turn a name into formula metadata; the resolver and
/// orchestrator only ever see the data.
pub trait FormulaStore {
    /// Look up a formula by name
    fn find(&self, name: &str) -> Result<Arc<Formula>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_keg_version_includes_revision() {
        let mut f = Formula::new("jq", Version::new(1, 7, 1));
        let opts = f.build_options(Options::new());
        assert_eq!(f.keg_version(&opts), "1.7.1");

        f.revision = 2;
        assert_eq!(f.keg_version(&opts), "1.7.1_2");
    }

    #[test]
    fn test_keg_version_head() {
        let mut f = Formula::new("jq", Version::new(1, 7, 1));
        f.head_available = true;
        let opts = f.build_options(["HEAD"].into_iter().collect());
        assert_eq!(f.keg_version(&opts), "HEAD");

        // HEAD requested but not available falls back to stable
        let g = Formula::new("yq", Version::new(4, 44, 0));
        let opts = g.build_options(["HEAD"].into_iter().collect());
        assert_eq!(g.keg_version(&opts), "4.44.0");
    }

    #[test]
    fn test_defined_options_include_edge_flags() {
        let mut f = Formula::new("curl", Version::new(8, 9, 0));
        f.options.push(OptionDef::new("with-docs", "Build documentation"));
        f.deps.push(Dependency::new(
            "openssl",
            Tags::from_tags(&[Tag::Recommended]),
        ));
        f.deps
            .push(Dependency::new("brotli", Tags::from_tags(&[Tag::Optional])));

        let defined = f.defined_options();
        assert!(defined.contains("with-docs"));
        assert!(defined.contains("without-openssl"));
        assert!(defined.contains("with-brotli"));
    }

    #[test]
    fn test_recommended_edge_on_by_default() {
        let mut f = Formula::new("curl", Version::new(8, 9, 0));
        f.deps.push(Dependency::new(
            "openssl",
            Tags::from_tags(&[Tag::Recommended]),
        ));
        let opts = f.build_options(Options::new());
        assert!(opts.with("openssl"));

        let opts = f.build_options(["without-openssl"].into_iter().collect());
        assert!(!opts.with("openssl"));
    }
}

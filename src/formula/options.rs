// src/formula/options.rs

//! Build options and per-install flag evaluation
//!
//! An [`Options`] value is a set of flag names (`with-docs`, `without-ssl`,
//! `HEAD`). [`BuildOptions`] pairs the flags a user requested with the flags
//! a formula defines, and answers the questions the resolver and builder ask:
//! is this optional dependency wanted, is this recommended dependency
//! disabled, which source spec was selected.

use std::collections::BTreeSet;
use std::fmt;

/// A named build switch a formula declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDef {
    /// Flag name, e.g. `with-docs`
    pub name: String,
    /// Short human description
    pub description: String,
}

impl OptionDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// An immutable set of option flags; duplicates collapse
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Options {
    flags: BTreeSet<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: impl Into<String>) {
        self.flags.insert(flag.into());
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(|s| s.as_str())
    }

    pub fn union(&self, other: &Options) -> Options {
        Options {
            flags: self.flags.union(&other.flags).cloned().collect(),
        }
    }

    /// Flags in `self` that are also defined in `other`
    pub fn intersection(&self, other: &Options) -> Options {
        Options {
            flags: self.flags.intersection(&other.flags).cloned().collect(),
        }
    }

    /// Flags in `self` that `other` does not define
    pub fn difference(&self, other: &Options) -> Options {
        Options {
            flags: self.flags.difference(&other.flags).cloned().collect(),
        }
    }
}

impl FromIterator<String> for Options {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            flags: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for Options {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            flags: iter.into_iter().map(String::from).collect(),
        }
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for flag in &self.flags {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "--{flag}")?;
            first = false;
        }
        Ok(())
    }
}

/// Source spec selected for one install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSpec {
    Stable,
    Devel,
    Head,
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Devel => write!(f, "devel"),
            Self::Head => write!(f, "head"),
        }
    }
}

/// The per-install option record: what was requested, against what is defined
///
/// Recommended dependencies define a `without-<name>` flag and default on;
/// optional dependencies define a `with-<name>` flag and default off.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Flags the user passed for this install
    pub args: Options,
    /// Flags the formula defines (its catalog plus flags implied by edges)
    pub defined: Options,
}

impl BuildOptions {
    pub fn new(args: Options, defined: Options) -> Self {
        Self { args, defined }
    }

    /// Is the named thing enabled for this install?
    ///
    /// For something declared recommended (defines `without-<name>`), it is
    /// on unless `without-<name>` was passed. Otherwise it is on only if
    /// `with-<name>` was passed.
    pub fn with(&self, name: &str) -> bool {
        let without_flag = format!("without-{name}");
        if self.defined.contains(&without_flag) {
            !self.args.contains(&without_flag)
        } else {
            self.args.contains(&format!("with-{name}"))
        }
    }

    pub fn without(&self, name: &str) -> bool {
        !self.with(name)
    }

    pub fn head(&self) -> bool {
        self.args.contains("HEAD")
    }

    pub fn devel(&self) -> bool {
        self.args.contains("devel")
    }

    pub fn stable(&self) -> bool {
        !self.head() && !self.devel()
    }

    /// Which source spec this install uses
    pub fn source_spec(&self) -> SourceSpec {
        if self.head() {
            SourceSpec::Head
        } else if self.devel() {
            SourceSpec::Devel
        } else {
            SourceSpec::Stable
        }
    }

    /// Requested flags the formula actually defines
    pub fn used_options(&self) -> Options {
        self.args.intersection(&self.defined)
    }

    /// Requested flags the formula does not define
    pub fn unused_options(&self) -> Options {
        self.args.difference(&self.defined)
    }

    /// True if any build-affecting flag was passed (such flags disqualify a
    /// prebuilt bottle)
    pub fn build_affecting(&self) -> bool {
        !self.used_options().is_empty() || self.head() || self.devel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_collapse_duplicates() {
        let opts: Options = ["with-docs", "with-docs", "HEAD"].into_iter().collect();
        assert_eq!(opts.len(), 2);
        assert!(opts.contains("with-docs"));
    }

    #[test]
    fn test_optional_defaults_off() {
        let defined: Options = ["with-docs"].into_iter().collect();
        let off = BuildOptions::new(Options::new(), defined.clone());
        assert!(!off.with("docs"));

        let on = BuildOptions::new(["with-docs"].into_iter().collect(), defined);
        assert!(on.with("docs"));
    }

    #[test]
    fn test_recommended_defaults_on() {
        let defined: Options = ["without-ssl"].into_iter().collect();
        let on = BuildOptions::new(Options::new(), defined.clone());
        assert!(on.with("ssl"));

        let off = BuildOptions::new(["without-ssl"].into_iter().collect(), defined);
        assert!(!off.with("ssl"));
        assert!(off.without("ssl"));
    }

    #[test]
    fn test_source_spec_selection() {
        let defined = Options::new();
        let stable = BuildOptions::new(Options::new(), defined.clone());
        assert_eq!(stable.source_spec(), SourceSpec::Stable);
        assert!(!stable.build_affecting());

        let head = BuildOptions::new(["HEAD"].into_iter().collect(), defined);
        assert_eq!(head.source_spec(), SourceSpec::Head);
        assert!(head.build_affecting());
    }

    #[test]
    fn test_used_and_unused_options() {
        let defined: Options = ["with-docs", "without-ssl"].into_iter().collect();
        let opts = BuildOptions::new(
            ["with-docs", "with-imaginary"].into_iter().collect(),
            defined,
        );
        assert!(opts.used_options().contains("with-docs"));
        assert!(opts.unused_options().contains("with-imaginary"));
        assert!(!opts.used_options().contains("with-imaginary"));
    }
}

// src/formula/dependency.rs

//! Dependency and requirement edges
//!
//! Edges carry tags, not nodes. A [`Dependency`] points at another formula by
//! name; a [`Requirement`] points at a capability that is not itself a
//! formula (a compiler, an OS facility) but may fall back to one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strum_macros::{Display, EnumString};

/// A label on a dependency edge controlling when it is followed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Tag {
    /// Needed only while building the dependent
    Build,
    /// Off by default, enabled with `with-<name>`
    Optional,
    /// On by default, disabled with `without-<name>`
    Recommended,
    /// Needed at runtime even when the dependent was poured
    Run,
    /// Needed only by the dependent's test suite
    Test,
    /// Must already be linked before the dependent builds
    Linked,
}

/// An immutable set of edge tags
///
/// Two edges to the same target merge by unioning their tag sets; the union
/// is commutative, so discovery order does not matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tags {
    pub build: bool,
    pub optional: bool,
    pub recommended: bool,
    pub run: bool,
    pub test: bool,
    pub linked: bool,
}

impl Tags {
    /// The empty tag set (a plain required runtime dependency)
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a tag set from a list of tags
    pub fn from_tags(tags: &[Tag]) -> Self {
        let mut set = Self::default();
        for tag in tags {
            set.insert(*tag);
        }
        set
    }

    pub fn insert(&mut self, tag: Tag) {
        match tag {
            Tag::Build => self.build = true,
            Tag::Optional => self.optional = true,
            Tag::Recommended => self.recommended = true,
            Tag::Run => self.run = true,
            Tag::Test => self.test = true,
            Tag::Linked => self.linked = true,
        }
    }

    pub fn contains(&self, tag: Tag) -> bool {
        match tag {
            Tag::Build => self.build,
            Tag::Optional => self.optional,
            Tag::Recommended => self.recommended,
            Tag::Run => self.run,
            Tag::Test => self.test,
            Tag::Linked => self.linked,
        }
    }

    /// Union with another tag set
    pub fn union(&self, other: &Tags) -> Tags {
        Tags {
            build: self.build || other.build,
            optional: self.optional || other.optional,
            recommended: self.recommended || other.recommended,
            run: self.run || other.run,
            test: self.test || other.test,
            linked: self.linked || other.linked,
        }
    }

    /// A dependency is required iff none of build/optional/recommended/test
    /// is set
    pub fn required(&self) -> bool {
        !(self.build || self.optional || self.recommended || self.test)
    }

    /// True if the target is needed at runtime by an installed dependent
    pub fn runtime(&self) -> bool {
        self.required() || self.run
    }

    /// True if the edge is needed only to build, never at runtime
    pub fn build_only(&self) -> bool {
        self.build && !self.run && !self.required()
    }

    fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        [
            (self.build, Tag::Build),
            (self.optional, Tag::Optional),
            (self.recommended, Tag::Recommended),
            (self.run, Tag::Run),
            (self.test, Tag::Test),
            (self.linked, Tag::Linked),
        ]
        .into_iter()
        .filter_map(|(set, tag)| set.then_some(tag))
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|t| t.to_string()).collect();
        if names.is_empty() {
            write!(f, "required")
        } else {
            write!(f, "{}", names.join("+"))
        }
    }
}

/// Hook applied to the build environment before the dependent builds
pub type EnvHook = Arc<dyn Fn(&mut HashMap<String, String>) + Send + Sync>;

/// An edge to another formula
#[derive(Clone)]
pub struct Dependency {
    /// Target formula name
    pub name: String,
    /// Edge tags
    pub tags: Tags,
    /// Name to show in user-facing messages, when it differs from `name`
    pub display_name: Option<String>,
    /// Optional environment mutation applied when the dependent builds
    pub env_hook: Option<EnvHook>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, tags: Tags) -> Self {
        Self {
            name: name.into(),
            tags,
            display_name: None,
            env_hook: None,
        }
    }

    /// A plain required runtime dependency
    pub fn required(name: impl Into<String>) -> Self {
        Self::new(name, Tags::none())
    }

    pub fn with_display_name(mut self, display: impl Into<String>) -> Self {
        self.display_name = Some(display.into());
        self
    }

    pub fn with_env_hook(mut self, hook: EnvHook) -> Self {
        self.env_hook = Some(hook);
        self
    }

    /// The name used for user-facing output and option flags
    pub fn option_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Merge another edge to the same target into this one (tag union)
    pub fn merge_from(&mut self, other: &Dependency) {
        debug_assert_eq!(self.name, other.name);
        self.tags = self.tags.union(&other.tags);
        if self.display_name.is_none() {
            self.display_name = other.display_name.clone();
        }
        if self.env_hook.is_none() {
            self.env_hook = other.env_hook.clone();
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("display_name", &self.display_name)
            .field("env_hook", &self.env_hook.as_ref().map(|_| "..."))
            .finish()
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.tags == other.tags
    }
}

/// Predicate answering whether a requirement is already satisfied
pub type SatisfiedCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// An edge to a capability that is not a formula
#[derive(Clone)]
pub struct Requirement {
    /// Capability name, for error messages
    pub name: String,
    /// Edge tags, same semantics as dependency tags
    pub tags: Tags,
    /// True if an unsatisfied requirement without a fallback aborts the plan
    pub fatal: bool,
    /// Probe for whether the capability is already present
    pub satisfied: SatisfiedCheck,
    /// Formula that can satisfy the requirement when the probe fails
    pub default_formula: Option<String>,
}

impl Requirement {
    pub fn new(name: impl Into<String>, tags: Tags, satisfied: SatisfiedCheck) -> Self {
        Self {
            name: name.into(),
            tags,
            fatal: true,
            satisfied,
            default_formula: None,
        }
    }

    pub fn non_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }

    pub fn with_default_formula(mut self, name: impl Into<String>) -> Self {
        self.default_formula = Some(name.into());
        self
    }

    /// Resolve to a concrete dependency edge on the fallback formula
    pub fn to_dependency(&self) -> Option<Dependency> {
        self.default_formula.as_ref().map(|name| {
            Dependency::new(name.clone(), self.tags).with_display_name(self.name.clone())
        })
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requirement")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("fatal", &self.fatal)
            .field("default_formula", &self.default_formula)
            .finish()
    }
}

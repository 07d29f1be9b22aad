// src/install/mod.rs

//! Installation orchestration
//!
//! The [`Installer`] drives one formula install through a fixed state
//! machine:
//!
//! ```text
//! Pending -> Locked -> PlanComputed -> DependenciesInstalling
//!         -> ArtifactAcquiring -> {Pouring | Building}
//!         -> Cleaning -> Linking -> PostInstalling -> Finished
//! ```
//!
//! `Aborted` is reachable from every non-finished state. Any failure before
//! linking completes deletes the partially built keg and its now-empty rack
//! before the error propagates, so a failed install leaves no trace. A link
//! *conflict* is the one deliberate exception: the keg stays installed but
//! unlinked, reachable through its opt alias, and the run still finishes
//! with a recorded warning so the link can be retried without rebuilding.
//!
//! Scheduling is synchronous and recursive: installing a dependency blocks
//! the parent until done. Dependency installs share this orchestration's
//! lock manager, so the whole closure is serialized against other processes
//! at package-name granularity.

mod receipt;

pub use receipt::{InstallReceipt, RuntimeDependency, SourceIdentity, RECEIPT_FILE};

use crate::bottle::pour_decision;
use crate::cache::InstallCache;
use crate::config::{InstallFlags, Layout};
use crate::error::{Error, Result};
use crate::formula::{BuildOptions, Dependency, Formula, FormulaStore, Options};
use crate::graph::{self, PlanEntry};
use crate::keg::Keg;
use crate::link::{resolve_symlink, Linker};
use crate::lock::LockManager;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use strum_macros::Display;
use tracing::{debug, info, warn};

/// Phases of one orchestrated install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InstallState {
    Pending,
    Locked,
    PlanComputed,
    DependenciesInstalling,
    ArtifactAcquiring,
    Pouring,
    Building,
    Cleaning,
    Linking,
    PostInstalling,
    Finished,
    Aborted,
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }

    /// States during which the keg directory is being written
    pub fn mutates_keg(&self) -> bool {
        matches!(
            self,
            Self::Pouring | Self::Building | Self::Cleaning | Self::Linking
        )
    }
}

/// Unpacks verified artifacts into keg directories (fetch collaborator)
pub trait BottleSource {
    /// Unpack the checksum-verified bottle for `formula` into `keg_path`
    fn pour(&self, formula: &Formula, keg_path: &Path) -> Result<()>;
}

/// Runs external build and post-install procedures (sandbox collaborator)
pub trait BuildRunner {
    fn build(&self, formula: &Formula, ctx: &BuildContext) -> Result<()>;
    fn post_install(&self, formula: &Formula, ctx: &BuildContext) -> Result<()>;
}

/// Strips known-redundant files from a finished keg
pub trait Cleaner {
    fn clean(&self, keg: &Keg) -> Result<()>;
}

/// Everything an external build procedure is given
pub struct BuildContext<'a> {
    pub keg_path: &'a Path,
    pub layout: &'a Layout,
    pub options: &'a BuildOptions,
    /// Retained on failure; error messages point here
    pub log_path: PathBuf,
    /// Environment assembled from dependency env hooks
    pub env: HashMap<String, String>,
}

/// Observable result of one orchestrated install
#[derive(Debug)]
pub enum InstallOutcome {
    /// The keg was installed; `linked` is false when a link conflict left it
    /// reachable only through its opt alias
    Installed {
        keg: Keg,
        linked: bool,
        poured: bool,
        warnings: Vec<String>,
    },
    /// The exact keg already existed; nothing was mutated
    AlreadyInstalled { keg: Keg },
    /// `only_deps` was set; the formula itself was not installed
    DependenciesOnly { installed: usize },
    /// `dry_run` was set; the computed plan, dependency-ordered
    DryRun { plan: Vec<String> },
}

/// Orchestrates one install of one formula, recursively handling its plan
pub struct Installer<'a> {
    layout: &'a Layout,
    flags: InstallFlags,
    store: &'a dyn FormulaStore,
    bottles: &'a dyn BottleSource,
    builder: &'a dyn BuildRunner,
    cleaner: Option<&'a dyn Cleaner>,
    locks: &'a LockManager,
    cache: &'a InstallCache,
    cancel: Option<Arc<AtomicBool>>,
    state: InstallState,
    installed_as_dependency: bool,
}

impl<'a> Installer<'a> {
    pub fn new(
        layout: &'a Layout,
        flags: InstallFlags,
        store: &'a dyn FormulaStore,
        bottles: &'a dyn BottleSource,
        builder: &'a dyn BuildRunner,
        locks: &'a LockManager,
        cache: &'a InstallCache,
    ) -> Self {
        Self {
            layout,
            flags,
            store,
            bottles,
            builder,
            cleaner: None,
            locks,
            cache,
            cancel: None,
            state: InstallState::Pending,
            installed_as_dependency: false,
        }
    }

    pub fn with_cleaner(mut self, cleaner: &'a dyn Cleaner) -> Self {
        self.cleaner = Some(cleaner);
        self
    }

    /// Attach a cancellation token checked between mutating phases
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Install a formula and everything it needs
    pub fn install(&mut self, name: &str, args: Options) -> Result<InstallOutcome> {
        let formula = self.store.find(name)?;
        let opts = formula.build_options(args);
        let keg = Keg::new(self.layout, &formula.name, formula.keg_version(&opts));

        if keg.exists() {
            debug!("{} is already installed", keg.spec());
            return Ok(InstallOutcome::AlreadyInstalled { keg });
        }

        // Pending -> Locked: structural sanity, then every lock for the
        // root and its transitive closure in one ordered pass. Failure
        // here leaves no partial state.
        self.check_structural(&formula)?;
        let (plan, satisfied_elsewhere) = self.compute_plan(&formula, &opts)?;
        self.check_pins(&formula, &plan, &satisfied_elsewhere)?;

        let lock_names = std::iter::once(formula.name.clone())
            .chain(plan.iter().map(|entry| entry.dep.name.clone()));
        let locks = self.locks;
        let _token = locks.acquire_all(lock_names)?;
        self.state = InstallState::Locked;

        self.state = InstallState::PlanComputed;
        info!(
            "plan for {}: [{}]",
            formula.name,
            plan.iter()
                .map(|e| e.dep.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        if self.flags.dry_run {
            return Ok(InstallOutcome::DryRun {
                plan: plan.into_iter().map(|e| e.dep.name).collect(),
            });
        }

        if !self.flags.ignore_deps {
            self.state = InstallState::DependenciesInstalling;
            if let Err(e) = self.install_dependencies(&plan) {
                // The parent's own keg does not exist yet; only its locks
                // need releasing, which the token drop guarantees
                self.state = InstallState::Aborted;
                return Err(e);
            }
        }

        if self.flags.only_deps {
            self.state = InstallState::Finished;
            return Ok(InstallOutcome::DependenciesOnly {
                installed: plan.len(),
            });
        }

        match self.install_keg(&formula, &opts, &keg) {
            Ok((poured, linked, mut warnings)) => {
                self.state = InstallState::PostInstalling;
                if formula.post_install.is_some() {
                    let ctx = self.build_context(&formula, &opts, &keg);
                    if let Err(e) = self.builder.post_install(&formula, &ctx) {
                        warn!("post-install for {} failed: {e}", formula.name);
                        warnings.push(format!("post-install failed: {e}"));
                    }
                }
                self.state = InstallState::Finished;
                self.cache.invalidate(self.layout, &formula.name);
                Ok(InstallOutcome::Installed {
                    keg,
                    linked,
                    poured,
                    warnings,
                })
            }
            Err(e) => {
                self.state = InstallState::Aborted;
                self.rollback(&keg);
                Err(e)
            }
        }
    }

    /// Phases that write the keg: acquire artifact, build or pour, clean,
    /// link, write the receipt. Any error here rolls the keg back.
    fn install_keg(
        &mut self,
        formula: &Formula,
        opts: &BuildOptions,
        keg: &Keg,
    ) -> Result<(bool, bool, Vec<String>)> {
        self.state = InstallState::ArtifactAcquiring;
        self.check_cancelled("artifact acquisition")?;
        fs::create_dir_all(keg.path())?;

        let (poured, build_secs) = self.build_or_pour(formula, opts, keg)?;

        self.state = InstallState::Cleaning;
        self.check_cancelled("cleaning")?;
        let mut warnings = Vec::new();
        if let Some(cleaner) = self.cleaner
            && let Err(e) = cleaner.clean(keg)
        {
            // Best-effort; never blocks linking
            warn!("cleaning {} failed: {e}", keg.spec());
            warnings.push(format!("cleaning failed: {e}"));
        }

        self.state = InstallState::Linking;
        self.check_cancelled("linking")?;
        let linker = Linker::new(self.layout);
        // The opt alias goes first so the keg stays reachable even if the
        // link below hits a conflict
        linker.optlink(keg)?;
        let linked = match linker.link(keg, self.flags.overwrite) {
            Ok(report) => {
                info!(
                    "linked {} ({} symlinks)",
                    keg.spec(),
                    report.created
                );
                true
            }
            Err(conflict @ Error::LinkConflict { .. }) => {
                warn!("{conflict}");
                warnings.push(format!(
                    "{} is installed but not linked; retry with `cellar link {}` \
                     once the conflict is resolved",
                    keg.spec(),
                    keg.name()
                ));
                warnings.push(conflict.to_string());
                false
            }
            Err(e) => return Err(e),
        };

        // The receipt is written once linking completes, whatever the
        // conflict outcome was; it is the orchestrator's only durable state
        self.make_receipt(formula, opts, keg, poured, build_secs)
            .write(keg)?;

        Ok((poured, linked, warnings))
    }

    /// Pour the bottle when the decision allows it, falling back to a source
    /// build (with its own recomputed dependencies) when the pour fails
    fn build_or_pour(
        &mut self,
        formula: &Formula,
        opts: &BuildOptions,
        keg: &Keg,
    ) -> Result<(bool, u64)> {
        let decision = pour_decision(formula, opts, self.layout, self.flags.build_from_source);
        let mut build_reason = decision.to_string();

        if decision.pour() {
            self.state = InstallState::Pouring;
            self.check_cancelled("pouring")?;
            info!("pouring bottle for {}", formula.name);
            match self.bottles.pour(formula, keg.path()) {
                Ok(()) => return Ok((true, 0)),
                Err(e) => {
                    if self.flags.force_bottle {
                        return Err(e);
                    }
                    // The plan was computed for a bottle, so build tooling
                    // was pruned away; without tools the fallback is hopeless
                    if !self.cache.has_build_tools() {
                        return Err(Error::BuildToolsMissing {
                            formula: formula.name.clone(),
                            reason: format!("bottle pour failed: {e}"),
                        });
                    }
                    warn!(
                        "bottle pour for {} failed ({e}); falling back to source",
                        formula.name
                    );
                    // Drop whatever the failed pour left behind
                    fs::remove_dir_all(keg.path())?;
                    fs::create_dir_all(keg.path())?;
                    // A source build may need tools the bottle did not
                    self.install_source_build_deps(formula, opts)?;
                    build_reason = format!("bottle pour failed: {e}");
                }
            }
        } else if self.flags.force_bottle {
            return Err(Error::PourFailed {
                formula: formula.name.clone(),
                reason: decision.to_string(),
            });
        }

        self.state = InstallState::Building;
        self.check_cancelled("building")?;
        info!("building {} from source ({build_reason})", formula.name);
        let ctx = self.build_context(formula, opts, keg);
        if let Some(parent) = ctx.log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let started = Instant::now();
        self.builder.build(formula, &ctx)?;
        Ok((false, started.elapsed().as_secs()))
    }

    /// Recompute the formula's dependencies for a source build and install
    /// whatever the bottle path had pruned away
    fn install_source_build_deps(&mut self, formula: &Formula, opts: &BuildOptions) -> Result<()> {
        let deps = graph::expand(formula, self.store, |dependent, dep| {
            let is_root = dependent.name == formula.name;
            let d_opts = if is_root {
                opts.clone()
            } else {
                dependent.build_options(Options::new())
            };
            // Nothing pours on this path; build edges stay in the plan
            graph::standard_decision(dep, is_root, false, &d_opts, false, &|d| {
                Keg::any_installed(self.layout, &d.name)
            })
        })?;
        for dep in deps {
            if !Keg::any_installed(self.layout, &dep.name) {
                info!(
                    "installing {} needed for source build of {}",
                    dep.name, formula.name
                );
                self.child().install(&dep.name, Options::new())?;
            }
        }
        // New tools may now exist on lookup paths
        self.cache.invalidate_tools();
        Ok(())
    }

    /// Install every plan entry that is not yet present, dependencies first
    fn install_dependencies(&mut self, plan: &[PlanEntry]) -> Result<()> {
        for entry in plan {
            self.check_cancelled("dependency installation")?;
            if Keg::any_installed(self.layout, &entry.dep.name) {
                continue;
            }
            info!("installing dependency {}", entry.dep.name);
            match self.child().install(&entry.dep.name, entry.options.clone())? {
                InstallOutcome::Installed { warnings, .. } => {
                    for warning in warnings {
                        warn!("{}: {warning}", entry.dep.name);
                    }
                }
                InstallOutcome::AlreadyInstalled { .. } => {}
                other => {
                    debug!("dependency install of {} ended as {other:?}", entry.dep.name)
                }
            }
        }
        Ok(())
    }

    /// A nested installer for one dependency, sharing this orchestration's
    /// locks and caches
    fn child(&self) -> Installer<'a> {
        let flags = InstallFlags {
            // Source-build and test requests apply to the named formula
            // only, never to what it pulls in
            build_from_source: false,
            include_test: false,
            only_deps: false,
            ignore_deps: false,
            dry_run: false,
            overwrite: false,
            interactive: false,
            ..self.flags.clone()
        };
        Installer {
            layout: self.layout,
            flags,
            store: self.store,
            bottles: self.bottles,
            builder: self.builder,
            cleaner: self.cleaner,
            locks: self.locks,
            cache: self.cache,
            cancel: self.cancel.clone(),
            state: InstallState::Pending,
            installed_as_dependency: true,
        }
    }

    /// Direct self-dependency is a hard structural error, checked before
    /// anything else
    fn check_structural(&self, formula: &Formula) -> Result<()> {
        if formula.deps.iter().any(|d| d.name == formula.name) {
            return Err(Error::SelfDependency(formula.name.clone()));
        }
        Ok(())
    }

    /// Refuse the plan when it references a pinned formula whose pinned
    /// version is not the one the catalog would install
    ///
    /// Skipped (already satisfied) names are checked too: a stale pinned
    /// dependency is a structural problem whether or not it would be
    /// rebuilt by this particular plan.
    fn check_pins(&self, root: &Formula, plan: &[PlanEntry], satisfied: &[String]) -> Result<()> {
        let mut names: Vec<&str> = vec![root.name.as_str()];
        names.extend(plan.iter().map(|e| e.dep.name.as_str()));
        names.extend(satisfied.iter().map(String::as_str));
        for name in names {
            let pin = self.layout.pin(name);
            let Some(pinned_keg) = resolve_symlink(&pin).and_then(|t| Keg::from_path(self.layout, &t))
            else {
                continue;
            };
            let formula = self.store.find(name)?;
            let wanted = formula.keg_version(&formula.build_options(Options::new()));
            if pinned_keg.version() != wanted {
                return Err(Error::PinnedDependency {
                    name: name.to_string(),
                    pinned: pinned_keg.version().to_string(),
                    required: wanted,
                });
            }
        }
        Ok(())
    }

    /// Expand the plan for this install, also reporting edges that were
    /// skipped because their target is already installed
    fn compute_plan(
        &self,
        root: &Formula,
        opts: &BuildOptions,
    ) -> Result<(Vec<PlanEntry>, Vec<String>)> {
        let mut satisfied_names = Vec::new();
        let deps = graph::expand(root, self.store, |dependent, dep| {
            let is_root = dependent.name == root.name;
            let d_opts = if is_root {
                opts.clone()
            } else {
                dependent.build_options(Options::new())
            };
            let pours = pour_decision(
                dependent,
                &d_opts,
                self.layout,
                self.flags.build_from_source && is_root,
            )
            .pour();
            let decision = graph::standard_decision(
                dep,
                is_root,
                pours,
                &d_opts,
                self.flags.include_test,
                &|d| self.dependency_satisfied(d),
            );
            if decision == graph::Decision::Skip {
                satisfied_names.push(dep.name.clone());
            }
            decision
        })?;
        let plan = deps.into_iter().map(PlanEntry::new).collect();
        Ok((plan, satisfied_names))
    }

    /// An edge is satisfied when any keg of its target is installed
    fn dependency_satisfied(&self, dep: &Dependency) -> bool {
        Keg::any_installed(self.layout, &dep.name)
    }

    fn build_context<'b>(
        &'b self,
        formula: &Formula,
        opts: &'b BuildOptions,
        keg: &'b Keg,
    ) -> BuildContext<'b> {
        let mut env = HashMap::new();
        for dep in &formula.deps {
            if let Some(hook) = &dep.env_hook
                && Keg::any_installed(self.layout, &dep.name)
            {
                hook(&mut env);
            }
        }
        BuildContext {
            keg_path: keg.path(),
            layout: self.layout,
            options: opts,
            log_path: self.layout.build_log(&formula.name),
            env,
        }
    }

    fn make_receipt(
        &self,
        formula: &Formula,
        opts: &BuildOptions,
        keg: &Keg,
        poured: bool,
        build_secs: u64,
    ) -> InstallReceipt {
        let mut receipt = InstallReceipt::derive_from(keg);
        receipt.used_options = opts.used_options().iter().map(String::from).collect();
        receipt.poured_from_bottle = poured;
        receipt.built_as_bottle = false;
        receipt.build_time_seconds = build_secs;
        receipt.source = SourceIdentity {
            spec: opts.source_spec().to_string(),
            version: keg.version().to_string(),
        };
        receipt.runtime_dependencies = formula
            .runtime_deps()
            .map(|dep| {
                let version = Keg::installed_versions(self.layout, &dep.name)
                    .ok()
                    .and_then(|versions| versions.last().cloned())
                    .unwrap_or_default();
                RuntimeDependency {
                    name: dep.name.clone(),
                    version,
                }
            })
            .collect();
        receipt.installed_as_dependency = self.installed_as_dependency;
        receipt.installed_on_request = !self.installed_as_dependency;
        receipt
    }

    /// Delete the partial keg, its links, and its now-empty rack
    ///
    /// Runs on every failure before linking completed; never raises.
    fn rollback(&self, keg: &Keg) {
        if !keg.exists() {
            return;
        }
        warn!("rolling back partial install of {}", keg.spec());
        let linker = Linker::new(self.layout);
        if let Err(e) = linker.unlink(keg) {
            warn!("rollback: unlink of {} failed: {e}", keg.spec());
        }
        if let Err(e) = linker.unoptlink(keg) {
            warn!("rollback: removing opt alias of {} failed: {e}", keg.spec());
        }
        if let Err(e) = keg.remove() {
            warn!("rollback: removing keg {} failed: {e}", keg.spec());
        }
    }

    fn check_cancelled(&self, phase: &str) -> Result<()> {
        if let Some(cancel) = &self.cancel
            && cancel.load(Ordering::Relaxed)
        {
            return Err(Error::Cancelled(phase.to_string()));
        }
        Ok(())
    }
}

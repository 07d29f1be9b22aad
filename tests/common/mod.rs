// tests/common/mod.rs

//! Shared harness for integration tests
//!
//! Provides an in-memory formula store and scripted bottle/build
//! collaborators over a temporary prefix, so install flows run end to end
//! without any real downloads or compilers.

#![allow(dead_code)]

use cellar::bottle::current_platform;
use cellar::install::{BottleSource, BuildContext, BuildRunner};
use cellar::{
    BottleSpec, Dependency, Error, Formula, FormulaStore, InstallCache, InstallFlags,
    InstallOutcome, Installer, Layout, LockManager, Options, Result, Tag, Tags,
};
use semver::Version;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// (keg-relative path, content)
pub type FileSpec = (&'static str, &'static str);

/// In-memory formula store
#[derive(Default)]
pub struct MemoryStore {
    formulas: RefCell<HashMap<String, Arc<Formula>>>,
}

impl MemoryStore {
    pub fn add(&self, formula: Formula) {
        self.formulas
            .borrow_mut()
            .insert(formula.name.clone(), Arc::new(formula));
    }
}

impl FormulaStore for MemoryStore {
    fn find(&self, name: &str) -> Result<Arc<Formula>> {
        self.formulas
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::FormulaUnavailable(name.to_string()))
    }
}

/// Bottle source pouring scripted file lists, with optional one-shot failure
#[derive(Default)]
pub struct FakeBottles {
    files: RefCell<HashMap<String, Vec<(String, String)>>>,
    fail_once: RefCell<HashSet<String>>,
    pub poured: RefCell<Vec<String>>,
}

impl FakeBottles {
    pub fn stage(&self, name: &str, files: &[FileSpec]) {
        self.files.borrow_mut().insert(
            name.to_string(),
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        );
    }

    /// Make the next pour of `name` fail after leaving partial contents
    pub fn fail_next_pour(&self, name: &str) {
        self.fail_once.borrow_mut().insert(name.to_string());
    }
}

impl BottleSource for FakeBottles {
    fn pour(&self, formula: &Formula, keg_path: &Path) -> Result<()> {
        if self.fail_once.borrow_mut().remove(&formula.name) {
            // Leave debris so rollback/fallback cleanup is observable
            fs::write(keg_path.join("partial-pour"), b"junk")?;
            return Err(Error::PourFailed {
                formula: formula.name.clone(),
                reason: "checksum mismatch in staged artifact".to_string(),
            });
        }
        let files = self.files.borrow();
        let Some(list) = files.get(&formula.name) else {
            return Err(Error::PourFailed {
                formula: formula.name.clone(),
                reason: "no staged bottle".to_string(),
            });
        };
        write_files(keg_path, list)?;
        self.poured.borrow_mut().push(formula.name.clone());
        Ok(())
    }
}

/// Build runner writing scripted file lists, with per-formula failures
#[derive(Default)]
pub struct ScriptedBuilder {
    files: RefCell<HashMap<String, Vec<(String, String)>>>,
    fail: RefCell<HashSet<String>>,
    pub built: RefCell<Vec<String>>,
    pub post_installed: RefCell<Vec<String>>,
}

impl ScriptedBuilder {
    pub fn script(&self, name: &str, files: &[FileSpec]) {
        self.files.borrow_mut().insert(
            name.to_string(),
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        );
    }

    pub fn fail_build(&self, name: &str) {
        self.fail.borrow_mut().insert(name.to_string());
    }
}

impl BuildRunner for ScriptedBuilder {
    fn build(&self, formula: &Formula, ctx: &BuildContext) -> Result<()> {
        if let Some(parent) = ctx.log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.fail.borrow().contains(&formula.name) {
            fs::write(&ctx.log_path, "configure: error: something broke\n")?;
            return Err(Error::BuildFailed {
                formula: formula.name.clone(),
                step: "build".to_string(),
                log: ctx.log_path.clone(),
            });
        }
        fs::write(&ctx.log_path, "build ok\n")?;
        let files = self.files.borrow();
        let list = files.get(&formula.name).cloned().unwrap_or_else(|| {
            vec![(format!("bin/{}", formula.name), format!("#!{}", formula.name))]
        });
        write_files(ctx.keg_path, &list)?;
        self.built.borrow_mut().push(formula.name.clone());
        Ok(())
    }

    fn post_install(&self, formula: &Formula, _ctx: &BuildContext) -> Result<()> {
        self.post_installed.borrow_mut().push(formula.name.clone());
        Ok(())
    }
}

fn write_files(root: &Path, files: &[(String, String)]) -> Result<()> {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
    }
    Ok(())
}

/// One temporary prefix with every collaborator wired up
pub struct TestEnv {
    pub tmp: TempDir,
    pub layout: Layout,
    pub store: MemoryStore,
    pub bottles: FakeBottles,
    pub builder: ScriptedBuilder,
    pub locks: LockManager,
    pub cache: InstallCache,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path().join("prefix"));
        layout.ensure_dirs().unwrap();
        let locks = LockManager::new(layout.locks.clone());
        let cache = InstallCache::new();
        // The scripted builder needs no real toolchain; make the tool
        // probe deterministic regardless of the host
        cache.prime_tool("cc", Some(PathBuf::from("/usr/bin/cc")));
        cache.prime_tool("make", Some(PathBuf::from("/usr/bin/make")));
        Self {
            tmp,
            layout,
            store: MemoryStore::default(),
            bottles: FakeBottles::default(),
            builder: ScriptedBuilder::default(),
            locks,
            cache,
        }
    }

    pub fn installer(&self, flags: InstallFlags) -> Installer<'_> {
        Installer::new(
            &self.layout,
            flags,
            &self.store,
            &self.bottles,
            &self.builder,
            &self.locks,
            &self.cache,
        )
    }

    /// Install with default flags and no options
    pub fn install(&self, name: &str) -> Result<InstallOutcome> {
        self.installer(InstallFlags::default())
            .install(name, Options::new())
    }

    pub fn install_with(
        &self,
        name: &str,
        flags: InstallFlags,
        options: Options,
    ) -> Result<InstallOutcome> {
        self.installer(flags).install(name, options)
    }

    /// The computed plan for a formula, via a dry run
    pub fn plan(&self, name: &str, flags: InstallFlags, options: Options) -> Vec<String> {
        let flags = InstallFlags {
            dry_run: true,
            ..flags
        };
        match self.installer(flags).install(name, options) {
            Ok(InstallOutcome::DryRun { plan }) => plan,
            other => panic!("expected a dry-run plan, got {other:?}"),
        }
    }

    pub fn keg(&self, name: &str, version: &str) -> cellar::Keg {
        cellar::Keg::new(&self.layout, name, version)
    }
}

/// A formula with the given name and semver version string
pub fn formula(name: &str, version: &str) -> Formula {
    Formula::new(name, Version::parse(version).unwrap())
}

/// Attach a relocatable bottle for the current platform
pub fn bottled(mut f: Formula) -> Formula {
    f.bottle = Some(BottleSpec::relocatable(vec![current_platform()]));
    f
}

pub fn dep(name: &str) -> Dependency {
    Dependency::required(name)
}

pub fn tagged_dep(name: &str, tags: &[Tag]) -> Dependency {
    Dependency::new(name, Tags::from_tags(tags))
}

// src/catalog.rs

//! JSON formula catalog and process-backed collaborators
//!
//! The catalog is the concrete loader behind the [`FormulaStore`] seam:
//! formula definitions live as plain JSON files, one per formula, in a
//! catalog directory. Build and post-install entry points are recorded as
//! argv vectors and executed by [`ProcessRunner`] with output captured to a
//! retained log; bottles are staged directory trees unpacked (copied) into
//! the keg by [`StagedBottles`].

use crate::bottle::{BottleCellar, BottleSpec};
use crate::error::{Error, Result};
use crate::formula::{Dependency, Formula, FormulaStore, HookSpec, OptionDef, Tag, Tags};
use crate::install::{BottleSource, BuildContext, BuildRunner, Cleaner};
use crate::keg::Keg;
use semver::Version;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;
use walkdir::WalkDir;

/// Ceiling on one external build procedure
const BUILD_TIMEOUT: Duration = Duration::from_secs(3600);
/// Ceiling on one post-install hook
const POST_INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// One dependency edge as written in catalog JSON
#[derive(Debug, Deserialize)]
struct DependencyDef {
    name: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// One option as written in catalog JSON
#[derive(Debug, Deserialize)]
struct OptionDefJson {
    name: String,
    #[serde(default)]
    description: String,
}

/// Bottle descriptor as written in catalog JSON
#[derive(Debug, Deserialize)]
struct BottleDef {
    #[serde(default)]
    platforms: Vec<String>,
    /// `"any"` (default) or an exact cellar path the bottle requires
    #[serde(default)]
    cellar: Option<String>,
}

/// A formula definition file
#[derive(Debug, Deserialize)]
struct FormulaDef {
    name: String,
    version: String,
    #[serde(default)]
    revision: u32,
    #[serde(default)]
    head: bool,
    #[serde(default)]
    dependencies: Vec<DependencyDef>,
    #[serde(default)]
    options: Vec<OptionDefJson>,
    #[serde(default)]
    bottle: Option<BottleDef>,
    #[serde(default)]
    build: Option<Vec<String>>,
    #[serde(default)]
    post_install: Option<Vec<String>>,
}

impl FormulaDef {
    fn into_formula(self) -> Result<Formula> {
        let version = Version::parse(&self.version).map_err(|e| {
            Error::other(format!(
                "formula {} has unparseable version {}: {e}",
                self.name, self.version
            ))
        })?;
        let mut formula = Formula::new(self.name.clone(), version);
        formula.revision = self.revision;
        formula.head_available = self.head;

        for dep in self.dependencies {
            let mut tags = Tags::none();
            for tag in &dep.tags {
                let parsed = Tag::from_str(tag).map_err(|_| {
                    Error::other(format!(
                        "formula {} dependency {} has unknown tag {tag}",
                        self.name, dep.name
                    ))
                })?;
                tags.insert(parsed);
            }
            formula.deps.push(Dependency::new(dep.name, tags));
        }

        for opt in self.options {
            formula.options.push(OptionDef::new(opt.name, opt.description));
        }

        if let Some(bottle) = self.bottle {
            let cellar = match bottle.cellar.as_deref() {
                None | Some("any") => BottleCellar::Any,
                Some(path) => BottleCellar::Fixed(PathBuf::from(path)),
            };
            formula.bottle = Some(BottleSpec {
                platforms: bottle.platforms,
                cellar,
            });
        }

        formula.build = self.build.map(HookSpec::new);
        formula.post_install = self.post_install.map(HookSpec::new);
        Ok(formula)
    }
}

/// Formula store reading `<catalog>/<name>.json` definitions
pub struct JsonCatalog {
    dir: PathBuf,
    loaded: RefCell<HashMap<String, Arc<Formula>>>,
}

impl JsonCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loaded: RefCell::new(HashMap::new()),
        }
    }

    /// Names of every formula present in the catalog directory
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.dir.is_dir() {
            return Ok(names);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl FormulaStore for JsonCatalog {
    fn find(&self, name: &str) -> Result<Arc<Formula>> {
        if let Some(formula) = self.loaded.borrow().get(name) {
            return Ok(formula.clone());
        }
        let path = self.dir.join(format!("{name}.json"));
        let data =
            fs::read_to_string(&path).map_err(|_| Error::FormulaUnavailable(name.to_string()))?;
        let def: FormulaDef = serde_json::from_str(&data)?;
        if def.name != name {
            return Err(Error::other(format!(
                "formula file {} declares name {}",
                path.display(),
                def.name
            )));
        }
        let formula = Arc::new(def.into_formula()?);
        self.loaded
            .borrow_mut()
            .insert(name.to_string(), formula.clone());
        Ok(formula)
    }
}

/// Bottle source backed by pre-verified staged directory trees
///
/// The fetch collaborator leaves each artifact unpacked at
/// `<dir>/<name>-<keg version>/`; pouring copies that tree into the keg.
pub struct StagedBottles {
    dir: PathBuf,
}

impl StagedBottles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn staged_path(&self, formula: &Formula, keg_path: &Path) -> PathBuf {
        let keg_version = keg_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("unknown");
        self.dir.join(format!("{}-{keg_version}", formula.name))
    }
}

impl BottleSource for StagedBottles {
    fn pour(&self, formula: &Formula, keg_path: &Path) -> Result<()> {
        let staged = self.staged_path(formula, keg_path);
        if !staged.is_dir() {
            return Err(Error::PourFailed {
                formula: formula.name.clone(),
                reason: format!("no staged bottle at {}", staged.display()),
            });
        }
        copy_tree(&staged, keg_path)?;
        debug!("poured {} from {}", formula.name, staged.display());
        Ok(())
    }
}

/// Copy a directory tree, preserving symlinks and permissions
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| Error::other(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::other(e.to_string()))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            std::os::unix::fs::symlink(link, &target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Executes build and post-install argv hooks in a subprocess
///
/// Output is captured to the context's log path, which is retained on
/// failure and named in the error. Hooks run with the keg as working
/// directory and the layout exported through the environment.
pub struct ProcessRunner;

impl ProcessRunner {
    fn run_hook(
        &self,
        formula: &Formula,
        hook: &HookSpec,
        ctx: &BuildContext,
        step: &str,
        timeout: Duration,
    ) -> Result<()> {
        let Some((program, args)) = hook.argv.split_first() else {
            return Err(Error::other(format!(
                "formula {} has an empty {step} procedure",
                formula.name
            )));
        };
        if let Some(parent) = ctx.log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let log = File::create(&ctx.log_path)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(ctx.keg_path)
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .env("CELLAR_PREFIX", &ctx.layout.prefix)
            .env("CELLAR_KEG", ctx.keg_path)
            .env("CELLAR_FORMULA", &formula.name)
            .env("CELLAR_OPTS", ctx.options.used_options().to_string());
        for (key, value) in &ctx.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| Error::BuildFailed {
            formula: formula.name.clone(),
            step: format!("{step} spawn: {e}"),
            log: ctx.log_path.clone(),
        })?;

        let status = match child.wait_timeout(timeout)? {
            Some(status) => status,
            None => {
                child.kill()?;
                child.wait()?;
                return Err(Error::BuildFailed {
                    formula: formula.name.clone(),
                    step: format!("{step} (timed out after {}s)", timeout.as_secs()),
                    log: ctx.log_path.clone(),
                });
            }
        };

        if !status.success() {
            return Err(Error::BuildFailed {
                formula: formula.name.clone(),
                step: step.to_string(),
                log: ctx.log_path.clone(),
            });
        }
        Ok(())
    }
}

impl BuildRunner for ProcessRunner {
    fn build(&self, formula: &Formula, ctx: &BuildContext) -> Result<()> {
        let Some(hook) = &formula.build else {
            return Err(Error::BuildFailed {
                formula: formula.name.clone(),
                step: "build (no build procedure declared)".to_string(),
                log: ctx.log_path.clone(),
            });
        };
        self.run_hook(formula, hook, ctx, "build", BUILD_TIMEOUT)
    }

    fn post_install(&self, formula: &Formula, ctx: &BuildContext) -> Result<()> {
        let Some(hook) = &formula.post_install else {
            return Ok(());
        };
        self.run_hook(formula, hook, ctx, "post-install", POST_INSTALL_TIMEOUT)
    }
}

/// Names that never belong in a finished keg
const REDUNDANT_FILES: &[&str] = &[".DS_Store", "perllocal.pod"];

/// Strips known-redundant files and empty directories from a keg
pub struct StandardCleaner;

impl Cleaner for StandardCleaner {
    fn clean(&self, keg: &Keg) -> Result<()> {
        let mut removed = 0usize;
        for entry in WalkDir::new(keg.path()).min_depth(1) {
            let entry = entry.map_err(|e| Error::other(e.to_string()))?;
            if entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| REDUNDANT_FILES.contains(&name))
            {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        for entry in WalkDir::new(keg.path()).min_depth(1).contents_first(true) {
            let entry = entry.map_err(|e| Error::other(e.to_string()))?;
            if entry.file_type().is_dir() {
                // Leaves non-empty directories alone
                let _ = fs::remove_dir(entry.path());
            }
        }
        if removed > 0 {
            debug!("cleaned {removed} redundant files from {}", keg.spec());
        }
        Ok(())
    }
}

/// Build-options helper for command-line `--with-x`/`--without-y` flags
pub fn options_from_flags(with: &[String], without: &[String], head: bool) -> crate::Options {
    let mut options = crate::Options::new();
    for name in with {
        options.insert(format!("with-{name}"));
    }
    for name in without {
        options.insert(format!("without-{name}"));
    }
    if head {
        options.insert("HEAD");
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_formula(dir: &Path, name: &str, json: &str) {
        fs::write(dir.join(format!("{name}.json")), json).unwrap();
    }

    #[test]
    fn test_catalog_loads_and_memoizes() {
        let tmp = TempDir::new().unwrap();
        write_formula(
            tmp.path(),
            "jq",
            r#"{
                "name": "jq",
                "version": "1.7.1",
                "dependencies": [{"name": "oniguruma"}],
                "bottle": {"platforms": ["linux-x86_64"]},
                "build": ["sh", "-c", "true"]
            }"#,
        );
        let catalog = JsonCatalog::new(tmp.path());

        let jq = catalog.find("jq").unwrap();
        assert_eq!(jq.version, Version::new(1, 7, 1));
        assert_eq!(jq.deps.len(), 1);
        assert!(jq.deps[0].tags.required());
        assert!(jq.bottle.is_some());

        let again = catalog.find("jq").unwrap();
        assert!(Arc::ptr_eq(&jq, &again));
    }

    #[test]
    fn test_catalog_parses_tags() {
        let tmp = TempDir::new().unwrap();
        write_formula(
            tmp.path(),
            "curl",
            r#"{
                "name": "curl",
                "version": "8.9.0",
                "dependencies": [
                    {"name": "cmake", "tags": ["build"]},
                    {"name": "brotli", "tags": ["optional"]},
                    {"name": "openssl", "tags": ["recommended"]}
                ]
            }"#,
        );
        let catalog = JsonCatalog::new(tmp.path());
        let curl = catalog.find("curl").unwrap();
        assert!(curl.deps[0].tags.build);
        assert!(curl.deps[1].tags.optional);
        assert!(curl.deps[2].tags.recommended);
    }

    #[test]
    fn test_unknown_formula() {
        let tmp = TempDir::new().unwrap();
        let catalog = JsonCatalog::new(tmp.path());
        let err = catalog.find("nope").unwrap_err();
        assert!(matches!(err, Error::FormulaUnavailable(name) if name == "nope"));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let tmp = TempDir::new().unwrap();
        write_formula(
            tmp.path(),
            "odd",
            r#"{"name": "odd", "version": "1.0.0",
                "dependencies": [{"name": "x", "tags": ["sideways"]}]}"#,
        );
        let catalog = JsonCatalog::new(tmp.path());
        assert!(catalog.find("odd").is_err());
    }

    #[test]
    fn test_names_listing() {
        let tmp = TempDir::new().unwrap();
        write_formula(tmp.path(), "b", r#"{"name": "b", "version": "1.0.0"}"#);
        write_formula(tmp.path(), "a", r#"{"name": "a", "version": "1.0.0"}"#);
        let catalog = JsonCatalog::new(tmp.path());
        assert_eq!(catalog.names().unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_options_from_flags() {
        let opts = options_from_flags(
            &["docs".to_string()],
            &["ssl".to_string()],
            true,
        );
        assert!(opts.contains("with-docs"));
        assert!(opts.contains("without-ssl"));
        assert!(opts.contains("HEAD"));
    }

    #[test]
    fn test_copy_tree_preserves_structure() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(src.join("bin")).unwrap();
        fs::write(src.join("bin/tool"), b"#!tool").unwrap();
        std::os::unix::fs::symlink("tool", src.join("bin/alias")).unwrap();
        fs::create_dir_all(&dst).unwrap();

        copy_tree(&src, &dst).unwrap();
        assert_eq!(fs::read(dst.join("bin/tool")).unwrap(), b"#!tool");
        assert_eq!(
            fs::read_link(dst.join("bin/alias")).unwrap(),
            PathBuf::from("tool")
        );
    }
}

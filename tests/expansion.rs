// tests/expansion.rs

//! Plan computation through the installer: pruning driven by artifact
//! decisions and options, and dependency-before-dependent ordering.

mod common;

use cellar::{Error, InstallFlags, Options, Tag};
use common::*;

/// A requires B at runtime and C at build time. A source build needs both;
/// a bottle install prunes C (binaries need no build tools).
#[test]
fn test_build_deps_follow_artifact_decision() {
    let env = TestEnv::new();
    let mut a = formula("a", "1.0.0");
    a.deps.push(dep("b"));
    a.deps.push(tagged_dep("c", &[Tag::Build]));
    env.store.add(bottled(a));
    env.store.add(formula("b", "1.0.0"));
    env.store.add(formula("c", "1.0.0"));

    // Source build: plan is [b, c] before a
    let source = env.plan(
        "a",
        InstallFlags {
            build_from_source: true,
            ..Default::default()
        },
        Options::new(),
    );
    assert_eq!(source, ["b", "c"]);

    // Bottle install: c is pruned
    let poured = env.plan("a", InstallFlags::default(), Options::new());
    assert_eq!(poured, ["b"]);
}

/// Optional dependencies join the plan only when requested.
#[test]
fn test_optional_dep_requires_flag() {
    let env = TestEnv::new();
    let mut a = formula("a", "1.0.0");
    a.deps.push(tagged_dep("d", &[Tag::Optional]));
    env.store.add(a);
    env.store.add(formula("d", "1.0.0"));

    let bare = env.plan("a", InstallFlags::default(), Options::new());
    assert!(bare.is_empty());

    let with_d = env.plan(
        "a",
        InstallFlags::default(),
        ["with-d"].into_iter().collect(),
    );
    assert_eq!(with_d, ["d"]);
}

/// Recommended dependencies are in by default and leave with `without-`.
#[test]
fn test_recommended_dep_default_on() {
    let env = TestEnv::new();
    let mut a = formula("a", "1.0.0");
    a.deps.push(tagged_dep("ssl", &[Tag::Recommended]));
    env.store.add(a);
    env.store.add(formula("ssl", "3.0.0"));

    assert_eq!(
        env.plan("a", InstallFlags::default(), Options::new()),
        ["ssl"]
    );
    assert!(env
        .plan(
            "a",
            InstallFlags::default(),
            ["without-ssl"].into_iter().collect()
        )
        .is_empty());
}

/// Dependency-before-dependent holds along a chain.
#[test]
fn test_chain_ordering() {
    let env = TestEnv::new();
    let mut a = formula("a", "1.0.0");
    a.deps.push(dep("b"));
    let mut b = formula("b", "1.0.0");
    b.deps.push(dep("c"));
    let mut c = formula("c", "1.0.0");
    c.deps.push(dep("d"));
    env.store.add(a);
    env.store.add(b);
    env.store.add(c);
    env.store.add(formula("d", "1.0.0"));

    let plan = env.plan("a", InstallFlags::default(), Options::new());
    assert_eq!(plan, ["d", "c", "b"]);
}

/// Test-only edges are followed for the requested formula only, and only
/// when asked for.
#[test]
fn test_test_deps_one_level() {
    let env = TestEnv::new();
    let mut a = formula("a", "1.0.0");
    a.deps.push(dep("b"));
    a.deps.push(tagged_dep("check", &[Tag::Test]));
    let mut b = formula("b", "1.0.0");
    b.deps.push(tagged_dep("check-inner", &[Tag::Test]));
    env.store.add(a);
    env.store.add(b);
    env.store.add(formula("check", "1.0.0"));
    env.store.add(formula("check-inner", "1.0.0"));

    let bare = env.plan("a", InstallFlags::default(), Options::new());
    assert_eq!(bare, ["b"]);

    let with_test = env.plan(
        "a",
        InstallFlags {
            include_test: true,
            ..Default::default()
        },
        Options::new(),
    );
    assert!(with_test.contains(&"check".to_string()));
    // The inner dependency's test edge never joins
    assert!(!with_test.contains(&"check-inner".to_string()));
}

/// A declared cycle is refused structurally with no partial plan.
#[test]
fn test_cycle_is_structural_error() {
    let env = TestEnv::new();
    let mut a = formula("a", "1.0.0");
    a.deps.push(dep("b"));
    let mut b = formula("b", "1.0.0");
    b.deps.push(dep("a"));
    env.store.add(a);
    env.store.add(b);

    let err = env.install("a").unwrap_err();
    assert!(err.is_structural(), "expected structural error, got {err:?}");
    assert!(matches!(err, Error::CyclicDependency { .. }));
    // Zero mutation
    assert!(cellar::Keg::all_installed(&env.layout).unwrap().is_empty());
    assert_eq!(env.locks.held_count(), 0);
}

#[test]
fn test_self_dependency_refused() {
    let env = TestEnv::new();
    let mut a = formula("a", "1.0.0");
    a.deps.push(dep("a"));
    env.store.add(a);

    let err = env.install("a").unwrap_err();
    assert!(matches!(err, Error::SelfDependency(name) if name == "a"));
}

/// Already-satisfied targets are skipped, not planned again.
#[test]
fn test_installed_dep_skipped() {
    let env = TestEnv::new();
    let mut a = formula("a", "1.0.0");
    a.deps.push(dep("b"));
    env.store.add(a);
    env.store.add(formula("b", "1.0.0"));

    // b is already in the cellar
    std::fs::create_dir_all(env.keg("b", "1.0.0").path()).unwrap();

    let plan = env.plan("a", InstallFlags::default(), Options::new());
    assert!(plan.is_empty());
}

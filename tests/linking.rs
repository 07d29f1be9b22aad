// tests/linking.rs

//! Link conflicts through the full install flow: the keg survives, the
//! conflict names its owner, and overwrite mode backs up what it displaces.

mod common;

use cellar::link::{resolve_symlink, Linker};
use cellar::{InstallFlags, InstallOutcome, Options};
use common::*;
use std::fs;

/// Installing a formula whose `bin/tool` is already owned by another keg
/// finishes installed-but-unlinked with a warning naming the owner; retrying
/// with overwrite displaces the old link after backing it up.
#[test]
fn test_conflicting_install_keeps_keg_unlinked() {
    let env = TestEnv::new();
    env.store.add(formula("z", "2.0.0"));
    env.builder.script("z", &[("bin/tool", "#!z")]);
    env.install("z").unwrap();

    env.store.add(formula("a", "1.0.0"));
    env.builder.script("a", &[("bin/tool", "#!a")]);
    let outcome = env.install("a").unwrap();

    let keg = match outcome {
        InstallOutcome::Installed {
            keg,
            linked,
            warnings,
            ..
        } => {
            assert!(!linked, "conflicting install must not be linked");
            assert!(
                warnings.iter().any(|w| w.contains("z/2.0.0")),
                "warnings should name the owning keg: {warnings:?}"
            );
            keg
        }
        other => panic!("expected Installed, got {other:?}"),
    };

    // The keg is on disk and reachable through its opt alias
    assert!(keg.exists());
    assert!(keg.opt_linked(&env.layout));
    assert!(!keg.linked(&env.layout));

    // bin/tool still belongs to z
    let tool = env.layout.prefix.join("bin/tool");
    assert!(resolve_symlink(&tool)
        .unwrap()
        .starts_with(env.keg("z", "2.0.0").path()));

    // Retry with overwrite: z's link is backed up, a takes over
    let linker = Linker::new(&env.layout);
    linker.link(&keg, true).unwrap();
    assert!(resolve_symlink(&tool).unwrap().starts_with(keg.path()));
    assert!(
        fs::read_dir(&env.layout.backups).unwrap().next().is_some(),
        "displaced link must be backed up"
    );
}

/// Overwrite mode at install time links through the conflict directly.
#[test]
fn test_install_with_overwrite_links() {
    let env = TestEnv::new();
    env.store.add(formula("z", "2.0.0"));
    env.builder.script("z", &[("bin/tool", "#!z")]);
    env.install("z").unwrap();

    env.store.add(formula("a", "1.0.0"));
    env.builder.script("a", &[("bin/tool", "#!a")]);
    let outcome = env
        .install_with(
            "a",
            InstallFlags {
                overwrite: true,
                ..Default::default()
            },
            Options::new(),
        )
        .unwrap();

    match outcome {
        InstallOutcome::Installed { keg, linked, .. } => {
            assert!(linked);
            let tool = env.layout.prefix.join("bin/tool");
            assert!(resolve_symlink(&tool).unwrap().starts_with(keg.path()));
        }
        other => panic!("expected Installed, got {other:?}"),
    }
}

/// Linking the same keg twice changes nothing the second time.
#[test]
fn test_relink_idempotent() {
    let env = TestEnv::new();
    env.store.add(formula("a", "1.0.0"));
    env.builder
        .script("a", &[("bin/a", "#!a"), ("share/man/man1/a.1", "man")]);
    env.install("a").unwrap();

    let keg = env.keg("a", "1.0.0");
    let linker = Linker::new(&env.layout);
    let report = linker.link(&keg, false).unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.already, 2);
    assert!(keg.linked(&env.layout));
}

/// Unlink removes exactly this keg's links; a later link restores them.
#[test]
fn test_unlink_and_relink_round_trip() {
    let env = TestEnv::new();
    env.store.add(formula("a", "1.0.0"));
    env.store.add(formula("b", "1.0.0"));
    env.builder.script("a", &[("bin/a", "#!a")]);
    env.builder.script("b", &[("bin/b", "#!b")]);
    env.install("a").unwrap();
    env.install("b").unwrap();

    let keg = env.keg("a", "1.0.0");
    let linker = Linker::new(&env.layout);
    let removed = linker.unlink(&keg).unwrap();
    assert_eq!(removed, 1);
    assert!(!env.layout.prefix.join("bin/a").exists());
    assert!(env.layout.prefix.join("bin/b").is_symlink());

    linker.link(&keg, false).unwrap();
    assert!(env.layout.prefix.join("bin/a").is_symlink());
}

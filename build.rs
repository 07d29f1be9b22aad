// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: shared prefix directory
fn prefix_arg() -> Arg {
    Arg::new("prefix")
        .short('p')
        .long("prefix")
        .value_name("DIR")
        .help("Shared prefix directory")
}

fn build_cli() -> Command {
    Command::new("cellar")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Cellar Contributors")
        .about("Keg-based package installer with bottle pouring and conflict-aware linking")
        .subcommand_required(false)
        .subcommand(
            Command::new("install")
                .about("Install a formula and everything it depends on")
                .arg(Arg::new("formula").required(true).help("Formula name"))
                .arg(prefix_arg())
                .arg(
                    Arg::new("build_from_source")
                        .short('s')
                        .long("build-from-source")
                        .action(clap::ArgAction::SetTrue)
                        .help("Build from source even when a bottle is available"),
                )
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(clap::ArgAction::SetTrue)
                        .help("Show the computed plan without making changes"),
                ),
        )
        .subcommand(
            Command::new("uninstall")
                .about("Remove an installed keg and its links")
                .arg(Arg::new("formula").required(true).help("Formula name"))
                .arg(prefix_arg()),
        )
        .subcommand(
            Command::new("link")
                .about("Link an installed keg into the shared prefix")
                .arg(Arg::new("formula").required(true).help("Formula name"))
                .arg(prefix_arg()),
        )
        .subcommand(
            Command::new("unlink")
                .about("Remove a keg's links from the shared prefix")
                .arg(Arg::new("formula").required(true).help("Formula name"))
                .arg(prefix_arg()),
        )
        .subcommand(
            Command::new("pin")
                .about("Pin a formula to its currently installed version")
                .arg(Arg::new("formula").required(true).help("Formula name"))
                .arg(prefix_arg()),
        )
        .subcommand(
            Command::new("unpin")
                .about("Remove a formula's pin")
                .arg(Arg::new("formula").required(true).help("Formula name"))
                .arg(prefix_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List installed kegs")
                .arg(Arg::new("formula").help("Formula name (optional)"))
                .arg(prefix_arg()),
        )
        .subcommand(
            Command::new("info")
                .about("Show catalog and install information for a formula")
                .arg(Arg::new("formula").required(true).help("Formula name"))
                .arg(prefix_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("cellar.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }
}

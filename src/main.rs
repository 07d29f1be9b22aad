// src/main.rs

use anyhow::Result;
use cellar::cli::{Cli, Commands};
use cellar::commands;
use cellar::config::InstallFlags;
use clap::{CommandFactory, Parser};
use clap_complete::generate;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Install {
            formula,
            prefix,
            catalog,
            with,
            without,
            head,
            build_from_source,
            force_bottle,
            ignore_deps,
            only_deps,
            include_test,
            overwrite,
            dry_run,
            verbose,
        }) => {
            let flags = InstallFlags {
                verbose,
                debug: false,
                force_bottle,
                build_from_source,
                ignore_deps,
                only_deps,
                include_test,
                overwrite,
                dry_run,
                interactive: false,
            };
            commands::cmd_install(&formula, prefix, catalog, with, without, head, flags)
        }
        Some(Commands::Uninstall {
            formula,
            version,
            prefix,
        }) => commands::cmd_uninstall(&formula, version, prefix),
        Some(Commands::Link {
            formula,
            version,
            overwrite,
            prefix,
        }) => commands::cmd_link(&formula, version, overwrite, prefix),
        Some(Commands::Unlink { formula, prefix }) => commands::cmd_unlink(&formula, prefix),
        Some(Commands::Pin { formula, prefix }) => commands::cmd_pin(&formula, prefix),
        Some(Commands::Unpin { formula, prefix }) => commands::cmd_unpin(&formula, prefix),
        Some(Commands::List { formula, prefix }) => commands::cmd_list(formula, prefix),
        Some(Commands::Info {
            formula,
            prefix,
            catalog,
        }) => commands::cmd_info(&formula, prefix, catalog),
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "cellar", &mut std::io::stdout());
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

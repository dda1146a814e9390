// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use extension_migrator::{MigrationOptions, Migrator};
use std::process::ExitCode;
use tracing::{error, info};

mod cli;

use cli::Cli;

fn main() -> ExitCode {
    // Usage problems print the usage text and exit cleanly
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Migration failed: {}", e);
            for cause in e.chain().skip(1) {
                error!("  caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let options = match &cli.config {
        Some(path) => MigrationOptions::from_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => MigrationOptions::default(),
    };
    let migrator = Migrator::new(options);

    if cli.dry_run {
        let report = migrator
            .plan(&cli.source)
            .with_context(|| format!("Failed to migrate {}", cli.source.display()))?;
        println!("Replay plan for module '{}':", report.module.name);
        for (position, entry) in report.plan.iter().enumerate() {
            println!("  {:>3}. {}", position + 1, entry);
        }
        return Ok(());
    }

    info!(
        "Migrating {} to {}",
        cli.source.display(),
        cli.target.display()
    );
    let report = migrator
        .migrate(&cli.source, &cli.target)
        .with_context(|| format!("Failed to migrate {}", cli.source.display()))?;

    let summary = report.written.unwrap_or_default();
    println!(
        "Migrated {} instructions of module '{}' into {} documents ({} resource files copied)",
        report.plan.len(),
        report.module.name,
        summary.documents,
        summary.files_copied
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "extension-migrator",
            "src",
            "out",
            "--config",
            "migrate.toml",
            "-v",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.source.to_str(), Some("src"));
        assert_eq!(cli.target.to_str(), Some("out"));
        assert_eq!(cli.config.as_deref().and_then(|p| p.to_str()), Some("migrate.toml"));
        assert!(cli.verbose);
        assert!(cli.dry_run);
    }

    #[test]
    fn test_cli_rejects_wrong_argument_count() {
        assert!(Cli::try_parse_from(["extension-migrator", "src"]).is_err());
        assert!(Cli::try_parse_from(["extension-migrator", "a", "b", "c"]).is_err());
    }
}

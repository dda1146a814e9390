// src/cli.rs
//! CLI definitions for the extension migrator

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "extension-migrator")]
#[command(author = "Extension Migrator Contributors")]
#[command(version)]
#[command(
    about = "Migrate a hippoecm-extension.xml bootstrap descriptor to ordered YAML documents",
    long_about = None
)]
pub struct Cli {
    /// Directory holding the extension descriptor
    pub source: PathBuf,

    /// Directory to write the migrated module to (replaced if it exists)
    pub target: PathBuf,

    /// Migration options file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the replay plan without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

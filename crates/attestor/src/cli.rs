use clap::Parser;
use std::path::PathBuf;

/// Compile, validate, execute, and record one control against one manifest.
#[derive(Debug, Parser)]
#[command(name = "attestor", version, about)]
pub struct Cli {
    /// Path to the Control Specification document (JSON).
    #[arg(long)]
    pub specification: PathBuf,

    /// Path to the Evidence Manifest document (JSON).
    #[arg(long)]
    pub manifest: PathBuf,

    /// Path to the attestor TOML config file.
    #[arg(long, default_value = "attestor.toml")]
    pub config: PathBuf,

    /// Print the compiled SQL and exit without executing.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit debug-level logs to stderr as well as the log file.
    #[arg(long, short)]
    pub verbose: bool,
}

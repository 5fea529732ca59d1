//! Command-line interface definitions for pcdtool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Platform PCD preprocessing driver.
#[derive(Parser)]
#[command(name = "pcdtool", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to `pcd.toml` (default: search upwards from the current directory).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Platform description to load (overrides `[platform] description`).
    #[arg(long, short = 'p', global = true)]
    pub platform: Option<PathBuf>,

    /// Stop at the first PCD error instead of reporting all of them.
    #[arg(long, global = true)]
    pub fail_fast: bool,

    /// Suppress progress output; show only errors and the final summary.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output with per-token decisions and timings.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Preprocess the platform and report any PCD errors.
    Check,
    /// Write the PCD memory database dump.
    Dump(DumpArgs),
    /// Show the PEI/DXE split of dynamic PCDs with local token numbers.
    Partition,
    /// List every module that produces or consumes a PCD.
    Modules,
    /// Generate the PCD sections of AutoGen.h and AutoGen.c.
    Autogen(AutogenArgs),
}

/// Arguments for the `dump` subcommand.
#[derive(Parser)]
pub struct DumpArgs {
    /// Output file (default: `[output] dump-file`; JSON goes to stdout).
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Emit JSON instead of the plain-text dump.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `autogen` subcommand.
#[derive(Parser)]
pub struct AutogenArgs {
    /// Module to generate for (case-insensitive).
    #[arg(long, short = 'm', conflicts_with = "all", required_unless_present = "all")]
    pub module: Option<String>,

    /// Generate for every module in the database.
    #[arg(long)]
    pub all: bool,

    /// Generate library-instance declarations (externs only).
    #[arg(long)]
    pub library: bool,

    /// Output directory (default: `<[output] dir>/autogen`).
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

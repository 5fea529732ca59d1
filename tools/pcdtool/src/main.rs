//! Platform PCD preprocessing driver.
//!
//! Loads a platform description, builds the PCD memory database, and runs
//! one of the database consumers: a consistency check, the diagnostic dump,
//! the PEI/DXE partition report, or AutoGen generation.
//!
//! Pipeline: locate pcd.toml → load platform description → preprocess →
//!           run subcommand.

mod autogen;
mod cli;
mod config;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pcd_core::verbose::{self, Timer};
use pcd_core::{
    AutogenTarget, MemoryDatabase, PreprocessSummary, Token, dprintln,
    init_pcd_memory_db_with_platform_info,
};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    verbose::init(cli.quiet, cli.verbose);

    match cli.command {
        cli::Command::Check => cmd_check(&cli),
        cli::Command::Dump(ref args) => cmd_dump(&cli, args),
        cli::Command::Partition => cmd_partition(&cli),
        cli::Command::Modules => cmd_modules(&cli),
        cli::Command::Autogen(ref args) => cmd_autogen(&cli, args),
    }
}

// ===========================================================================
// Database loading
// ===========================================================================

/// Resolve configuration, load the platform and preprocess it.
fn load_database(cli: &cli::Cli) -> Result<(config::Config, MemoryDatabase, PreprocessSummary)> {
    let config = config::Config::load(cli)?;
    if verbose::is_verbose() {
        config::print_resolved(&config);
    }

    dprintln!("Loading {}...", config.platform.display());
    let platform = {
        let _t = Timer::start("platform load");
        config::load_platform(&config.platform)?
    };

    let mut db = MemoryDatabase::new();
    let summary = init_pcd_memory_db_with_platform_info(&mut db, &platform, config.error_policy)
        .with_context(|| format!("PCD preprocessing of {} failed", config.platform.display()))?;
    Ok((config, db, summary))
}

/// Tokens sorted by primary key, for stable output.
fn sorted_tokens(db: &MemoryDatabase) -> Vec<&Token> {
    let mut tokens = db.record_array();
    tokens.sort_by_key(|t| t.primary_key());
    tokens
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

// ===========================================================================
// Commands
// ===========================================================================

/// Preprocess and report.
fn cmd_check(cli: &cli::Cli) -> Result<()> {
    let (_config, _db, summary) = load_database(cli)?;
    println!(
        "PCD check passed: {} token(s) from {} module(s), {} usage(s)",
        summary.tokens, summary.modules, summary.usages
    );
    if summary.unreferenced_dynamic_ex > 0 {
        println!(
            "  {} DYNAMIC_EX PCD(s) declared without any module reference",
            summary.unreferenced_dynamic_ex
        );
    }
    Ok(())
}

/// Write the text dump, or JSON with `--json`.
fn cmd_dump(cli: &cli::Cli, args: &cli::DumpArgs) -> Result<()> {
    let (config, db, _summary) = load_database(cli)?;

    if args.json {
        let json = serde_json::to_string_pretty(&sorted_tokens(&db))
            .context("Failed to serialize the PCD database")?;
        match &args.output {
            Some(path) => {
                create_parent_dir(path)?;
                std::fs::write(path, json + "\n")
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote JSON dump of {} token(s) to {}", db.len(), path.display());
            }
            None => println!("{json}"),
        }
        return Ok(());
    }

    let path = args.output.as_deref().unwrap_or(config.dump_file.as_path());
    create_parent_dir(path)?;
    db.dump_all_records(path);
    dprintln!("Dumped {} token(s) to {}", db.len(), path.display());
    Ok(())
}

/// Print the PEI and DXE dynamic PCD databases.
fn cmd_partition(cli: &cli::Cli) -> Result<()> {
    let (_config, db, _summary) = load_database(cli)?;
    let (pei, dxe) = db.two_phase_dynamic_record_array();

    for (label, tokens) in [("PEI", &pei), ("DXE", &dxe)] {
        println!("{label} PCD database ({} token(s)):", tokens.len());
        for token in tokens {
            let local = token
                .local_token_number
                .map_or_else(|| "-".to_string(), |n| n.to_string());
            println!(
                "  [{local:>3}] {:<40} {:<10} {:<7} token {:#x}",
                token.cname, token.pcd_type, token.datum_type, token.token_number
            );
        }
    }
    Ok(())
}

/// List every module that uses a PCD.
fn cmd_modules(cli: &cli::Cli) -> Result<()> {
    let (_config, db, _summary) = load_database(cli)?;
    for name in db.all_module_names() {
        let count = db.usage_instances_by_module_name(&name).len();
        println!("{name} ({count} PCD(s))");
    }
    Ok(())
}

/// Generate AutoGen.h / AutoGen.c PCD sections.
fn cmd_autogen(cli: &cli::Cli, args: &cli::AutogenArgs) -> Result<()> {
    let (config, db, _summary) = load_database(cli)?;

    let target = if args.library {
        AutogenTarget::Library
    } else {
        AutogenTarget::Module
    };
    let modules = match (&args.module, args.all) {
        (_, true) => db.all_module_names(),
        (Some(name), false) => vec![name.clone()],
        (None, false) => bail!("pass --module NAME or --all"),
    };
    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| config.output_dir.join("autogen"));

    let _t = Timer::start("autogen");
    for name in &modules {
        let generated = autogen::render_module(&db, name, target)?;
        let dir = autogen::write_module(&out_dir, &generated)?;
        dprintln!("  {}: {} PCD(s) -> {}", generated.module, generated.pcd_count, dir.display());
    }
    println!("Generated PCD autogen for {} module(s) in {}", modules.len(), out_dir.display());
    Ok(())
}

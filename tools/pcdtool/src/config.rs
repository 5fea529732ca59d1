//! Tool configuration from `pcd.toml` and the platform description.
//!
//! `pcd.toml` marks the project root. Every path in it is relative to that
//! root; command-line flags override its values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use pcd_core::{ErrorPolicy, PlatformDescription};
use serde::Deserialize;

use crate::cli::Cli;

/// Name of the configuration file that marks a project root.
pub const CONFIG_FILE: &str = "pcd.toml";

const DEFAULT_OUTPUT_DIR: &str = "build/pcd";
const DEFAULT_DUMP_FILE: &str = "PcdDatabase.txt";

/// On-disk layout of `pcd.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    platform: PlatformSection,
    #[serde(default)]
    preprocess: PreprocessSection,
    #[serde(default)]
    output: OutputSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PlatformSection {
    /// Platform description, relative to the project root.
    description: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PreprocessSection {
    error_policy: Option<ErrorPolicy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct OutputSection {
    dir: Option<PathBuf>,
    dump_file: Option<PathBuf>,
}

/// Fully resolved tool configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `pcd.toml` (or the current directory without one).
    pub project_root: PathBuf,
    /// Platform description to preprocess.
    pub platform: PathBuf,
    /// How preprocessing reacts to PCD errors.
    pub error_policy: ErrorPolicy,
    /// Root of generated output.
    pub output_dir: PathBuf,
    /// Where `dump` writes the text dump.
    pub dump_file: PathBuf,
}

impl Config {
    /// Resolve configuration from `pcd.toml` and the command line.
    pub fn load(cli: &Cli) -> Result<Self> {
        let (project_root, file) = match &cli.config {
            Some(path) => {
                let root = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                (root, read_config_file(path)?)
            }
            None => match find_project_root() {
                Ok(root) => {
                    let file = read_config_file(&root.join(CONFIG_FILE))?;
                    (root, file)
                }
                // A platform given on the command line is enough on its own.
                Err(_) if cli.platform.is_some() => (
                    std::env::current_dir().context("Failed to get current directory")?,
                    ConfigFile::default(),
                ),
                Err(e) => return Err(e),
            },
        };

        Self::resolve(project_root, file, cli)
    }

    fn resolve(project_root: PathBuf, file: ConfigFile, cli: &Cli) -> Result<Self> {
        let platform = match (&cli.platform, file.platform.description) {
            (Some(path), _) => path.clone(),
            (None, Some(path)) => project_root.join(path),
            (None, None) => bail!(
                "no platform description: pass --platform or set [platform] description in {CONFIG_FILE}"
            ),
        };

        let error_policy = if cli.fail_fast {
            ErrorPolicy::AbortOnFirst
        } else {
            file.preprocess.error_policy.unwrap_or_default()
        };

        let output_dir = project_root.join(file.output.dir.unwrap_or_else(|| DEFAULT_OUTPUT_DIR.into()));
        let dump_file = match file.output.dump_file {
            Some(path) => project_root.join(path),
            None => output_dir.join(DEFAULT_DUMP_FILE),
        };

        Ok(Self {
            project_root,
            platform,
            error_policy,
            output_dir,
            dump_file,
        })
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Find the project root by walking up from the current directory until a
/// directory containing `pcd.toml` is found.
pub fn find_project_root() -> Result<PathBuf> {
    let dir = std::env::current_dir().context("Failed to get current directory")?;
    find_project_root_from(dir)
}

fn find_project_root_from(mut dir: PathBuf) -> Result<PathBuf> {
    loop {
        if dir.join(CONFIG_FILE).is_file() {
            return Ok(dir);
        }
        if !dir.pop() {
            bail!("Could not find project root (no {CONFIG_FILE} found)");
        }
    }
}

/// Read and parse a TOML platform description.
pub fn load_platform(path: &Path) -> Result<PlatformDescription> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read platform description {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse platform description {}", path.display()))
}

/// Print the resolved configuration.
pub fn print_resolved(config: &Config) {
    eprintln!("Configuration:");
    eprintln!("  project root : {}", config.project_root.display());
    eprintln!("  platform     : {}", config.platform.display());
    eprintln!("  error policy : {}", config.error_policy);
    eprintln!("  output dir   : {}", config.output_dir.display());
    eprintln!("  dump file    : {}", config.dump_file.display());
}

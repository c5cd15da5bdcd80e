//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Metadispatch - run analyses over project directories, gated by metadata
///
/// Walks each base directory, loads every project's data.yml and runs the
/// configured analyses whose scope and eligibility predicate match.
///
/// Examples:
///   metadispatch
///   metadispatch usdt dai --dry-run
///   metadispatch --base-dir stablecoin,cex --concurrency 4
///   metadispatch --config ./dispatch.toml --fail-fast
///   metadispatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Project folder names to restrict processing to
    ///
    /// When omitted, every project under the base directories is processed.
    #[arg(value_name = "PROJECT")]
    pub projects: Vec<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .metadispatch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base directories holding project folders (comma-separated)
    #[arg(short, long, value_name = "DIRS", value_delimiter = ',')]
    pub base_dir: Option<Vec<PathBuf>>,

    /// Metadata document name inside each project folder
    #[arg(long, value_name = "NAME", env = "METADISPATCH_METADATA_FILE")]
    pub metadata_file: Option<String>,

    /// YAML or JSON mapping of lower-cased project names
    ///
    /// Required by analyses using the reference_name predicate.
    #[arg(long, value_name = "FILE")]
    pub reference_map: Option<PathBuf>,

    /// Number of projects processed concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Evaluate scopes and predicates without running any analysis
    #[arg(long)]
    pub dry_run: bool,

    /// Stop the pass at the first analysis failure (exit code 2)
    #[arg(long)]
    pub fail_fast: bool,

    /// Also write logs to a timestamped file in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Write the pass summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .metadispatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate concurrency
        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if let Some(ref name) = self.metadata_file {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(format!("Invalid metadata file name: '{}'", name));
            }
        }

        if let Some(ref path) = self.reference_map {
            if !path.is_file() {
                return Err(format!("Reference map not found: {}", path.display()));
            }
        }

        if let Some(ref config) = self.config {
            if !config.is_file() {
                return Err(format!("Config file not found: {}", config.display()));
            }
        }

        Ok(())
    }

    /// Allow-list of project folders, `None` when every project runs.
    pub fn only(&self) -> Option<Vec<String>> {
        if self.projects.is_empty() {
            None
        } else {
            Some(self.projects.clone())
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

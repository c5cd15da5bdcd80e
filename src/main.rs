//! Metadispatch - metadata-gated analysis dispatcher
//!
//! Walks project directories, reads each project's data.yml and runs
//! the registered analyses whose scope and eligibility predicate match.
//!
//! Exit codes:
//!   0 - Pass completed (skipped or failed projects are logged, not fatal)
//!   1 - Runtime error (arguments, config, reference map, analysis definitions)
//!   2 - Pass halted by --fail-fast

mod cli;
mod config;
mod dispatch;
mod metadata;
mod models;
mod predicates;
mod reference;
mod scanner;

use anyhow::{Context, Result};
use chrono::Local;
use cli::Args;
use config::{Config, CONFIG_FILE};
use dispatch::{DispatchMode, DispatchSettings, Orchestrator};
use models::PassSummary;
use reference::ReferenceSet;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn, Dispatch};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so the config can name a log directory
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let log_dispatch = match init_logging(&args, &config) {
        Ok(log_dispatch) => log_dispatch,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    dispatch::install_panic_hook();

    info!("Metadispatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_pass(args, config, log_dispatch).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dispatch failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .metadispatch.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to register analyses, predicates and scopes.");
    Ok(())
}

/// Build the log dispatcher and install it as the global default.
///
/// The returned handle is passed to the orchestrator explicitly.
fn init_logging(args: &Args, config: &Config) -> Result<Dispatch> {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let console = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact();

    let file = match config.general.log_dir {
        Some(ref dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir))?;
            let path = Path::new(dir).join(Local::now().format("%Y-%m-%d_%H-%M-%S.log").to_string());
            let file = File::create(&path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file);

    let dispatch = Dispatch::new(subscriber);
    tracing::dispatcher::set_global_default(dispatch.clone())
        .context("Failed to set tracing subscriber")?;

    Ok(dispatch)
}

/// Run one dispatch pass. Returns exit code (0 or 2).
async fn run_pass(args: Args, config: Config, log_dispatch: Dispatch) -> Result<i32> {
    let references = match config.general.reference_map {
        Some(ref path) => {
            let set = ReferenceSet::load(Path::new(path))?;
            info!("Loaded {} reference names from {}", set.len(), path);
            Some(Arc::new(set))
        }
        None => None,
    };

    let bindings = dispatch::bindings_from_config(&config.analyses, references.as_ref())?;
    if bindings.is_empty() {
        warn!("No analyses enabled; projects will only be checked");
    }

    let mut scan = scanner::ScanConfig::from(&config.general);
    scan.only = args.only();

    let settings = DispatchSettings {
        scan,
        tab_width: config.general.tab_width,
        concurrency: config.general.concurrency,
        mode: if args.dry_run {
            DispatchMode::DryRun
        } else {
            DispatchMode::Execute
        },
        fail_fast: config.general.fail_fast,
    };

    if !args.quiet {
        println!("🔎 Dispatching over: {}", config.general.base_dirs.join(", "));
        if let Some(ref only) = settings.scan.only {
            println!("   Projects: {}", only.join(", "));
        }
        println!("   Concurrency: {}", settings.concurrency);
        if args.dry_run {
            println!("   Dry run: no analysis will be invoked");
        }
    }

    let orchestrator = Orchestrator::new(settings, bindings, log_dispatch);
    for binding in orchestrator.bindings() {
        debug!("Registered {} (scope: '{}')", binding.name(), binding.scope());
    }

    let summary = orchestrator.run().await;

    if let Some(ref path) = args.summary {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }

    if !args.quiet {
        print_summary(&summary);
    }

    if summary.halted {
        eprintln!("\n⛔ Pass halted after an analysis failure (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

fn print_summary(summary: &PassSummary) {
    println!("\n📊 Dispatch Summary:");
    println!(
        "   Projects: {} found | {} dispatched | {} malformed",
        summary.discovered, summary.dispatched, summary.malformed
    );
    println!(
        "   Analyses: {} invoked | {} completed | {} would run | {} not eligible | {} failed",
        summary.invocations(),
        summary.completed,
        summary.would_run,
        summary.not_eligible,
        summary.failed
    );
    for failure in &summary.failures {
        if failure.analysis.is_empty() {
            println!("   ❌ {}: {}", failure.project, failure.error);
        } else {
            println!("   ❌ {} / {}: {}", failure.project, failure.analysis, failure.error);
        }
    }
    println!("   Duration: {:.1}s", summary.duration_seconds);
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        // Try explicit config path
        Some(ref config_path) => Config::load(config_path)?,
        // Try default location
        None => match Config::load_default() {
            Ok(Some(config)) => config,
            Ok(None) => Config::default(),
            Err(e) => {
                eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", CONFIG_FILE, e);
                Config::default()
            }
        },
    };

    config.merge_with_args(args);
    Ok(config)
}

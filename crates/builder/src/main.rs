//! # openfst-builder
//!
//! Build a pinned OpenFst release and package `pywrapfst` with its shared
//! libraries as a relocatable Python extension.
//!
//! ## Usage
//!
//! ```bash
//! openfst-builder all                        # Fetch + build + collect + patch
//! openfst-builder all --download-dir dl/     # Use an archive fetched beforehand
//! openfst-builder fetch                      # Download the source archive
//! openfst-builder status                     # Show which stages are cached
//! openfst-builder clean --archive            # Remove the tree and the archive
//! openfst-builder doctor                     # Check for the external tools
//! ```
//!
//! Set `OPENFST_BUILDER_LOG=debug` to see every external command.

use anyhow::Result;
use clap::Parser;
use openfst_builder::builder::{
    self, config::ConfigArgs, logging, preflight, BuildCommands, Options, PipelineConfig, Plan,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "openfst-builder", about = "Relocatable OpenFst Python extension builder")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: BuildCommands,
}

fn main() -> Result<()> {
    logging::setup(logging::LOG_VAR);
    let cli = Cli::parse();

    if let BuildCommands::Doctor = cli.command {
        return doctor();
    }

    let config = PipelineConfig::new(Options::from(cli.config))?;

    match cli.command {
        BuildCommands::All => {
            let report = builder::build_all(&config)?;
            println!("\n=== Build complete ===");
            println!("  Package: {}", config.output_dir().display());
            for dep in &report.collected.dependencies {
                println!("  {} -> {}", dep.original, dep.renamed);
            }
            println!("  Stub: {}", report.stub.display());
        }
        BuildCommands::Fetch => {
            let state = builder::fetch(&config)?;
            println!("{}: {state}", config.source().archive_filename());
        }
        BuildCommands::Status { json } => status(&config, json)?,
        BuildCommands::Clean { archive } => {
            let removed = builder::vendor::clean(&config, archive)?;
            if removed.is_empty() {
                println!("Nothing to clean");
            }
            for path in removed {
                println!("Cleaned: {}", path.display());
            }
        }
        BuildCommands::Doctor => doctor()?,
    }

    Ok(())
}

#[derive(Serialize)]
struct Status {
    source: String,
    url: String,
    archive: PathBuf,
    source_dir: PathBuf,
    output_dir: PathBuf,
    inspected_at: String,
    plan: Plan,
}

/// Show cache status for every stage.
fn status(config: &PipelineConfig, json: bool) -> Result<()> {
    let status = Status {
        source: config.source().dirname(),
        url: config.source().url(),
        archive: config.archive_path(),
        source_dir: config.source_dir(),
        output_dir: config.output_dir().to_path_buf(),
        inspected_at: chrono::Utc::now().to_rfc3339(),
        plan: Plan::inspect(config),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Cache Status: {}\n", status.source);
    for entry in status.plan.iter() {
        println!("  {:8} [{}]", entry.stage.name(), entry.state);
    }
    println!();
    println!("  Archive: {}", status.archive.display());
    println!("  Tree:    {}", status.source_dir.display());
    println!("  Output:  {}", status.output_dir.display());
    Ok(())
}

fn doctor() -> Result<()> {
    println!("Checking build tools:\n");
    for (tool, path) in preflight::locate(preflight::REQUIRED_TOOLS) {
        match path {
            Some(path) => println!("  {tool:10} [ok] {}", path.display()),
            None => println!("  {tool:10} [missing]"),
        }
    }
    println!();

    preflight::check(preflight::REQUIRED_TOOLS)?;
    println!("All tools found");
    Ok(())
}

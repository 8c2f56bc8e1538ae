//! Build pipeline for the relocatable OpenFst extension.
//!
//! Structure:
//! - `vendor` - Source archive download and cache cleanup
//! - `extract` - Archive extraction
//! - `autotools` - aclocal/autoconf/configure/make
//! - `libraries` - Collection into the package, content-addressed renaming
//! - `patchelf` - Dependency reference and search path rewriting
//! - `stub` - Python loader stub for the finished package
//! - `state` - Stage states inspected from the filesystem

pub mod autotools;
pub mod config;
pub mod error;
pub mod extract;
pub mod libraries;
pub mod logging;
pub mod naming;
pub mod patchelf;
pub mod preflight;
pub mod process;
pub mod source;
pub mod state;
pub mod stub;
pub mod vendor;

use clap::Subcommand;
use serde::Serialize;
use std::path::PathBuf;

pub use config::{Options, PipelineConfig};
pub use error::{PipelineError, Result};
pub use libraries::Collected;
pub use patchelf::PatchedArtifact;
pub use process::{Runner, SystemRunner};
pub use state::{Plan, Stage, StageState};
pub use vendor::{Downloader, HttpDownloader};

/// Build commands for the CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum BuildCommands {
    /// Fetch, extract, build, collect and patch, then write the loader stub
    All,
    /// Download the source archive only
    Fetch,
    /// Show which stages are cached
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Remove the extracted source tree
    Clean {
        /// Also remove the downloaded archive
        #[arg(long)]
        archive: bool,
    },
    /// Check that the external build tools are installed
    Doctor,
}

/// Outcome of a full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub plan: Plan,
    pub collected: Collected,
    pub patched: Vec<PatchedArtifact>,
    pub stub: PathBuf,
}

/// The five stages in fixed order, followed by the stub.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    runner: &'a dyn Runner,
    downloader: &'a dyn Downloader,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        runner: &'a dyn Runner,
        downloader: &'a dyn Downloader,
    ) -> Self {
        Self {
            config,
            runner,
            downloader,
        }
    }

    /// Run every stage whose output is missing, in order.
    ///
    /// A failed run can simply be repeated: it resumes at the first stage
    /// without output.
    pub fn run(&self) -> Result<Report> {
        let mut plan = Plan::inspect(self.config);
        if let Some(stage) = plan.resume_point() {
            tracing::info!("starting at stage {stage}");
        }

        run_cached(&mut plan, Stage::Fetch, || {
            vendor::fetch(self.config, self.downloader)
        })?;
        run_cached(&mut plan, Stage::Extract, || {
            extract::extract(self.config, self.runner)
        })?;
        run_cached(&mut plan, Stage::Build, || {
            autotools::build(self.config, self.runner)
        })?;

        let collected = {
            let _stage = tracing::info_span!("stage", name = %Stage::Collect).entered();
            libraries::collect(self.config, &self.config.build_output())?
        };
        plan.set(Stage::Collect, StageState::Completed);

        let patched = {
            let _stage = tracing::info_span!("stage", name = %Stage::Patch).entered();
            patchelf::rewrite(self.config, &collected, self.runner)?
        };
        plan.set(Stage::Patch, StageState::Completed);

        let stub = stub::write_stub(self.config)?;

        Ok(Report {
            plan,
            collected,
            patched,
            stub,
        })
    }
}

fn run_cached<F>(plan: &mut Plan, stage: Stage, run: F) -> Result<()>
where
    F: FnOnce() -> Result<StageState>,
{
    if plan.state(stage) == StageState::Cached {
        tracing::info!("{stage}: cached, skipping");
        return Ok(());
    }

    let _stage = tracing::info_span!("stage", name = %stage).entered();
    let state = run()?;
    plan.set(stage, state);
    Ok(())
}

/// Run the whole pipeline against the network and the host toolchain.
pub fn build_all(config: &PipelineConfig) -> Result<Report> {
    let downloader = http_downloader(config)?;
    Pipeline::new(config, &SystemRunner, &downloader).run()
}

/// Download the source archive only.
pub fn fetch(config: &PipelineConfig) -> Result<StageState> {
    if config.source_dir().exists() {
        tracing::info!("source tree already extracted at {}", config.source_dir().display());
        return Ok(StageState::Cached);
    }
    vendor::fetch(config, &http_downloader(config)?)
}

fn http_downloader(config: &PipelineConfig) -> Result<HttpDownloader> {
    HttpDownloader::new(config.verify_tls()).map_err(|source| PipelineError::Fetch {
        url: config.source().url(),
        source,
    })
}

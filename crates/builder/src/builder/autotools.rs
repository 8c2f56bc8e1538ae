//! Autotools build of the extracted tree.
//!
//! aclocal, autoconf, configure, then a parallel make. Each step blocks until
//! the tool exits; a failure stops the build with nothing rolled back.

use crate::builder::config::PipelineConfig;
use crate::builder::error::{IoContext, PipelineError, Result};
use crate::builder::process::{Invocation, Runner};
use crate::builder::state::StageState;
use std::path::Path;

/// Build the tree unless the primary artifact already exists.
pub fn build(config: &PipelineConfig, runner: &dyn Runner) -> Result<StageState> {
    let primary = config.build_output().primary;
    if primary.exists() {
        tracing::info!("already built: {}", primary.display());
        return Ok(StageState::Cached);
    }

    let tree = config.source_dir();
    // Absolute, so `./configure` resolves the same from inside the tree.
    let tree = std::fs::canonicalize(&tree)
        .io_context(|| format!("source tree {} is missing", tree.display()))?;

    install_macro_file(config, &tree)?;

    if tree.join("Makefile").exists() {
        tracing::info!("previous configuration found, running distclean");
        let distclean = Invocation::new("make").arg("distclean").current_dir(&tree);
        runner.run(&distclean).map_err(PipelineError::Build)?;
    }

    for step in steps(config, &tree) {
        tracing::info!("running {step}");
        runner.run(&step).map_err(PipelineError::Build)?;
    }

    tracing::info!("  Built: {}", primary.display());
    Ok(StageState::Completed)
}

/// Generation, configuration and compile steps, in order.
pub fn steps(config: &PipelineConfig, tree: &Path) -> Vec<Invocation> {
    vec![
        Invocation::new("aclocal").current_dir(tree),
        Invocation::new("autoconf").arg("-f").current_dir(tree),
        Invocation::new(tree.join("configure"))
            .args(config.configure_flags())
            .current_dir(tree),
        Invocation::new("make")
            .arg(format!("-j{}", config.jobs()))
            .current_dir(tree),
    ]
}

/// Copy the python-devel macro into the tree's `m4/` directory.
fn install_macro_file(config: &PipelineConfig, tree: &Path) -> Result<()> {
    let src = config.macro_file();
    if !src.is_file() {
        return Err(PipelineError::precondition(format!(
            "macro file {} does not exist",
            src.display()
        )));
    }

    let m4 = tree.join("m4");
    std::fs::create_dir_all(&m4).io_context(|| format!("failed to create {}", m4.display()))?;

    let file_name = src.file_name().unwrap_or(src.as_os_str());
    let dst = m4.join(file_name);
    tracing::info!("copying {} -> {}", src.display(), dst.display());
    std::fs::copy(src, &dst)
        .io_context(|| format!("failed to copy {} -> {}", src.display(), dst.display()))?;
    Ok(())
}

//! Host tool checks.

use crate::builder::error::{PipelineError, Result};
use crate::builder::patchelf::Patchelf;
use std::path::PathBuf;

/// Tools the stages shell out to.
pub const REQUIRED_TOOLS: &[&str] = &["tar", "aclocal", "autoconf", "make", Patchelf::PROGRAM];

/// Where each tool resolves on `PATH`, or `None` when it is missing.
pub fn locate(tools: &[&'static str]) -> Vec<(&'static str, Option<PathBuf>)> {
    tools
        .iter()
        .map(|&tool| (tool, which::which(tool).ok()))
        .collect()
}

/// Fail with the list of missing tools, if any.
pub fn check(tools: &[&'static str]) -> Result<()> {
    let missing: Vec<&str> = locate(tools)
        .into_iter()
        .filter(|(_, path)| path.is_none())
        .map(|(tool, _)| tool)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::precondition(format!(
            "missing tools: {}",
            missing.join(", ")
        )))
    }
}

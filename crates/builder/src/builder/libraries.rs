//! Library collection into the output package.
//!
//! The primary artifact keeps the name the binding layer expects. Every
//! dependency is copied under its content-addressed name, recomputed on each
//! run so a rebuilt library gets a new name.

use crate::builder::config::PipelineConfig;
use crate::builder::error::{IoContext, PipelineError, Result};
use crate::builder::naming;
use crate::builder::source::BuildOutput;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// One dependency as it was built and as it was collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Renamed {
    pub original: String,
    pub renamed: String,
}

/// What landed in the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collected {
    pub primary: PathBuf,
    pub dependencies: Vec<Renamed>,
}

impl Collected {
    /// Original basename to content-addressed basename.
    pub fn rename_map(&self) -> HashMap<&str, &str> {
        self.dependencies
            .iter()
            .map(|dep| (dep.original.as_str(), dep.renamed.as_str()))
            .collect()
    }
}

/// Copy the build output into the package directory.
pub fn collect(config: &PipelineConfig, output: &BuildOutput) -> Result<Collected> {
    let out_dir = config.output_dir();
    std::fs::create_dir_all(out_dir)
        .io_context(|| format!("failed to create {}", out_dir.display()))?;

    let primary = config.primary_output();
    copy_lib(&output.primary, &primary)?;

    let mut dependencies = Vec::with_capacity(output.dependencies.len());
    for src in &output.dependencies {
        let original = file_name_str(src)?.to_string();
        let renamed = naming::content_addressed_name(src)?;
        copy_lib(src, &out_dir.join(&renamed))?;
        dependencies.push(Renamed { original, renamed });
    }

    tracing::info!("  Collected {} libraries", dependencies.len() + 1);
    Ok(Collected {
        primary,
        dependencies,
    })
}

/// Copy a library, following symlinks to the real file.
fn copy_lib(src: &Path, dst: &Path) -> Result<()> {
    tracing::info!("copying {} -> {}", src.display(), dst.display());
    std::fs::copy(src, dst)
        .io_context(|| format!("failed to copy {} -> {}", src.display(), dst.display()))?;
    Ok(())
}

fn file_name_str(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PipelineError::Io {
            context: format!("invalid library path: {}", path.display()),
            source: io::Error::new(io::ErrorKind::InvalidInput, "no UTF-8 file name"),
        })
}

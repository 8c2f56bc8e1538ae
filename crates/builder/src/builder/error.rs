//! Pipeline error taxonomy.
//!
//! Every variant is fatal: nothing is retried and the remaining stages are
//! not run.

use crate::builder::process::ToolError;
use crate::builder::vendor::DownloadError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input was missing before any work started.
    #[error("precondition failed: {message}")]
    Precondition { message: String },

    #[error("fetch stage failed for {url}")]
    Fetch {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error("extract stage failed")]
    Extract(#[source] ToolError),

    #[error("build stage failed")]
    Build(#[source] ToolError),

    #[error("patch stage failed on {}", .artifact.display())]
    Patch {
        artifact: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }
}

/// Attach a message to an I/O failure.
pub(crate) trait IoContext<T> {
    fn io_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| PipelineError::Io {
            context: context(),
            source,
        })
    }
}

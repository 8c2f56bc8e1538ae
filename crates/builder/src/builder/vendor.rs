//! Source archive management (fetch, clean).
//!
//! The archive is downloaded once into the download directory and reused by
//! every later run. Its contents are never verified.

use crate::builder::config::PipelineConfig;
use crate::builder::error::{IoContext, PipelineError, Result};
use crate::builder::state::StageState;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("server returned status {code}")]
    Status { code: u16 },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("failed to set up TLS")]
    Tls(#[source] native_tls::Error),
    #[error("failed to stream the response body")]
    Stream(#[source] io::Error),
}

/// Streams a URL into a writer.
pub trait Downloader {
    /// Returns the number of bytes written to `sink`.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, DownloadError>;
}

/// Blocking HTTP(S) downloader. No timeouts are set.
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// With `verify_tls` off, any certificate and host name is accepted.
    pub fn new(verify_tls: bool) -> Result<Self, DownloadError> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .danger_accept_invalid_hostnames(!verify_tls)
            .build()
            .map_err(DownloadError::Tls)?;
        let agent = ureq::AgentBuilder::new()
            .tls_connector(Arc::new(connector))
            .build();
        Ok(Self { agent })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, DownloadError> {
        let response = self.agent.get(url).call().map_err(|err| match err {
            ureq::Error::Status(code, _response) => DownloadError::Status { code },
            ureq::Error::Transport(transport) => DownloadError::Transport {
                message: transport.to_string(),
            },
        })?;

        let mut reader = response.into_reader();
        io::copy(&mut reader, sink).map_err(DownloadError::Stream)
    }
}

/// Make sure the source archive exists locally.
///
/// Returns [`StageState::Cached`] when it was already there, in which case the
/// network is not touched.
pub fn fetch(config: &PipelineConfig, downloader: &dyn Downloader) -> Result<StageState> {
    let archive = config.archive_path();

    if archive.exists() {
        tracing::info!("{} already cached at {}", config.source().dirname(), archive.display());
        return Ok(StageState::Cached);
    }

    for dir in [config.download_dir(), config.build_temp()] {
        std::fs::create_dir_all(dir)
            .io_context(|| format!("failed to create {}", dir.display()))?;
    }

    let url = config.source().url();
    tracing::info!("downloading from {url}");

    // The file is closed when it drops, on error too. A partial download stays on disk.
    let mut file = File::create(&archive)
        .io_context(|| format!("failed to create {}", archive.display()))?;
    let bytes = downloader
        .download(&url, &mut file)
        .map_err(|source| PipelineError::Fetch {
            url: url.clone(),
            source,
        })?;
    file.flush()
        .io_context(|| format!("failed to write {}", archive.display()))?;

    tracing::info!("  Cached: {} ({bytes} bytes)", archive.display());
    Ok(StageState::Completed)
}

/// Remove the extracted source tree, and the archive too if `archive` is set.
///
/// Returns the paths that were removed.
pub fn clean(config: &PipelineConfig, archive: bool) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    let tree = config.source_dir();
    if tree.exists() {
        std::fs::remove_dir_all(&tree)
            .io_context(|| format!("failed to remove {}", tree.display()))?;
        removed.push(tree);
    }

    if archive {
        let path = config.archive_path();
        if path.exists() {
            std::fs::remove_file(&path)
                .io_context(|| format!("failed to remove {}", path.display()))?;
            removed.push(path);
        }
    }

    Ok(removed)
}

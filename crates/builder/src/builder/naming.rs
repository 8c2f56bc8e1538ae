//! Content-addressed names for dependency artifacts.
//!
//! `libfst.so.16` becomes `libfst-<hash8>.so.16`: the hash is appended to the
//! first dot-separated segment and every later suffix is kept as is. The
//! hash is the first 8 hex characters of the SHA-256 of the file content.

use crate::builder::error::{IoContext, PipelineError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Hex characters of the digest kept in the name.
pub const HASH_LEN: usize = 8;

/// Truncated hex digest of `content`.
pub fn content_hash(content: &[u8]) -> String {
    truncated_hex(&Sha256::digest(content))
}

/// Content-addressed basename for `basename` holding `content`.
pub fn renamed(basename: &str, content: &[u8]) -> String {
    with_hash(basename, &content_hash(content))
}

/// Content-addressed basename for the file at `path`.
pub fn content_addressed_name(path: &Path) -> Result<String> {
    let basename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PipelineError::Io {
            context: format!("cannot name {}", path.display()),
            source: io::Error::new(io::ErrorKind::InvalidData, "file name is not UTF-8"),
        })?;

    let mut file =
        File::open(path).io_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .io_context(|| format!("failed to read {}", path.display()))?;

    Ok(with_hash(basename, &truncated_hex(&hasher.finalize())))
}

fn with_hash(basename: &str, hash: &str) -> String {
    match basename.split_once('.') {
        Some((stem, rest)) => format!("{stem}-{hash}.{rest}"),
        None => format!("{basename}-{hash}"),
    }
}

fn truncated_hex(digest: &[u8]) -> String {
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}

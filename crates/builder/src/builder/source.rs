//! Upstream release identity and the artifact layout of its build tree.

use serde::Serialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_NAME: &str = "openfst";
pub const DEFAULT_VERSION: &str = "1.7.2";
pub const BASE_URL: &str = "http://www.openfst.org/twiki/pub/FST/FstDownload";

/// One upstream release. Archive name, URL and tree name all derive from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionedSource {
    name: String,
    version: String,
    base_url: String,
}

impl VersionedSource {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// An OpenFst release.
    pub fn openfst(version: impl Into<String>) -> Self {
        Self::new(DEFAULT_NAME, version)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `openfst-1.7.2.tar.gz`
    pub fn archive_filename(&self) -> String {
        format!("{}.tar.gz", self.dirname())
    }

    /// Name of the top-level directory inside the archive.
    pub fn dirname(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.archive_filename()
        )
    }
}

/// Where the toolchain leaves the artifacts, relative to the extracted tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub primary: PathBuf,
    pub dependencies: Vec<PathBuf>,
}

impl ArtifactLayout {
    /// Layout of an OpenFst tree configured with `--enable-python --enable-far`.
    pub fn openfst() -> Self {
        Self {
            primary: PathBuf::from("src/extensions/python/.libs/pywrapfst.so"),
            dependencies: vec![
                PathBuf::from("src/extensions/far/.libs/libfstfar.so.16"),
                PathBuf::from("src/extensions/far/.libs/libfstfarscript.so.16"),
                PathBuf::from("src/script/.libs/libfstscript.so.16"),
                PathBuf::from("src/lib/.libs/libfst.so.16"),
            ],
        }
    }

    /// Resolve the layout against an extracted tree.
    pub fn resolve(&self, tree: &Path) -> BuildOutput {
        BuildOutput {
            primary: tree.join(&self.primary),
            dependencies: self.dependencies.iter().map(|dep| tree.join(dep)).collect(),
        }
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::openfst()
    }
}

/// Artifacts produced by one build of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub primary: PathBuf,
    pub dependencies: Vec<PathBuf>,
}

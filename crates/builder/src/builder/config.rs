//! Pipeline configuration.
//!
//! [`PipelineConfig`] is built once from [`Options`] and handed to every
//! stage by reference. Nothing mutates it afterwards.

use crate::builder::error::{PipelineError, Result};
use crate::builder::source::{ArtifactLayout, BuildOutput, VersionedSource, DEFAULT_VERSION};
use clap::Args;
use std::path::{Path, PathBuf};

/// Compile workers handed to `make -j`.
pub const DEFAULT_JOBS: u32 = 4;

/// Autoconf macro the OpenFst python extension needs; copied into `m4/`.
pub const MACRO_FILE: &str = "ac_python_devel.m4";

/// Package directory under the build lib.
pub const PACKAGE_DIR: &str = "openfst_python";

/// File name the binding layer expects for the extension module.
pub const EXTENSION_FILENAME: &str = "pywrapfst.so";

/// Dependency references starting with this are dropped from every artifact.
pub const RUNTIME_PREFIX: &str = "libpython";

/// Loader token for "the directory this object lives in".
pub const ORIGIN_RPATH: &str = "$ORIGIN";

pub const CONFIGURE_FLAGS: &[&str] = &[
    "--enable-compact-fsts",
    "--enable-compress",
    "--enable-const-fsts",
    "--enable-far",
    "--enable-linear-fsts",
    "--enable-lookahead-fsts",
    "--enable-python",
    "--enable-special",
];

/// Raw configuration values, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub version: String,
    pub download_dir: Option<PathBuf>,
    pub build_temp: PathBuf,
    pub build_lib: PathBuf,
    pub extension_filename: String,
    pub macro_file: PathBuf,
    pub jobs: u32,
    pub verify_tls: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            download_dir: None,
            build_temp: PathBuf::from("build/temp"),
            build_lib: PathBuf::from("build/lib"),
            extension_filename: EXTENSION_FILENAME.to_string(),
            macro_file: PathBuf::from(MACRO_FILE),
            jobs: DEFAULT_JOBS,
            verify_tls: false,
        }
    }
}

/// Command-line form of [`Options`].
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// OpenFst release to build
    #[arg(long, global = true, env = "OPENFST_VERSION", default_value = DEFAULT_VERSION)]
    pub openfst_version: String,

    /// Directory already containing openfst-<version>.tar.gz
    #[arg(long, global = true, env = "OPENFST_DOWNLOAD_DIR")]
    pub download_dir: Option<PathBuf>,

    /// Scratch directory for the download cache and the source tree
    #[arg(long, global = true, default_value = "build/temp")]
    pub build_temp: PathBuf,

    /// Directory the output package is written under
    #[arg(long, global = true, default_value = "build/lib")]
    pub build_lib: PathBuf,

    /// File name of the extension module inside the package
    #[arg(long, global = true, default_value = EXTENSION_FILENAME)]
    pub extension_filename: String,

    /// Autoconf macro file copied into the source tree
    #[arg(long, global = true, default_value = MACRO_FILE)]
    pub macro_file: PathBuf,

    /// Parallel compile jobs
    #[arg(long, global = true, default_value_t = DEFAULT_JOBS)]
    pub jobs: u32,

    /// Verify the TLS certificate of the download server
    #[arg(long, global = true)]
    pub verify_tls: bool,
}

impl From<ConfigArgs> for Options {
    fn from(args: ConfigArgs) -> Self {
        Self {
            version: args.openfst_version,
            download_dir: args.download_dir,
            build_temp: args.build_temp,
            build_lib: args.build_lib,
            extension_filename: args.extension_filename,
            macro_file: args.macro_file,
            jobs: args.jobs,
            verify_tls: args.verify_tls,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    source: VersionedSource,
    layout: ArtifactLayout,
    download_dir: PathBuf,
    build_temp: PathBuf,
    output_dir: PathBuf,
    extension_filename: String,
    macro_file: PathBuf,
    configure_flags: Vec<String>,
    jobs: u32,
    runtime_prefix: String,
    verify_tls: bool,
}

impl PipelineConfig {
    /// Validate `options` and fix the configuration.
    ///
    /// A caller-supplied download directory must already hold the archive;
    /// otherwise this fails before anything touches the network.
    pub fn new(options: Options) -> Result<Self> {
        let source = VersionedSource::openfst(options.version);

        let download_dir = match options.download_dir {
            Some(dir) => {
                let archive = dir.join(source.archive_filename());
                if !archive.is_file() {
                    return Err(PipelineError::precondition(format!(
                        "file {} does not exist",
                        archive.display()
                    )));
                }
                dir
            }
            None => options.build_temp.clone(),
        };

        if options.jobs == 0 {
            return Err(PipelineError::precondition("jobs must be at least 1"));
        }
        if options.extension_filename.is_empty() || options.extension_filename.contains('/') {
            return Err(PipelineError::precondition(format!(
                "invalid extension file name: {:?}",
                options.extension_filename
            )));
        }

        Ok(Self {
            source,
            layout: ArtifactLayout::openfst(),
            download_dir,
            output_dir: options.build_lib.join(PACKAGE_DIR),
            build_temp: options.build_temp,
            extension_filename: options.extension_filename,
            macro_file: options.macro_file,
            configure_flags: CONFIGURE_FLAGS.iter().map(ToString::to_string).collect(),
            jobs: options.jobs,
            runtime_prefix: RUNTIME_PREFIX.to_string(),
            verify_tls: options.verify_tls,
        })
    }

    /// Replace the artifact layout, for releases that install elsewhere.
    #[must_use]
    pub fn with_layout(mut self, layout: ArtifactLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Replace the download location of the release.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.source = self.source.with_base_url(base_url);
        self
    }

    pub fn source(&self) -> &VersionedSource {
        &self.source
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn archive_path(&self) -> PathBuf {
        self.download_dir.join(self.source.archive_filename())
    }

    /// Extraction root.
    pub fn build_temp(&self) -> &Path {
        &self.build_temp
    }

    /// The extracted source tree.
    pub fn source_dir(&self) -> PathBuf {
        self.build_temp.join(self.source.dirname())
    }

    pub fn build_output(&self) -> BuildOutput {
        self.layout.resolve(&self.source_dir())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn extension_filename(&self) -> &str {
        &self.extension_filename
    }

    /// Final location of the primary artifact.
    pub fn primary_output(&self) -> PathBuf {
        self.output_dir.join(&self.extension_filename)
    }

    pub fn macro_file(&self) -> &Path {
        &self.macro_file
    }

    pub fn configure_flags(&self) -> &[String] {
        &self.configure_flags
    }

    pub fn jobs(&self) -> u32 {
        self.jobs
    }

    pub fn runtime_prefix(&self) -> &str {
        &self.runtime_prefix
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }
}

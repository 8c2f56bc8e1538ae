//! Loader stub for the extension module.
//!
//! Written last, beside the patched extension. Its presence tells the binding
//! layer the package is complete.

use crate::builder::config::PipelineConfig;
use crate::builder::error::{IoContext, Result};
use std::path::PathBuf;

/// Python module name of the extension: the file name up to its first dot.
pub fn module_name(extension_filename: &str) -> &str {
    extension_filename
        .split_once('.')
        .map_or(extension_filename, |(stem, _)| stem)
}

/// Source of the stub that loads `extension_filename` from its own directory.
pub fn stub_source(extension_filename: &str) -> String {
    format!(
        r#"def __bootstrap__():
    global __bootstrap__, __file__, __loader__
    import importlib.machinery
    import importlib.util
    import os
    import sys

    __file__ = os.path.join(os.path.dirname(__file__), "{extension_filename}")
    del __bootstrap__
    __loader__ = importlib.machinery.ExtensionFileLoader(__name__, __file__)
    spec = importlib.util.spec_from_file_location(__name__, __file__, loader=__loader__)
    module = importlib.util.module_from_spec(spec)
    __loader__.exec_module(module)
    sys.modules[__name__] = module


__bootstrap__()
"#
    )
}

/// Write `<module>.py` into the output directory.
pub fn write_stub(config: &PipelineConfig) -> Result<PathBuf> {
    let extension = config.extension_filename();
    let path = config
        .output_dir()
        .join(format!("{}.py", module_name(extension)));

    tracing::info!("writing stub loader {}", path.display());
    std::fs::write(&path, stub_source(extension))
        .io_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

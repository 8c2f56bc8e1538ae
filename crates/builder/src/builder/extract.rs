//! Archive extraction into the build-temp directory.

use crate::builder::config::PipelineConfig;
use crate::builder::error::{IoContext, PipelineError, Result};
use crate::builder::process::{Invocation, Runner};
use crate::builder::state::StageState;

/// Unpack the archive unless the source tree is already there.
///
/// A tree left behind by an interrupted extraction counts as extracted.
pub fn extract(config: &PipelineConfig, runner: &dyn Runner) -> Result<StageState> {
    let tree = config.source_dir();
    if tree.exists() {
        tracing::info!("source tree already at {}", tree.display());
        return Ok(StageState::Cached);
    }

    let root = config.build_temp();
    std::fs::create_dir_all(root).io_context(|| format!("failed to create {}", root.display()))?;

    tracing::info!("extracting {} into {}", config.archive_path().display(), root.display());
    let invocation = Invocation::new("tar")
        .arg("xzf")
        .arg(config.archive_path())
        .arg("-C")
        .arg(root);
    runner.run(&invocation).map_err(PipelineError::Extract)?;

    Ok(StageState::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::config::Options;
    use crate::builder::process::testing::RecordingRunner;
    use tempfile::TempDir;

    fn config_in(tmp: &TempDir) -> PipelineConfig {
        PipelineConfig::new(Options {
            build_temp: tmp.path().join("temp"),
            build_lib: tmp.path().join("lib"),
            ..Options::default()
        })
        .unwrap()
    }

    #[test]
    fn test_runs_tar_into_build_temp() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let runner = RecordingRunner::default();

        assert_eq!(extract(&config, &runner).unwrap(), StageState::Completed);

        let temp = tmp.path().join("temp");
        assert_eq!(
            runner.command_lines(),
            vec![format!(
                "tar xzf {} -C {}",
                temp.join("openfst-1.7.2.tar.gz").display(),
                temp.display()
            )]
        );
    }

    #[test]
    fn test_existing_tree_is_not_extracted_again() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        std::fs::create_dir_all(config.source_dir()).unwrap();
        let runner = RecordingRunner::default();

        assert_eq!(extract(&config, &runner).unwrap(), StageState::Cached);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_tar_failure_is_extract_error() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let runner = RecordingRunner::failing("tar");

        let err = extract(&config, &runner).unwrap_err();
        assert!(matches!(err, PipelineError::Extract(_)));
    }
}

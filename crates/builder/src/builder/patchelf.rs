//! Dependency reference rewriting on the collected shared artifacts.
//!
//! For each `.so` in the output directory: point its `DT_NEEDED` entries at
//! the content-addressed dependency names, drop any reference to the Python
//! runtime library, and set its search path to `$ORIGIN`. Each edit is a
//! separate `patchelf` call, so an interrupted run can leave an artifact
//! half patched; the next run patches everything again.

use crate::builder::config::{PipelineConfig, ORIGIN_RPATH};
use crate::builder::error::{IoContext, PipelineError, Result};
use crate::builder::libraries::Collected;
use crate::builder::process::{Invocation, Runner, ToolError};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// `patchelf` operations on one file at a time.
pub struct Patchelf<'a> {
    runner: &'a dyn Runner,
}

impl<'a> Patchelf<'a> {
    pub const PROGRAM: &'static str = "patchelf";

    pub fn new(runner: &'a dyn Runner) -> Self {
        Self { runner }
    }

    /// Current `DT_NEEDED` entries, in order.
    pub fn needed(&self, artifact: &Path) -> Result<Vec<String>, ToolError> {
        let invocation = Invocation::new(Self::PROGRAM)
            .arg("--print-needed")
            .arg(artifact)
            .capture_output();
        let captured = self.runner.run(&invocation)?;
        Ok(captured
            .stdout
            .split_whitespace()
            .map(ToString::to_string)
            .collect())
    }

    pub fn replace_needed(&self, artifact: &Path, old: &str, new: &str) -> Result<(), ToolError> {
        let invocation = Invocation::new(Self::PROGRAM)
            .args(["--replace-needed", old, new])
            .arg(artifact);
        self.runner.run(&invocation).map(drop)
    }

    pub fn remove_needed(&self, artifact: &Path, name: &str) -> Result<(), ToolError> {
        let invocation = Invocation::new(Self::PROGRAM)
            .args(["--remove-needed", name])
            .arg(artifact);
        self.runner.run(&invocation).map(drop)
    }

    pub fn set_rpath(&self, artifact: &Path, rpath: &str) -> Result<(), ToolError> {
        let invocation = Invocation::new(Self::PROGRAM)
            .args(["--set-rpath", rpath])
            .arg(artifact);
        self.runner.run(&invocation).map(drop)
    }
}

/// Edits applied to one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchedArtifact {
    pub artifact: PathBuf,
    pub replaced: Vec<Renaming>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Renaming {
    pub from: String,
    pub to: String,
}

/// File names carrying `.so` anywhere, so `libfst-1a2b3c4d.so.16` counts too.
pub fn is_shared_artifact(file_name: &str) -> bool {
    file_name.contains(".so")
}

/// Shared artifacts in `dir`, sorted by name.
pub fn shared_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).io_context(|| format!("failed to list {}", dir.display()))?;

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry.io_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        let shared = entry
            .file_name()
            .to_str()
            .is_some_and(is_shared_artifact);
        if shared && path.is_file() {
            artifacts.push(path);
        }
    }
    artifacts.sort();
    Ok(artifacts)
}

/// Patch every shared artifact in the output directory.
pub fn rewrite(
    config: &PipelineConfig,
    collected: &Collected,
    runner: &dyn Runner,
) -> Result<Vec<PatchedArtifact>> {
    let renames = collected.rename_map();
    let patchelf = Patchelf::new(runner);

    let mut patched = Vec::new();
    for artifact in shared_artifacts(config.output_dir())? {
        let failed = |source| PipelineError::Patch {
            artifact: artifact.clone(),
            source,
        };

        let mut replaced = Vec::new();
        for name in patchelf.needed(&artifact).map_err(failed)? {
            if let Some(&new) = renames.get(name.as_str()) {
                patchelf
                    .replace_needed(&artifact, &name, new)
                    .map_err(failed)?;
                replaced.push(Renaming {
                    from: name,
                    to: new.to_string(),
                });
            }
        }

        let mut removed = Vec::new();
        for name in patchelf.needed(&artifact).map_err(failed)? {
            if name.starts_with(config.runtime_prefix()) {
                patchelf.remove_needed(&artifact, &name).map_err(failed)?;
                removed.push(name);
            }
        }

        patchelf.set_rpath(&artifact, ORIGIN_RPATH).map_err(failed)?;

        tracing::info!(
            replaced = replaced.len(),
            removed = removed.len(),
            "patched {}",
            artifact.display()
        );
        patched.push(PatchedArtifact {
            artifact,
            replaced,
            removed,
        });
    }

    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::config::Options;
    use crate::builder::libraries::Renamed;
    use crate::builder::process::Captured;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// In-memory `patchelf`: needed lists and rpaths keyed by file name.
    #[derive(Default)]
    struct FakePatchelf {
        needed: RefCell<HashMap<String, Vec<String>>>,
        rpath: RefCell<HashMap<String, String>>,
        fail_on: Option<&'static str>,
    }

    impl FakePatchelf {
        fn with(mut self, file: &str, needed: &[&str]) -> Self {
            self.needed.get_mut().insert(
                file.to_string(),
                needed.iter().map(ToString::to_string).collect(),
            );
            self
        }

        fn needed_of(&self, file: &str) -> Vec<String> {
            self.needed.borrow().get(file).cloned().unwrap_or_default()
        }
    }

    impl Runner for FakePatchelf {
        fn run(&self, invocation: &Invocation) -> Result<Captured, ToolError> {
            let args: Vec<String> = invocation
                .arguments()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            let file = Path::new(args.last().unwrap())
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned();

            if self.fail_on == Some(args[0].as_str()) {
                return Err(ToolError::Failed {
                    program: invocation.name(),
                    status: "exit status: 1".to_string(),
                    stderr: "cannot open file".to_string(),
                });
            }

            let mut needed = self.needed.borrow_mut();
            let entries = needed.entry(file.clone()).or_default();
            match args[0].as_str() {
                "--print-needed" => {
                    return Ok(Captured {
                        stdout: entries.join("\n"),
                        stderr: String::new(),
                    });
                }
                "--replace-needed" => {
                    for entry in entries.iter_mut() {
                        if *entry == args[1] {
                            entry.clone_from(&args[2]);
                        }
                    }
                }
                "--remove-needed" => entries.retain(|entry| *entry != args[1]),
                "--set-rpath" => {
                    self.rpath.borrow_mut().insert(file, args[1].clone());
                }
                other => panic!("unexpected patchelf option {other}"),
            }
            Ok(Captured::default())
        }
    }

    fn fixture(tmp: &TempDir) -> (PipelineConfig, Collected) {
        let config = PipelineConfig::new(Options {
            build_temp: tmp.path().join("temp"),
            build_lib: tmp.path().join("lib"),
            ..Options::default()
        })
        .unwrap();
        let out = config.output_dir().to_path_buf();
        std::fs::create_dir_all(&out).unwrap();
        for name in [
            "pywrapfst.so",
            "libfst-0a1b2c3d.so.16",
            "libfstscript-4e5f6a7b.so.16",
            "README.txt",
        ] {
            std::fs::write(out.join(name), name).unwrap();
        }
        let collected = Collected {
            primary: out.join("pywrapfst.so"),
            dependencies: vec![
                Renamed {
                    original: "libfst.so.16".to_string(),
                    renamed: "libfst-0a1b2c3d.so.16".to_string(),
                },
                Renamed {
                    original: "libfstscript.so.16".to_string(),
                    renamed: "libfstscript-4e5f6a7b.so.16".to_string(),
                },
            ],
        };
        (config, collected)
    }

    #[test]
    fn test_shared_artifact_pattern() {
        assert!(is_shared_artifact("pywrapfst.so"));
        assert!(is_shared_artifact("libfst-0a1b2c3d.so.16"));
        assert!(!is_shared_artifact("pywrapfst.py"));
        assert!(!is_shared_artifact("README.txt"));
    }

    #[test]
    fn test_rewrites_references_and_strips_runtime() {
        let tmp = TempDir::new().unwrap();
        let (config, collected) = fixture(&tmp);
        let fake = FakePatchelf::default()
            .with(
                "pywrapfst.so",
                &["libfstscript.so.16", "libfst.so.16", "libpython3.7m.so.1.0", "libc.so.6"],
            )
            .with("libfstscript-4e5f6a7b.so.16", &["libfst.so.16", "libstdc++.so.6"]);

        let patched = rewrite(&config, &collected, &fake).unwrap();

        assert_eq!(
            fake.needed_of("pywrapfst.so"),
            vec!["libfstscript-4e5f6a7b.so.16", "libfst-0a1b2c3d.so.16", "libc.so.6"]
        );
        assert_eq!(
            fake.needed_of("libfstscript-4e5f6a7b.so.16"),
            vec!["libfst-0a1b2c3d.so.16", "libstdc++.so.6"]
        );

        let names: Vec<_> = patched
            .iter()
            .map(|p| p.artifact.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["libfst-0a1b2c3d.so.16", "libfstscript-4e5f6a7b.so.16", "pywrapfst.so"]
        );
        let primary = patched.iter().find(|p| p.artifact.ends_with("pywrapfst.so")).unwrap();
        assert_eq!(primary.removed, vec!["libpython3.7m.so.1.0"]);
        assert_eq!(primary.replaced.len(), 2);
    }

    #[test]
    fn test_every_artifact_gets_origin_rpath() {
        let tmp = TempDir::new().unwrap();
        let (config, collected) = fixture(&tmp);
        let fake = FakePatchelf::default();

        rewrite(&config, &collected, &fake).unwrap();

        let rpath = fake.rpath.borrow();
        assert_eq!(rpath.len(), 3);
        assert!(rpath.values().all(|value| value == "$ORIGIN"));
        assert!(!rpath.contains_key("README.txt"));
    }

    #[test]
    fn test_failed_edit_is_patch_error() {
        let tmp = TempDir::new().unwrap();
        let (config, collected) = fixture(&tmp);
        let fake = FakePatchelf {
            fail_on: Some("--set-rpath"),
            ..FakePatchelf::default()
        };

        let err = rewrite(&config, &collected, &fake).unwrap_err();

        match err {
            PipelineError::Patch { artifact, .. } => {
                assert!(artifact.ends_with("libfst-0a1b2c3d.so.16"));
            }
            other => panic!("expected a patch error, got {other:?}"),
        }
    }
}

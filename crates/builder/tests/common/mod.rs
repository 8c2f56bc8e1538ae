//! Fake network and toolchain for pipeline tests.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use openfst_builder::builder::process::{Captured, Invocation, Runner, ToolError};
use openfst_builder::builder::vendor::{DownloadError, Downloader};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Serves a fixed payload for any URL.
pub struct FakeDownloader {
    payload: Vec<u8>,
    pub calls: Cell<usize>,
}

impl FakeDownloader {
    pub fn new(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            calls: Cell::new(0),
        }
    }
}

impl Downloader for FakeDownloader {
    fn download(&self, _url: &str, sink: &mut dyn Write) -> Result<u64, DownloadError> {
        self.calls.set(self.calls.get() + 1);
        sink.write_all(&self.payload).map_err(DownloadError::Stream)?;
        Ok(self.payload.len() as u64)
    }
}

/// Simulates `tar`, the autotools steps, `make` and `patchelf`.
///
/// `tar` creates the tree directory, `make -jN` writes the configured
/// artifacts into the tree, and `patchelf` edits in-memory needed lists
/// keyed by file name.
pub struct FakeToolchain {
    tree_name: String,
    artifacts: Vec<(PathBuf, Vec<u8>)>,
    needed: RefCell<HashMap<String, Vec<String>>>,
    rpath: RefCell<HashMap<String, String>>,
    calls: RefCell<Vec<String>>,
    fail: Option<String>,
}

impl FakeToolchain {
    pub fn new(tree_name: &str) -> Self {
        Self {
            tree_name: tree_name.to_string(),
            artifacts: Vec::new(),
            needed: RefCell::default(),
            rpath: RefCell::default(),
            calls: RefCell::default(),
            fail: None,
        }
    }

    /// File `make` produces, relative to the tree.
    pub fn artifact(mut self, path: &str, content: &[u8]) -> Self {
        self.artifacts.push((PathBuf::from(path), content.to_vec()));
        self
    }

    /// Needed entries recorded in the file called `name`.
    pub fn needed(self, name: &str, entries: &[&str]) -> Self {
        self.needed.borrow_mut().insert(
            name.to_string(),
            entries.iter().map(ToString::to_string).collect(),
        );
        self
    }

    /// Fail every invocation of `program`.
    pub fn failing(mut self, program: &str) -> Self {
        self.fail = Some(program.to_string());
        self
    }

    pub fn fixed(&mut self) {
        self.fail = None;
    }

    pub fn needed_of(&self, name: &str) -> Vec<String> {
        self.needed.borrow().get(name).cloned().unwrap_or_default()
    }

    pub fn rpath_of(&self, name: &str) -> Option<String> {
        self.rpath.borrow().get(name).cloned()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, program: &str) -> usize {
        self.calls.borrow().iter().filter(|p| *p == program).count()
    }

    pub fn reset_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn patchelf(&self, args: &[String]) -> Captured {
        let file = file_name(Path::new(args.last().unwrap()));
        let mut needed = self.needed.borrow_mut();
        let entries = needed.entry(file.clone()).or_default();
        match args[0].as_str() {
            "--print-needed" => {
                return Captured {
                    stdout: entries.iter().map(|e| format!("{e}\n")).collect(),
                    stderr: String::new(),
                };
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
        Captured::default()
    }
}

impl Runner for FakeToolchain {
    fn run(&self, invocation: &Invocation) -> Result<Captured, ToolError> {
        let program = invocation.name();
        self.calls.borrow_mut().push(program.clone());

        if self.fail.as_deref() == Some(program.as_str()) {
            return Err(ToolError::Failed {
                program,
                status: "exit status: 2".to_string(),
                stderr: String::new(),
            });
        }

        let args: Vec<String> = invocation
            .arguments()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        match program.as_str() {
            "tar" => {
                let root = PathBuf::from(&args[3]);
                std::fs::create_dir_all(root.join(&self.tree_name).join("src")).unwrap();
            }
            "make" if args[0].starts_with("-j") => {
                let tree = invocation.dir().unwrap();
                for (path, content) in &self.artifacts {
                    let path = tree.join(path);
                    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                    std::fs::write(path, content).unwrap();
                }
                std::fs::write(tree.join("Makefile"), "all:\n").unwrap();
            }
            "patchelf" => return Ok(self.patchelf(&args)),
            _ => {}
        }
        Ok(Captured::default())
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

//! External tool invocation.
//!
//! Every stage that shells out goes through [`Runner`]. A non-zero exit
//! always comes back as [`ToolError::Failed`] naming the program.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// A single external command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    capture: bool,
}

impl Invocation {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
            capture: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Collect stdout/stderr instead of passing them through to the terminal.
    #[must_use]
    pub fn capture_output(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Final path component of the program, e.g. `configure` for `/src/configure`.
    pub fn name(&self) -> String {
        Path::new(&self.program).file_name().map_or_else(
            || self.program.to_string_lossy().into_owned(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn captures_output(&self) -> bool {
        self.capture
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Output of a successful invocation. Empty unless output was captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` failed ({status}){}", stderr_suffix(.stderr))]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Runs external tools, blocking until they exit.
pub trait Runner {
    fn run(&self, invocation: &Invocation) -> Result<Captured, ToolError>;
}

/// Runs tools as child processes of this one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<Captured, ToolError> {
        tracing::debug!(command = %invocation, dir = ?invocation.dir(), "running");

        let mut command = Command::new(invocation.program());
        command.args(invocation.arguments());
        if let Some(dir) = invocation.dir() {
            command.current_dir(dir);
        }

        let spawn_error = |source| ToolError::Spawn {
            program: invocation.name(),
            source,
        };

        if invocation.captures_output() {
            let output = command.output().map_err(spawn_error)?;
            let captured = Captured {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            if !output.status.success() {
                return Err(ToolError::Failed {
                    program: invocation.name(),
                    status: output.status.to_string(),
                    stderr: captured.stderr,
                });
            }
            Ok(captured)
        } else {
            // Inherited stdio: the tool's own diagnostics reach the terminal directly.
            let status = command.status().map_err(spawn_error)?;
            if !status.success() {
                return Err(ToolError::Failed {
                    program: invocation.name(),
                    status: status.to_string(),
                    stderr: String::new(),
                });
            }
            Ok(Captured::default())
        }
    }
}

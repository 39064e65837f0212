use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::UtilError;
use crate::Result;

/// Stdio mode for subprocess streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    Inherit,
    Null,
}

impl StdioMode {
    fn to_stdio(self) -> Stdio {
        match self {
            StdioMode::Inherit => Stdio::inherit(),
            StdioMode::Null => Stdio::null(),
        }
    }
}

/// Builder for a synchronous external program invocation.
///
/// The child always runs to completion; there is no timeout. Output streams
/// are inherited by default so a merge driver can talk to the operator.
#[derive(Debug, Clone)]
pub struct ProgramCommand {
    program: OsString,
    args: Vec<OsString>,
    env_vars: Vec<(OsString, OsString)>,
    stdout_mode: StdioMode,
    stderr_mode: StdioMode,
    working_dir: Option<PathBuf>,
}

impl ProgramCommand {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env_vars: Vec::new(),
            stdout_mode: StdioMode::Inherit,
            stderr_mode: StdioMode::Inherit,
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Self {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, val: impl AsRef<OsStr>) -> Self {
        self.env_vars
            .push((key.as_ref().to_os_string(), val.as_ref().to_os_string()));
        self
    }

    pub fn stdout(mut self, mode: StdioMode) -> Self {
        self.stdout_mode = mode;
        self
    }

    pub fn stderr(mut self, mode: StdioMode) -> Self {
        self.stderr_mode = mode;
        self
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Human readable command line, for error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|s| s.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the program and wait for it. Stdin is closed.
    pub fn status(&self) -> Result<ExitStatus> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env_vars.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(self.stdout_mode.to_stdio())
            .stderr(self.stderr_mode.to_stdio());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(command = %self.command_line(), "running program");
        cmd.status().map_err(|source| UtilError::Subprocess {
            command: self.command_line(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_exit_code() {
        let status = ProgramCommand::new("sh")
            .args(["-c", "exit 3"])
            .status()
            .unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn passes_arguments_and_environment() {
        let dir = tempfile::tempdir().unwrap();
        let status = ProgramCommand::new("sh")
            .args(["-c", "printf '%s|%s|%s' \"$1\" \"$2\" \"$OCTO_TEST\" > out", "sh", "", "b"])
            .env("OCTO_TEST", "env")
            .working_dir(dir.path())
            .status()
            .unwrap();

        assert!(status.success());
        let out = std::fs::read_to_string(dir.path().join("out")).unwrap();
        assert_eq!(out, "|b|env");
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = ProgramCommand::new("/nonexistent/octo-merge-driver")
            .arg("x")
            .status()
            .unwrap_err();
        match err {
            UtilError::Subprocess { command, .. } => {
                assert_eq!(command, "/nonexistent/octo-merge-driver x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

//! Centralized command execution with consistent error handling.
//!
//! All external commands go through [`Cmd`], which captures stderr so
//! failures carry a useful message.

use anyhow::{bail, Context, Result};
use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{ChildStderr, Command, ExitStatus, Stdio};
use std::thread;
use tracing::warn;

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

/// Builder for configuring command execution.
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    /// If true, don't fail on non-zero exit.
    allow_fail: bool,
    /// Custom error message prefix.
    error_prefix: Option<String>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            allow_fail: false,
            error_prefix: None,
        }
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_os_string());
        }
        self
    }

    /// Add a path as an argument, byte for byte.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.as_os_str().to_os_string());
        self
    }

    /// Allow non-zero exit codes without failing.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Set a custom error message prefix.
    pub fn error_msg(mut self, msg: impl AsRef<str>) -> Self {
        self.error_prefix = Some(msg.as_ref().to_string());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    fn check_status(&self, status: ExitStatus, stderr: &str) -> Result<()> {
        if self.allow_fail || status.success() {
            return Ok(());
        }
        let prefix = self
            .error_prefix
            .clone()
            .unwrap_or_else(|| format!("'{}' failed", self.program));
        let code = status.code().unwrap_or(-1);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            bail!("{} (exit code {})", prefix, code);
        }
        bail!("{} (exit code {}):\n{}", prefix, code, stderr)
    }

    /// Run the command and capture output.
    pub fn run(self) -> Result<CommandResult> {
        let output = self.command().output().with_context(|| {
            format!("Failed to execute '{}'. Is it installed?", self.program)
        })?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        self.check_status(result.status, &result.stderr)?;

        Ok(result)
    }

    /// Run the command, handing each stdout line to `on_line` as it arrives.
    ///
    /// Waits for the process after stdout closes and checks its exit status
    /// even when `on_line` returned early with an error.
    pub fn stream_stdout<F>(self, mut on_line: F) -> Result<ExitStatus>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let mut child = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program))?;

        let stderr_reader = child.stderr.take().map(drain_stderr);

        let mut handled = Ok(());
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        handled = Err(anyhow::Error::new(e)
                            .context(format!("Failed to read output of '{}'", self.program)));
                        break;
                    }
                };
                if let Err(e) = on_line(&line) {
                    handled = Err(e);
                    break;
                }
            }
        }

        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for '{}'", self.program))?;

        let stderr = match stderr_reader.map(|reader| reader.join()) {
            None => String::new(),
            Some(Ok(Ok(text))) => text,
            Some(Ok(Err(e))) => {
                warn!("failed to read stderr of '{}': {}", self.program, e);
                String::new()
            }
            Some(Err(_)) => {
                warn!("stderr reader of '{}' panicked", self.program);
                String::new()
            }
        };

        self.check_status(status, &stderr)?;
        handled?;
        Ok(status)
    }
}

/// Read all of `pipe` on its own thread so a chatty child can't block on
/// a full stderr pipe while stdout is being consumed.
fn drain_stderr(mut pipe: ChildStderr) -> thread::JoinHandle<io::Result<String>> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        pipe.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    })
}

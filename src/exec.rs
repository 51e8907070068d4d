//! Command executor seam for external tool invocations
//!
//! Every external tool (`openssl`, `chown`) is reached through the
//! [`CommandExecutor`] trait. Production code uses [`SystemExecutor`];
//! tests substitute a recording fake and assert exact invocations without
//! touching a real toolchain.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::Result;

/// Captured result of one external tool invocation.
///
/// Raw and unparsed: exit status is the only structured signal the
/// provisioning task consumes. Stdout/stderr are carried for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutput {
    /// Program that was invoked
    pub program: String,
    /// Exit status (-1 when the process was killed by a signal)
    pub status: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExecOutput {
    /// True when the tool exited with status zero
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// A capability to run one external command and capture its outcome.
///
/// Invocations are blocking from the task's perspective: the future
/// resolves only once the tool has exited. No timeout is enforced; a hung
/// tool hangs the run, which is an accepted boundary condition.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args`, optionally in working directory `cwd`,
    /// and wait for it to exit.
    async fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> Result<ExecOutput>;
}

/// Executor backed by real subprocesses via `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> Result<ExecOutput> {
        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let output = command.output().await?;
        let result = ExecOutput {
            program: program.to_string(),
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            program,
            status = result.status,
            cwd = ?cwd.map(Path::display),
            "external tool finished"
        );

        Ok(result)
    }
}

/// One recorded invocation: `(program, args, cwd)`.
pub type RecordedCall = (String, Vec<String>, Option<PathBuf>);

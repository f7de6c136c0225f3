// src/core/adapters/process.rs

//! Subprocess supervision shared by every CLI adapter.
//!
//! Every adapter call goes through [`run`], which puts the child in its own
//! process group (so a kill reaches any descendants the CLI itself forked),
//! applies a deadline, and classifies a non-zero exit as either a
//! `transient` signal death (retryable) or a hard failure carrying stderr.

use crate::core::errors::{FleetError, UpstreamKind};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn, Instrument};

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program args...` with a timeout, retrying up to `retries` times
/// only when the child died from a transient signal (not on validation-style
/// non-zero exits, which are assumed deterministic).
pub async fn run(
    kind: UpstreamKind,
    program: &str,
    args: &[&str],
    timeout: Duration,
    retries: u32,
) -> Result<CommandOutput, FleetError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = run_once(kind, program, args, timeout).await;
        match result {
            Ok(out) => return Ok(out),
            Err(RunError::Transient(detail)) if attempt <= retries => {
                warn!(program, attempt, detail = %detail, "transient adapter failure, retrying");
                continue;
            }
            Err(RunError::Transient(detail)) | Err(RunError::Hard(detail)) => {
                return Err(FleetError::UpstreamFailed {
                    kind,
                    message: format!("{program} failed"),
                    detail: Some(detail),
                });
            }
        }
    }
}

enum RunError {
    Transient(String),
    Hard(String),
}

async fn run_once(
    kind: UpstreamKind,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, RunError> {
    let span = tracing::info_span!("adapter_call", kind = %kind, program, args = ?redact(args));
    run_once_inner(program, args, timeout).instrument(span).await
}

async fn run_once_inner(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, RunError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        // New process group so a later SIGTERM/SIGKILL reaches children the
        // CLI itself may have forked.
        unsafe {
            cmd.pre_exec(|| nix::unistd::setsid().map(|_| ()).map_err(std::io::Error::from));
        }
    }

    let child = cmd
        .spawn()
        .map_err(|e| RunError::Hard(format!("spawn failed: {e}")))?;

    let awaited = tokio::time::timeout(timeout, child.wait_with_output()).await;

    let output = match awaited {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(RunError::Hard(format!("io error waiting on child: {e}"))),
        Err(_) => return Err(RunError::Transient(format!("timed out after {timeout:?}"))),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if output.status.success() {
        debug!(program, "adapter call succeeded");
        return Ok(CommandOutput { stdout, stderr });
    }

    #[cfg(unix)]
    let signal = std::os::unix::process::ExitStatusExt::signal(&output.status);
    #[cfg(not(unix))]
    let signal: Option<i32> = None;

    match signal {
        Some(sig) => Err(RunError::Transient(format!(
            "killed by signal {sig}: {stderr}"
        ))),
        None => Err(RunError::Hard(stderr)),
    }
}

/// Spawns `program args...` with piped stdin/stdout and hands back the
/// live `Child` for a console session to read and write directly, instead
/// of buffering to completion like [`run`] does for one-shot calls.
pub fn spawn_interactive(kind: UpstreamKind, program: &str, args: &[&str]) -> Result<tokio::process::Child, FleetError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        unsafe {
            cmd.pre_exec(|| nix::unistd::setsid().map(|_| ()).map_err(std::io::Error::from));
        }
    }

    cmd.spawn().map_err(|e| FleetError::UpstreamFailed {
        kind,
        message: format!("failed to spawn console process '{program}'"),
        detail: Some(e.to_string()),
    })
}

/// Strips argument values that look like credentials from the tracing span
///.
fn redact(args: &[&str]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut redact_next = false;
    for a in args {
        if redact_next {
            out.push("<redacted>".to_string());
            redact_next = false;
            continue;
        }
        if matches!(*a, "-p" | "--password" | "--token") {
            redact_next = true;
        }
        out.push(a.to_string());
    }
    out
}

#[cfg(unix)]
use tokio::process::unix::CommandExt as _;

//! Running hook commands with a timeout and bounded output.

use std::io::{self, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::error::TerminationSignal;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Signal that ended the child, if it was interrupted or terminated.
    pub fn termination_signal(&self) -> Option<TerminationSignal> {
        termination_signal(&self.status)
    }

    /// Last non-empty stdout line, trimmed.
    pub fn last_stdout_line(&self) -> String {
        String::from_utf8_lossy(&self.stdout)
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    /// Stderr as text, trimmed, with a note when bytes were dropped.
    pub fn stderr_text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stderr).trim().to_string();
        if self.stderr_truncated > 0 {
            text.push_str(&format!(" [stderr truncated {} bytes]", self.stderr_truncated));
        }
        text
    }
}

#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<TerminationSignal> {
    use std::os::unix::process::ExitStatusExt;

    const SIGINT: i32 = 2;
    const SIGTERM: i32 = 15;

    match status.signal()? {
        SIGINT => Some(TerminationSignal::Interrupt),
        SIGTERM => Some(TerminationSignal::Terminate),
        _ => None,
    }
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<TerminationSignal> {
    None
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// `stdin` is written and output is drained on helper threads while the child
/// runs, so a child that never reads its input still times out.
/// `output_limit_bytes` bounds what is kept in memory per stream; bytes beyond
/// it are discarded while the pipe is still drained.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes = output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: &[u8],
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning hook command");
    let mut child = cmd.spawn().context("spawn command")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let payload = stdin.to_vec();
    let stdin_handle = thread::spawn(move || write_stdin(child_stdin, &payload));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "hook command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    match stdin_handle.join() {
        Ok(result) => result.context("write stdin")?,
        Err(_) => return Err(anyhow!("stdin writer thread panicked")),
    }
    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "hook command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Write the payload and close the pipe. A child that stops reading early is not an error.
fn write_stdin<W: Write>(mut child_stdin: W, payload: &[u8]) -> io::Result<()> {
    match child_stdin.write_all(payload) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            debug!("hook command closed stdin early");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        let keep = n.min(remaining);
        buf.extend_from_slice(&chunk[..keep]);
        truncated += n - keep;
    }

    Ok((buf, truncated))
}

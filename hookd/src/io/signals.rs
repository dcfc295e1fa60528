//! Termination signals delivered to the daemon process itself.
//!
//! Signals that kill a hook command are detected from its exit status in
//! `io::process`. This module covers SIGINT/SIGTERM sent to `hookd` while it
//! waits on the parent, which would otherwise end the process without a
//! `FATAL` record.

use std::io::{self, Write};
use std::process;
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use crate::error::{FatalError, TerminationSignal};
use crate::exit_codes;
use crate::io::transport::Response;

/// The `FATAL` record written when `signal` reaches the daemon.
pub fn termination_record(signal: TerminationSignal, debug: bool) -> Response {
    let fatal = FatalError::Terminated { signal };
    let message = fatal.to_string();
    Response::Fatal {
        kind: fatal.kind(),
        trace: debug.then(|| message.clone()),
        message,
    }
}

/// Start a background thread that reports SIGINT/SIGTERM and exits.
///
/// Returns once the handlers are installed. On delivery the watcher writes
/// [`termination_record`] to stdout under the stdout lock and exits with
/// [`exit_codes::INTERRUPTED`]. The protocol writer must not hold the stdout
/// lock between records.
pub fn spawn_termination_watcher(debug: bool) -> Result<()> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

    thread::Builder::new()
        .name("hookd-signals".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = ready_tx.send(Err(anyhow!(err).context("build signal runtime")));
                    return;
                }
            };
            runtime.block_on(async move {
                if let Some(signal) = wait_for_termination(ready_tx).await {
                    report_and_exit(signal, debug);
                }
            });
        })
        .context("spawn signal watcher")?;

    ready_rx
        .recv()
        .context("signal watcher stopped before installing handlers")??;
    debug!("termination watcher installed");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_termination(ready: mpsc::Sender<Result<()>>) -> Option<TerminationSignal> {
    use tokio::signal::unix::{SignalKind, signal};

    let installed = signal(SignalKind::interrupt())
        .and_then(|interrupt| Ok((interrupt, signal(SignalKind::terminate())?)));
    let (mut interrupt, mut terminate) = match installed {
        Ok(streams) => streams,
        Err(err) => {
            let _ = ready.send(Err(anyhow!(err).context("install signal handlers")));
            return None;
        }
    };
    let _ = ready.send(Ok(()));

    tokio::select! {
        _ = interrupt.recv() => Some(TerminationSignal::Interrupt),
        _ = terminate.recv() => Some(TerminationSignal::Terminate),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination(ready: mpsc::Sender<Result<()>>) -> Option<TerminationSignal> {
    let _ = ready.send(Ok(()));
    match tokio::signal::ctrl_c().await {
        Ok(()) => Some(TerminationSignal::Interrupt),
        Err(err) => {
            warn!(%err, "ctrl-c handler failed");
            None
        }
    }
}

fn report_and_exit(signal: TerminationSignal, debug: bool) -> ! {
    warn!(%signal, "daemon received termination signal");
    let record = termination_record(signal, debug).encode();
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(record.as_bytes())
        .and_then(|()| stdout.flush())
    {
        warn!(%err, "failed to write termination record");
    }
    process::exit(exit_codes::INTERRUPTED);
}

//! The request loop driving one daemon session.
//!
//! Each iteration announces `READY`, asks for an action and serves it.
//! Recoverable failures are reported as `ERROR` and the loop continues;
//! anything else is reported as `FATAL` and ends the session with an error.

use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendLoader, BackendResolver};
use crate::core::hook::Action;
use crate::decode::decode_request;
use crate::dispatch::dispatch;
use crate::error::{Classified, classify};
use crate::io::transport::{Response, Transport};

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The parent sent `shutdown`.
    Shutdown,
    /// Debug mode served a single request.
    SingleShot,
}

pub struct Session<R, W, L> {
    transport: Transport<R, W>,
    resolver: BackendResolver<L>,
    debug: bool,
}

impl<R: BufRead, W: Write, L: BackendLoader> Session<R, W, L> {
    pub fn new(transport: Transport<R, W>, resolver: BackendResolver<L>, debug: bool) -> Self {
        Self {
            transport,
            resolver,
            debug,
        }
    }

    /// Serve requests until shutdown, a fatal error, or (in debug mode) one request.
    pub fn run(&mut self) -> Result<SessionEnd> {
        info!(debug = self.debug, "session started");
        let mut iteration = 0u64;
        loop {
            iteration += 1;
            match self.iterate() {
                Ok(Some(end)) => {
                    info!(iteration, "session ended by shutdown");
                    return Ok(end);
                }
                Ok(None) => {}
                Err(err) => match classify(&err) {
                    Classified::Recoverable(recoverable) => {
                        warn!(iteration, kind = recoverable.kind(), "request failed");
                        self.transport.send(&Response::Error {
                            kind: recoverable.kind(),
                            message: recoverable.to_string(),
                        })?;
                    }
                    Classified::Fatal { kind } => {
                        error!(iteration, kind, error = %format!("{err:#}"), "session failed");
                        report_fatal(&mut self.transport, &err, self.debug)?;
                        return Err(err);
                    }
                },
            }

            if self.debug {
                debug!(iteration, "debug mode serves a single request");
                return Ok(SessionEnd::SingleShot);
            }
        }
    }

    /// One `READY` cycle. Returns `Some` when the session should end cleanly.
    fn iterate(&mut self) -> Result<Option<SessionEnd>> {
        self.transport.send(&Response::Ready)?;
        self.transport.send(&Response::Expect("action"))?;
        let action: Action = self.transport.read_line()?.parse()?;
        debug!(%action, "action received");

        match action {
            Action::Shutdown => {
                self.transport.send(&Response::Shutdown)?;
                Ok(Some(SessionEnd::Shutdown))
            }
            Action::Run => {
                let request = decode_request(&mut self.transport, &mut self.resolver)?;
                let started = Instant::now();
                let result = dispatch(&request)?;
                self.transport.send(&Response::Ok(result))?;
                let elapsed = started.elapsed().as_secs_f64() * 1000.0;
                self.transport.send(&Response::Debug(vec![format!(
                    "ran hook in {elapsed:.2}ms"
                )]))?;
                Ok(None)
            }
        }
    }

    pub fn resolver(&self) -> &BackendResolver<L> {
        &self.resolver
    }

    pub fn into_transport(self) -> Transport<R, W> {
        self.transport
    }
}

/// Write the `FATAL` line for `err`, with the full cause chain when `debug` is set.
pub fn report_fatal<R: BufRead, W: Write>(
    transport: &mut Transport<R, W>,
    err: &anyhow::Error,
    debug: bool,
) -> Result<()> {
    let kind = match classify(err) {
        Classified::Recoverable(recoverable) => recoverable.kind(),
        Classified::Fatal { kind } => kind,
    };
    transport.send(&Response::Fatal {
        kind,
        message: format!("{err:#}"),
        trace: debug.then(|| format!("{err:?}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::{FatalError, UNCLASSIFIED_KIND};
    use crate::test_support::{example_loader, protocol_lines, run_session};

    const ALL_HOOKS: &str = "'build_wheel', 'build_sdist', 'prepare_metadata_for_build_wheel', \
                             'get_requires_for_build_wheel', 'get_requires_for_build_sdist'";

    #[test]
    fn shutdown_first_never_asks_for_a_backend() {
        let (result, lines) = run_session(example_loader(), &["shutdown"], false);
        assert_eq!(result.expect("session"), SessionEnd::Shutdown);
        assert_eq!(lines, ["READY", "EXPECT action", "SHUTDOWN"]);
    }

    #[test]
    fn run_requests_fields_in_schema_order() {
        let (result, lines) = run_session(
            example_loader(),
            &["run", "examplepkg.backend", "get_requires_for_build_wheel", "", "shutdown"],
            false,
        );
        assert_eq!(result.expect("session"), SessionEnd::Shutdown);
        assert_eq!(
            protocol_lines(&lines),
            [
                "READY",
                "EXPECT action",
                "EXPECT build-backend",
                "EXPECT hook-name",
                "EXPECT config-settings",
                "OK [\"wheel\"]",
                "READY",
                "EXPECT action",
                "SHUTDOWN",
            ]
        );
        assert!(lines.iter().any(|line| line.starts_with("DEBUG ran hook in ")));
    }

    #[test]
    fn unknown_hook_lists_every_hook_and_continues() {
        let (result, lines) = run_session(
            example_loader(),
            &["run", "examplepkg.backend", "build_egg", "shutdown"],
            false,
        );
        assert_eq!(result.expect("session"), SessionEnd::Shutdown);
        let expected = format!(
            "ERROR InvalidHookName The name 'build_egg' is not a valid hook. Expected one of: {ALL_HOOKS}"
        );
        assert!(lines.contains(&expected), "{lines:?}");
        assert_eq!(lines.last().map(String::as_str), Some("SHUTDOWN"));
    }

    #[test]
    fn unsupported_hook_lists_only_exposed_hooks() {
        let (_, lines) = run_session(
            example_loader(),
            &["run", "examplepkg.partial", "build_wheel", "out", "", "", "shutdown"],
            false,
        );
        assert!(
            lines.contains(
                &"ERROR UnsupportedHook The hook 'build_wheel' is not supported by the backend. \
                  The backend supports: 'build_sdist', 'get_requires_for_build_sdist'"
                    .to_string()
            ),
            "{lines:?}"
        );
    }

    #[test]
    fn repeated_runs_are_independent() {
        let script = [
            "run",
            "examplepkg.backend",
            "build_sdist",
            "dist",
            "{\"--build-option\": \"x\"}",
            "run",
            "examplepkg.backend",
            "build_sdist",
            "dist",
            "{\"--build-option\": \"x\"}",
            "shutdown",
        ];
        let (result, lines) = run_session(example_loader(), &script, false);
        assert_eq!(result.expect("session"), SessionEnd::Shutdown);
        let oks: Vec<&String> = lines.iter().filter(|line| line.starts_with("OK ")).collect();
        assert_eq!(
            oks,
            ["OK dist/examplepkg-1.0.tar.gz", "OK dist/examplepkg-1.0.tar.gz"]
        );
    }

    #[test]
    fn malformed_config_settings_is_recoverable() {
        let (result, lines) = run_session(
            example_loader(),
            &["run", "examplepkg.backend", "get_requires_for_build_sdist", "{bad", "shutdown"],
            false,
        );
        assert_eq!(result.expect("session"), SessionEnd::Shutdown);
        assert!(
            lines.contains(
                &"ERROR MalformedHookArgument Malformed content for argument 'config_settings': '{bad'"
                    .to_string()
            ),
            "{lines:?}"
        );
    }

    #[test]
    fn empty_backend_line_uses_legacy_backend() {
        let (_, lines) = run_session(
            example_loader(),
            &["run", "", "get_requires_for_build_sdist", "", "shutdown"],
            false,
        );
        assert!(
            lines.contains(&"DEBUG backend=setuptools.build_meta:__legacy__ hook=get_requires_for_build_sdist config_settings=None".to_string()),
            "{lines:?}"
        );
        assert!(lines.contains(&"OK [\"setuptools\"]".to_string()), "{lines:?}");
    }

    #[test]
    fn invalid_action_is_recoverable() {
        let (result, lines) = run_session(example_loader(), &["jump", "shutdown"], false);
        assert_eq!(result.expect("session"), SessionEnd::Shutdown);
        assert_eq!(
            lines,
            [
                "READY",
                "EXPECT action",
                "ERROR InvalidAction Received invalid action 'jump'. Expected one of: 'run', 'shutdown'",
                "READY",
                "EXPECT action",
                "SHUTDOWN",
            ]
        );
    }

    #[test]
    fn backend_errors_are_recoverable() {
        let (_, lines) = run_session(
            example_loader(),
            &[
                "run",
                "a:b:c",
                "run",
                "nowhere",
                "run",
                "examplepkg:nothing",
                "shutdown",
            ],
            false,
        );
        let errors: Vec<&str> = lines
            .iter()
            .filter_map(|line| line.strip_prefix("ERROR "))
            .map(|rest| rest.split(' ').next().unwrap_or_default())
            .collect();
        assert_eq!(
            errors,
            [
                "MalformedBackendName",
                "MissingBackendModule",
                "MissingBackendAttribute"
            ]
        );
    }

    #[test]
    fn hook_failures_are_reported_and_loop_continues() {
        let (result, lines) = run_session(
            example_loader(),
            &["run", "examplepkg.errors", "get_requires_for_build_wheel", "", "shutdown"],
            false,
        );
        assert_eq!(result.expect("session"), SessionEnd::Shutdown);
        assert!(lines.contains(&"ERROR HookRuntimeError Oh no".to_string()), "{lines:?}");
    }

    #[test]
    fn closed_input_is_fatal() {
        let (result, lines) = run_session(example_loader(), &["run", "examplepkg.backend"], false);
        let err = result.expect_err("fatal");
        assert!(matches!(
            err.downcast_ref::<FatalError>(),
            Some(FatalError::UnreadableInput { .. })
        ));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("FATAL UnreadableInput Standard input is not readable: input stream closed")
        );
    }

    #[test]
    fn termination_in_a_hook_is_fatal() {
        let (result, lines) = run_session(
            example_loader(),
            &["run", "examplepkg.interrupted", "build_sdist", "dist", "", "shutdown"],
            false,
        );
        assert!(result.is_err());
        assert_eq!(
            lines.last().map(String::as_str),
            Some("FATAL Terminated Interrupted by SIGINT")
        );
        assert!(!lines.contains(&"SHUTDOWN".to_string()));
    }

    #[test]
    fn debug_mode_serves_one_request_and_traces_fatals() {
        let (result, lines) = run_session(
            example_loader(),
            &["run", "examplepkg.backend", "get_requires_for_build_wheel", "", "shutdown"],
            true,
        );
        assert_eq!(result.expect("session"), SessionEnd::SingleShot);
        assert!(!lines.contains(&"SHUTDOWN".to_string()));
        assert_eq!(lines.iter().filter(|line| *line == "READY").count(), 1);

        let (result, lines) = run_session(example_loader(), &[], true);
        assert!(result.is_err());
        let fatal = lines
            .iter()
            .position(|line| {
                line == "FATAL UnreadableInput Standard input is not readable: input stream closed"
            })
            .expect("fatal line");
        assert_eq!(
            lines.get(fatal + 1).map(String::as_str),
            Some("Standard input is not readable: input stream closed")
        );
    }

    #[test]
    fn unclassified_errors_report_their_chain() {
        let mut transport = crate::io::transport::Transport::new(std::io::empty(), Vec::new());
        let err = anyhow::anyhow!("disk full").context("write wheel");
        report_fatal(&mut transport, &err, false).expect("report");
        assert_eq!(
            String::from_utf8_lossy(transport.writer()),
            format!("FATAL {UNCLASSIFIED_KIND} write wheel: disk full\n")
        );
    }
}

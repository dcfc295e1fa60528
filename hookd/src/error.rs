//! Two-tier error taxonomy for the hook daemon.
//!
//! - [`HookdError`]: recoverable failures. The session reports them as
//!   `ERROR <kind> <message>` and keeps serving requests.
//! - [`FatalError`]: failures that end the process after a `FATAL` line.
//!
//! Everything travels as [`anyhow::Error`]; [`classify`] recovers the tier at
//! the session boundary. Any error that is neither of the above is fatal with
//! kind [`UNCLASSIFIED_KIND`].

use std::fmt;

use thiserror::Error;

use crate::core::hook::{Action, ArgumentKind, HookKind};
use crate::exit_codes;

/// Wire kind reported for fatal errors the daemon does not recognize.
pub const UNCLASSIFIED_KIND: &str = "UnclassifiedError";

/// A non-fatal failure tied to a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookdError {
    #[error(
        "Received invalid action '{name}'. Expected one of: {}",
        quoted(Action::ALL)
    )]
    InvalidAction { name: String },

    #[error(
        "The name '{name}' is not a valid hook. Expected one of: {}",
        quoted(HookKind::ALL)
    )]
    InvalidHookName { name: String },

    #[error("Backend '{name}' is malformed")]
    MalformedBackendName { name: String },

    #[error("Failed to import the backend '{name}'")]
    MissingBackendModule { name: String },

    #[error("Failed to find attribute '{attribute}' in the backend module '{module}'")]
    MissingBackendAttribute { module: String, attribute: String },

    #[error(
        "The hook '{hook}' is not supported by the backend. The backend supports: {}",
        quoted(.supported)
    )]
    UnsupportedHook {
        hook: HookKind,
        supported: Vec<HookKind>,
    },

    #[error("Malformed content for argument '{argument}': '{raw}'")]
    MalformedHookArgument { raw: String, argument: ArgumentKind },

    /// A hook ran and failed; `message` is the failure's own description.
    #[error("{message}")]
    HookRuntimeError { message: String },
}

impl HookdError {
    /// Machine-readable kind written after the `ERROR` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAction { .. } => "InvalidAction",
            Self::InvalidHookName { .. } => "InvalidHookName",
            Self::MalformedBackendName { .. } => "MalformedBackendName",
            Self::MissingBackendModule { .. } => "MissingBackendModule",
            Self::MissingBackendAttribute { .. } => "MissingBackendAttribute",
            Self::UnsupportedHook { .. } => "UnsupportedHook",
            Self::MalformedHookArgument { .. } => "MalformedHookArgument",
            Self::HookRuntimeError { .. } => "HookRuntimeError",
        }
    }
}

/// Signals that end the daemon when they reach a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// An unrecoverable failure in the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    #[error("Standard input is not readable: {reason}")]
    UnreadableInput { reason: String },

    /// Never wrapped into a [`HookdError`]; always ends the session.
    #[error("Interrupted by {signal}")]
    Terminated { signal: TerminationSignal },
}

impl FatalError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnreadableInput { .. } => "UnreadableInput",
            Self::Terminated { .. } => "Terminated",
        }
    }
}

/// Tier of an error as seen by the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified<'a> {
    Recoverable(&'a HookdError),
    Fatal { kind: &'static str },
}

/// Classify an error into the recoverable or fatal tier.
pub fn classify(err: &anyhow::Error) -> Classified<'_> {
    if let Some(recoverable) = err.downcast_ref::<HookdError>() {
        return Classified::Recoverable(recoverable);
    }
    match err.downcast_ref::<FatalError>() {
        Some(fatal) => Classified::Fatal { kind: fatal.kind() },
        None => Classified::Fatal {
            kind: UNCLASSIFIED_KIND,
        },
    }
}

/// Returns true if `err` is a termination signal that must propagate unwrapped.
pub fn is_termination(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<FatalError>(),
        Some(FatalError::Terminated { .. })
    )
}

/// Process exit code for an error that ended the session.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if is_termination(err) {
        exit_codes::INTERRUPTED
    } else {
        exit_codes::FATAL
    }
}

/// Render a closed option set as `'a', 'b', 'c'`.
fn quoted<I>(items: I) -> String
where
    I: IntoIterator,
    I::Item: fmt::Display,
{
    let names: Vec<String> = items.into_iter().map(|item| format!("'{item}'")).collect();
    if names.is_empty() {
        return "none".to_string();
    }
    names.join(", ")
}

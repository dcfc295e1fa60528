//! Invoking a decoded hook on its backend.

use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::decode::Request;
use crate::error::{HookdError, is_termination};

/// Run the requested hook and return its result text.
///
/// Hook failures (including panics) become [`HookdError::HookRuntimeError`]
/// with the failure's own description. Termination signals are returned
/// untouched so the session ends.
#[instrument(skip_all, fields(backend = %request.backend_name, hook = %request.hook))]
pub fn dispatch(request: &Request) -> Result<String> {
    let Some(callable) = request.backend.try_get(request.hook) else {
        return Err(HookdError::UnsupportedHook {
            hook: request.hook,
            supported: request.backend.exposed_hooks(),
        }
        .into());
    };

    info!("invoking hook");
    match panic::catch_unwind(AssertUnwindSafe(|| callable.call(&request.args))) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) if is_termination(&err) => Err(err),
        Ok(Err(err)) => {
            warn!(error = %format!("{err:#}"), "hook failed");
            Err(HookdError::HookRuntimeError {
                message: format!("{err:#}"),
            }
            .into())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(%message, "hook panicked");
            Err(HookdError::HookRuntimeError { message }.into())
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "hook panicked".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use anyhow::anyhow;

    use crate::backend::static_backend::StaticBackend;
    use crate::core::args::HookArgs;
    use crate::core::hook::HookKind;
    use crate::error::{FatalError, TerminationSignal};

    fn request(backend: StaticBackend, hook: HookKind) -> Request {
        Request {
            backend_name: "pkg".to_string(),
            backend: Rc::new(backend),
            hook,
            args: HookArgs::new(),
        }
    }

    fn recoverable(err: &anyhow::Error) -> &HookdError {
        err.downcast_ref::<HookdError>().expect("recoverable")
    }

    #[test]
    fn returns_hook_result() {
        let backend = StaticBackend::new()
            .with_fn(HookKind::GetRequiresForBuildSdist, |_| Ok("[\"wheel\"]".to_string()));
        let result = dispatch(&request(backend, HookKind::GetRequiresForBuildSdist)).expect("ok");
        assert_eq!(result, "[\"wheel\"]");
    }

    #[test]
    fn missing_hook_lists_only_exposed_hooks() {
        let backend = StaticBackend::new()
            .with_fn(HookKind::BuildSdist, |_| Ok(String::new()))
            .with_fn(HookKind::GetRequiresForBuildSdist, |_| Ok(String::new()));
        let err = dispatch(&request(backend, HookKind::BuildWheel)).expect_err("unsupported");
        assert_eq!(
            recoverable(&err).to_string(),
            "The hook 'build_wheel' is not supported by the backend. \
             The backend supports: 'build_sdist', 'get_requires_for_build_sdist'"
        );
    }

    #[test]
    fn failures_are_wrapped_verbatim() {
        let backend = StaticBackend::new().with_fn(HookKind::BuildSdist, |_| {
            Err(anyhow!("Oh no").context("build failed"))
        });
        let err = dispatch(&request(backend, HookKind::BuildSdist)).expect_err("fails");
        assert_eq!(
            recoverable(&err),
            &HookdError::HookRuntimeError {
                message: "build failed: Oh no".to_string()
            }
        );
    }

    #[test]
    fn panics_become_runtime_errors() {
        let backend = StaticBackend::new().with_fn(HookKind::BuildSdist, |_| -> Result<String> {
            panic!("backend exploded")
        });
        let err = dispatch(&request(backend, HookKind::BuildSdist)).expect_err("panic");
        assert_eq!(recoverable(&err).kind(), "HookRuntimeError");
        assert_eq!(recoverable(&err).to_string(), "backend exploded");
    }

    #[test]
    fn termination_is_not_wrapped() {
        let backend = StaticBackend::new().with_fn(HookKind::BuildSdist, |_| {
            Err(FatalError::Terminated {
                signal: TerminationSignal::Interrupt,
            }
            .into())
        });
        let err = dispatch(&request(backend, HookKind::BuildSdist)).expect_err("terminated");
        assert!(err.downcast_ref::<HookdError>().is_none());
        assert!(is_termination(&err));
    }
}

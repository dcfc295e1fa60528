//! Turning the parent's answers into a validated hook request.

use std::fmt;
use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::backend::{BackendHandle, BackendLoader, BackendResolver};
use crate::core::args::{HookArgs, decode_argument};
use crate::core::backend_spec::BackendSpec;
use crate::core::hook::HookKind;
use crate::io::transport::{Response, Transport};

/// A fully decoded `run` request.
pub struct Request {
    pub backend_name: String,
    pub backend: BackendHandle,
    pub hook: HookKind,
    pub args: HookArgs,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("backend_name", &self.backend_name)
            .field("hook", &self.hook)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Ask for and decode the fields of a `run` request.
///
/// Fields are requested one `EXPECT` at a time: the backend (resolved before
/// anything else is asked), the hook name, then each argument in the hook's
/// schema order. The first invalid field aborts decoding.
#[instrument(skip_all)]
pub fn decode_request<R, W, L>(
    transport: &mut Transport<R, W>,
    resolver: &mut BackendResolver<L>,
) -> Result<Request>
where
    R: BufRead,
    W: Write,
    L: BackendLoader,
{
    let started = Instant::now();

    transport.send(&Response::Expect("build-backend"))?;
    let spec = BackendSpec::from_line(&transport.read_line()?)?;
    let backend = resolver.resolve(&spec)?;

    transport.send(&Response::Expect("hook-name"))?;
    let hook: HookKind = transport.read_line()?.parse()?;

    let mut args = HookArgs::new();
    for &kind in hook.arguments() {
        transport.send(&Response::Expect(kind.wire_name()))?;
        let raw = transport.read_line()?;
        args.push(kind, decode_argument(kind, &raw)?);
    }

    let mut summary = vec![
        format!("backend={spec}"),
        format!("hook={hook}"),
    ];
    summary.extend(args.iter().map(|(kind, value)| format!("{kind}={value}")));
    transport.send(&Response::Debug(summary))?;

    let elapsed = started.elapsed().as_secs_f64() * 1000.0;
    transport.send(&Response::Debug(vec![format!(
        "parsed hook inputs in {elapsed:.2}ms"
    )]))?;
    debug!(backend = %spec, %hook, args = args.len(), "request decoded");

    Ok(Request {
        backend_name: spec.to_string(),
        backend,
        hook,
        args,
    })
}

//! Build-hook daemon speaking a line protocol on stdin/stdout.
//!
//! A parent process starts `hookd`, answers its `EXPECT` prompts one line at a
//! time, and reads back `OK`, `ERROR` or `FATAL` records. Backends are opaque
//! capability providers exposing up to five build hooks.
//!
//! - **[`core`]**: Pure vocabularies and parsers (hooks, backend specs,
//!   config settings, decoded arguments). No I/O.
//! - **[`io`]**: Side-effecting pieces (line transport, config file, child
//!   processes, working directory guard).
//! - **[`backend`]**: Capability traits, the memoizing resolver, and the
//!   in-process and command-backed implementations.
//!
//! [`session`] drives the loop, using [`decode`] to read a request and
//! [`dispatch`] to run it. [`error`] holds the two-tier error taxonomy.

pub mod backend;
pub mod core;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

//! Stable exit codes for the hookd binary.

/// The parent asked for `shutdown`, or debug mode finished its request.
pub const OK: i32 = 0;
/// A fatal error ended the session.
pub const FATAL: i32 = 1;
/// A hook was interrupted or terminated by a signal.
pub const INTERRUPTED: i32 = 130;

//! Pure protocol vocabulary and decoding rules.
//!
//! Nothing here touches streams, the filesystem, or processes; every function
//! maps text to typed values or to a [`HookdError`](crate::error::HookdError).

pub mod args;
pub mod backend_spec;
pub mod hook;
pub mod settings;

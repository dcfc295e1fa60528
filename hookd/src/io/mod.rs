//! Side-effecting helpers: streams, config files, child processes, signals,
//! and the working directory.

pub mod config;
pub mod cwd;
pub mod process;
pub mod signals;
pub mod transport;

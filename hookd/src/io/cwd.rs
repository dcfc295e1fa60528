//! Scoped changes of the process working directory.
//!
//! The working directory is process-wide state. [`ScopedCwd`] restores the
//! previous directory when dropped, including on early returns and unwinding.
//! Not thread safe: only one scope should be active at a time.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Guard that holds the process inside a directory until dropped.
#[derive(Debug)]
pub struct ScopedCwd {
    original: PathBuf,
    current: PathBuf,
}

impl ScopedCwd {
    /// Resolve `path` and make it the working directory.
    pub fn enter(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let target = path
            .canonicalize()
            .with_context(|| format!("resolve {}", path.display()))?;
        let original = env::current_dir().context("read current directory")?;
        env::set_current_dir(&target)
            .with_context(|| format!("change directory to {}", target.display()))?;
        debug!(from = %original.display(), to = %target.display(), "entered directory");
        Ok(Self {
            original,
            current: target,
        })
    }

    /// The resolved directory this scope entered.
    pub fn path(&self) -> &Path {
        &self.current
    }

    /// The directory restored on drop.
    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for ScopedCwd {
    fn drop(&mut self) {
        if let Err(err) = env::set_current_dir(&self.original) {
            warn!(
                err = %err,
                original = %self.original.display(),
                "failed to restore working directory"
            );
        }
    }
}

/// Run `f` with the working directory set to `path`, restoring it afterwards.
pub fn with_cwd<T>(path: impl AsRef<Path>, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    let scope = ScopedCwd::enter(path)?;
    f(scope.path())
}

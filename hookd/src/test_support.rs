//! Test-only helpers: scripted backends and in-memory sessions.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use crate::backend::static_backend::{StaticBackend, StaticLoader};
use crate::backend::{BackendLoader, BackendResolver};
use crate::core::hook::HookKind;
use crate::error::{FatalError, TerminationSignal};
use crate::io::config::DEFAULT_CONFIG_FILE;
use crate::io::transport::Transport;
use crate::session::{Session, SessionEnd};

/// Join protocol answers into newline-terminated input.
pub fn script(lines: &[&str]) -> Vec<u8> {
    let mut input = String::new();
    for line in lines {
        input.push_str(line);
        input.push('\n');
    }
    input.into_bytes()
}

/// A backend implementing every hook with deterministic results.
pub fn full_backend() -> StaticBackend {
    StaticBackend::new()
        .with_fn(HookKind::BuildWheel, |args| {
            let dir = args.wheel_directory().context("wheel_directory")?;
            Ok(dir
                .join("examplepkg-1.0-py3-none-any.whl")
                .display()
                .to_string())
        })
        .with_fn(HookKind::BuildSdist, |args| {
            let dir = args.sdist_directory().context("sdist_directory")?;
            Ok(dir.join("examplepkg-1.0.tar.gz").display().to_string())
        })
        .with_fn(HookKind::PrepareMetadataForBuildWheel, |_| {
            Ok("examplepkg-1.0.dist-info".to_string())
        })
        .with_fn(HookKind::GetRequiresForBuildWheel, |_| {
            Ok("[\"wheel\"]".to_string())
        })
        .with_fn(HookKind::GetRequiresForBuildSdist, |_| Ok("[]".to_string()))
}

/// A backend that only builds source distributions.
pub fn partial_backend() -> StaticBackend {
    StaticBackend::new()
        .with_fn(HookKind::BuildSdist, |_| Ok("partial-1.0.tar.gz".to_string()))
        .with_fn(HookKind::GetRequiresForBuildSdist, |_| Ok("[]".to_string()))
}

/// A backend whose every hook fails with "Oh no".
pub fn error_backend() -> StaticBackend {
    HookKind::ALL
        .into_iter()
        .fold(StaticBackend::new(), |backend, hook| {
            backend.with_fn(hook, |_| bail!("Oh no"))
        })
}

/// A backend whose hooks behave as if the build was interrupted.
pub fn interrupted_backend() -> StaticBackend {
    HookKind::ALL
        .into_iter()
        .fold(StaticBackend::new(), |backend, hook| {
            backend.with_fn(hook, |_| {
                Err(FatalError::Terminated {
                    signal: TerminationSignal::Interrupt,
                }
                .into())
            })
        })
}

/// Loader with `examplepkg.{backend,partial,errors,interrupted}` and the legacy default.
pub fn example_loader() -> StaticLoader {
    StaticLoader::new()
        .attribute("examplepkg", "backend", full_backend)
        .attribute("examplepkg", "partial", partial_backend)
        .attribute("examplepkg", "errors", error_backend)
        .attribute("examplepkg", "interrupted", interrupted_backend)
        .attribute("setuptools.build_meta", "__legacy__", || {
            StaticBackend::new()
                .with_fn(HookKind::GetRequiresForBuildSdist, |_| {
                    Ok("[\"setuptools\"]".to_string())
                })
                .with_fn(HookKind::GetRequiresForBuildWheel, |_| {
                    Ok("[\"setuptools\", \"wheel\"]".to_string())
                })
        })
}

/// Run a whole session over in-memory streams and return its output lines.
pub fn run_session<L: BackendLoader>(
    loader: L,
    input: &[&str],
    debug: bool,
) -> (Result<SessionEnd>, Vec<String>) {
    let transport = Transport::new(Cursor::new(script(input)), Vec::new());
    let mut session = Session::new(transport, BackendResolver::new(loader), debug);
    let result = session.run();
    let (_, output) = session.into_transport().into_inner();
    let lines = String::from_utf8_lossy(&output)
        .lines()
        .map(str::to_string)
        .collect();
    (result, lines)
}

/// Output lines without `DEBUG` records.
pub fn protocol_lines(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|line| !line.starts_with("DEBUG "))
        .cloned()
        .collect()
}

/// A scratch directory holding a `hookd.toml`.
pub struct TempManifest {
    dir: TempDir,
}

impl TempManifest {
    pub fn new(contents: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        fs::write(dir.path().join(DEFAULT_CONFIG_FILE), contents)
            .context("write manifest")?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join(DEFAULT_CONFIG_FILE)
    }
}

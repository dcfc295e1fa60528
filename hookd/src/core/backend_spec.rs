//! Backend specification strings (`module` or `module:attribute`).

use std::fmt;
use std::str::FromStr;

use crate::error::HookdError;

/// Backend used when the parent sends an empty `build-backend` line.
pub const LEGACY_BACKEND: &str = "setuptools.build_meta:__legacy__";

/// A validated backend specification.
///
/// The raw string is kept verbatim; it is the resolver's cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendSpec {
    raw: String,
    module: String,
    attribute: Option<String>,
}

impl BackendSpec {
    /// Parse a spec, rejecting empty module parts, empty attributes, and extra colons.
    pub fn parse(raw: &str) -> Result<Self, HookdError> {
        let malformed = || HookdError::MalformedBackendName {
            name: raw.to_string(),
        };

        let mut parts = raw.split(':');
        let module = parts.next().unwrap_or_default();
        let attribute = parts.next();
        if parts.next().is_some() || module.is_empty() {
            return Err(malformed());
        }
        if attribute.is_some_and(str::is_empty) {
            return Err(malformed());
        }

        Ok(Self {
            raw: raw.to_string(),
            module: module.to_string(),
            attribute: attribute.map(str::to_string),
        })
    }

    /// Parse a `build-backend` protocol line; empty selects [`LEGACY_BACKEND`].
    pub fn from_line(line: &str) -> Result<Self, HookdError> {
        if line.is_empty() {
            return Self::parse(LEGACY_BACKEND);
        }
        Self::parse(line)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }
}

impl fmt::Display for BackendSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for BackendSpec {
    type Err = HookdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

//! Backends: capability providers that expose hooks by name.
//!
//! The session never inspects a backend beyond [`CapabilityProvider::try_get`].
//! Turning a [`BackendSpec`] into a provider is the job of a [`BackendLoader`];
//! [`BackendResolver`] wraps a loader with a cache keyed by the exact spec
//! string, so a spec is loaded at most once per process.

pub mod manifest;
pub mod static_backend;

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Result;
use tracing::debug;

use crate::core::args::HookArgs;
use crate::core::backend_spec::BackendSpec;
use crate::core::hook::HookKind;
use crate::error::HookdError;

/// A single invocable hook.
pub trait HookCallable {
    /// Run the hook. The returned text is sent to the parent as `OK <result>`.
    fn call(&self, args: &HookArgs) -> Result<String>;
}

/// An opaque bag of hooks, queryable only by hook name.
pub trait CapabilityProvider {
    fn try_get(&self, hook: HookKind) -> Option<&dyn HookCallable>;

    /// Hooks from the closed set that this provider implements.
    fn exposed_hooks(&self) -> Vec<HookKind> {
        HookKind::ALL
            .into_iter()
            .filter(|hook| self.try_get(*hook).is_some())
            .collect()
    }
}

/// Shared handle to a resolved backend.
pub type BackendHandle = Rc<dyn CapabilityProvider>;

/// Uncached backend lookup.
pub trait BackendLoader {
    fn load(&self, spec: &BackendSpec) -> Result<BackendHandle, HookdError>;
}

/// Memoizing resolver. Failed loads are not cached.
pub struct BackendResolver<L> {
    loader: L,
    cache: HashMap<String, BackendHandle>,
}

impl<L: BackendLoader> BackendResolver<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, spec: &BackendSpec) -> Result<BackendHandle, HookdError> {
        if let Some(handle) = self.cache.get(spec.as_str()) {
            debug!(spec = %spec, "backend cache hit");
            return Ok(Rc::clone(handle));
        }
        let handle = self.loader.load(spec)?;
        debug!(spec = %spec, hooks = ?handle.exposed_hooks(), "backend loaded");
        self.cache
            .insert(spec.as_str().to_string(), Rc::clone(&handle));
        Ok(handle)
    }

    /// Number of distinct specs resolved so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

/// Module/attribute namespace a loader resolves specs against.
pub trait ModuleIndex {
    fn has_module(&self, module: &str) -> bool;
    fn has_attribute(&self, module: &str, attribute: &str) -> bool;
}

/// Where a spec points inside a [`ModuleIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub module: String,
    pub attribute: Option<String>,
}

/// Locate a spec using module-import rules.
///
/// `a.b` that is not itself a module falls back to attribute `b` of module
/// `a`. An explicit `:attribute` is then looked up on whichever module was
/// found.
pub fn locate(spec: &BackendSpec, index: &impl ModuleIndex) -> Result<Located, HookdError> {
    let name = spec.module();

    let mut located = if index.has_module(name) {
        Located {
            module: name.to_string(),
            attribute: None,
        }
    } else {
        let Some((parent, child)) = name.rsplit_once('.') else {
            return Err(HookdError::MissingBackendModule {
                name: name.to_string(),
            });
        };
        if !index.has_module(parent) {
            return Err(HookdError::MissingBackendModule {
                name: name.to_string(),
            });
        }
        if !index.has_attribute(parent, child) {
            return Err(HookdError::MissingBackendAttribute {
                module: name.to_string(),
                attribute: child.to_string(),
            });
        }
        Located {
            module: parent.to_string(),
            attribute: Some(child.to_string()),
        }
    };

    if let Some(attribute) = spec.attribute() {
        if !index.has_attribute(&located.module, attribute) {
            return Err(HookdError::MissingBackendAttribute {
                module: name.to_string(),
                attribute: attribute.to_string(),
            });
        }
        located.attribute = Some(attribute.to_string());
    }

    Ok(located)
}

//! In-process backends built from Rust closures.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;

use crate::backend::{
    BackendHandle, BackendLoader, CapabilityProvider, HookCallable, ModuleIndex, locate,
};
use crate::core::args::HookArgs;
use crate::core::backend_spec::BackendSpec;
use crate::core::hook::HookKind;
use crate::error::HookdError;

/// Adapts a closure into a [`HookCallable`].
pub struct FnHook<F>(pub F);

impl<F> HookCallable for FnHook<F>
where
    F: Fn(&HookArgs) -> Result<String>,
{
    fn call(&self, args: &HookArgs) -> Result<String> {
        (self.0)(args)
    }
}

/// A backend whose hooks are registered up front.
#[derive(Default)]
pub struct StaticBackend {
    hooks: BTreeMap<HookKind, Box<dyn HookCallable>>,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(mut self, hook: HookKind, callable: impl HookCallable + 'static) -> Self {
        self.hooks.insert(hook, Box::new(callable));
        self
    }

    pub fn with_fn<F>(self, hook: HookKind, f: F) -> Self
    where
        F: Fn(&HookArgs) -> Result<String> + 'static,
    {
        self.with_hook(hook, FnHook(f))
    }
}

impl CapabilityProvider for StaticBackend {
    fn try_get(&self, hook: HookKind) -> Option<&dyn HookCallable> {
        self.hooks.get(&hook).map(|callable| callable.as_ref())
    }
}

impl fmt::Debug for StaticBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticBackend")
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

type Factory = Box<dyn Fn() -> StaticBackend>;

#[derive(Default)]
struct StaticModule {
    root: Option<Factory>,
    attributes: BTreeMap<String, Factory>,
}

/// Loader over a table of in-process modules.
///
/// Each load builds a fresh backend from its factory, so distinct specs never
/// share a handle.
#[derive(Default)]
pub struct StaticLoader {
    modules: BTreeMap<String, StaticModule>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module whose own namespace is a backend.
    pub fn module(
        mut self,
        name: impl Into<String>,
        factory: impl Fn() -> StaticBackend + 'static,
    ) -> Self {
        self.modules.entry(name.into()).or_default().root = Some(Box::new(factory));
        self
    }

    /// Register a backend object as an attribute of a module.
    pub fn attribute(
        mut self,
        module: impl Into<String>,
        attribute: impl Into<String>,
        factory: impl Fn() -> StaticBackend + 'static,
    ) -> Self {
        self.modules
            .entry(module.into())
            .or_default()
            .attributes
            .insert(attribute.into(), Box::new(factory));
        self
    }
}

impl ModuleIndex for StaticLoader {
    fn has_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    fn has_attribute(&self, module: &str, attribute: &str) -> bool {
        self.modules
            .get(module)
            .is_some_and(|entry| entry.attributes.contains_key(attribute))
    }
}

impl BackendLoader for StaticLoader {
    fn load(&self, spec: &BackendSpec) -> Result<BackendHandle, HookdError> {
        let located = locate(spec, self)?;
        let module = self
            .modules
            .get(&located.module)
            .ok_or_else(|| HookdError::MissingBackendModule {
                name: located.module.clone(),
            })?;
        let backend = match &located.attribute {
            Some(attribute) => module.attributes.get(attribute).map(|factory| factory()),
            None => Some(module.root.as_ref().map(|factory| factory()).unwrap_or_default()),
        };
        let backend = backend.ok_or_else(|| HookdError::MissingBackendAttribute {
            module: located.module.clone(),
            attribute: located.attribute.clone().unwrap_or_default(),
        })?;
        Ok(BackendHandle::from(Box::new(backend) as Box<dyn CapabilityProvider>))
    }
}

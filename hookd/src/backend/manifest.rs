//! Command-backed backends described in the `[backends]` tables of `hookd.toml`.
//!
//! Each hook is an argv run without a shell. The hook's arguments arrive on
//! stdin as one JSON document and the last non-empty stdout line is the result.

use std::collections::BTreeMap;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::backend::{
    BackendHandle, BackendLoader, CapabilityProvider, HookCallable, ModuleIndex, locate,
};
use crate::core::args::HookArgs;
use crate::core::backend_spec::BackendSpec;
use crate::core::hook::HookKind;
use crate::error::{FatalError, HookdError};
use crate::io::config::{BackendManifest, HookdConfig};
use crate::io::process::run_command_with_timeout;

/// One hook implemented by an external command.
#[derive(Debug, Clone)]
pub struct CommandHook {
    hook: HookKind,
    argv: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandHook {
    pub fn new(hook: HookKind, argv: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            hook,
            argv,
            timeout,
            output_limit_bytes,
        }
    }

    /// Single-line JSON document written to the command's stdin.
    pub fn payload(&self, args: &HookArgs) -> String {
        let mut doc = Map::new();
        doc.insert("hook".to_string(), Value::String(self.hook.to_string()));
        for (kind, value) in args.iter() {
            doc.insert(kind.as_str().to_string(), value.to_json());
        }
        Value::Object(doc).to_string()
    }
}

impl HookCallable for CommandHook {
    #[instrument(skip_all, fields(hook = %self.hook))]
    fn call(&self, args: &HookArgs) -> Result<String> {
        let Some((program, rest)) = self.argv.split_first() else {
            bail!("hook {} has an empty command", self.hook);
        };

        let mut cmd = Command::new(program);
        cmd.args(rest);
        let mut stdin = self.payload(args);
        stdin.push('\n');

        let output = run_command_with_timeout(cmd, stdin.as_bytes(), self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run {program}"))?;

        if output.timed_out {
            bail!(
                "{program} did not finish within {}s",
                self.timeout.as_secs()
            );
        }
        if let Some(signal) = output.termination_signal() {
            warn!(%signal, "hook command was terminated");
            return Err(FatalError::Terminated { signal }.into());
        }
        if !output.status.success() {
            let stderr = output.stderr_text();
            if stderr.is_empty() {
                bail!("{program} exited with {}", output.status);
            }
            bail!("{program} exited with {}: {stderr}", output.status);
        }

        Ok(output.last_stdout_line())
    }
}

/// Backend whose hooks are external commands.
#[derive(Debug, Clone, Default)]
pub struct CommandBackend {
    hooks: BTreeMap<HookKind, CommandHook>,
}

impl CapabilityProvider for CommandBackend {
    fn try_get(&self, hook: HookKind) -> Option<&dyn HookCallable> {
        self.hooks
            .get(&hook)
            .map(|command| command as &dyn HookCallable)
    }
}

/// Resolves specs against the configured `[backends]` tables.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    backends: BTreeMap<String, BackendManifest>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ManifestLoader {
    pub fn new(config: &HookdConfig) -> Self {
        Self {
            backends: config.backends.clone(),
            timeout: config.hook_timeout(),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    fn build(&self, manifest: &BackendManifest) -> CommandBackend {
        let mut hooks = BTreeMap::new();
        for (name, argv) in &manifest.hooks {
            match name.parse::<HookKind>() {
                Ok(hook) => {
                    hooks.insert(
                        hook,
                        CommandHook::new(hook, argv.clone(), self.timeout, self.output_limit_bytes),
                    );
                }
                Err(_) => warn!(hook = %name, "ignoring unknown hook in manifest"),
            }
        }
        CommandBackend { hooks }
    }
}

impl ModuleIndex for ManifestLoader {
    fn has_module(&self, module: &str) -> bool {
        self.backends.contains_key(module)
    }

    fn has_attribute(&self, module: &str, attribute: &str) -> bool {
        self.backends
            .get(module)
            .is_some_and(|manifest| manifest.attributes.contains_key(attribute))
    }
}

impl BackendLoader for ManifestLoader {
    fn load(&self, spec: &BackendSpec) -> Result<BackendHandle, HookdError> {
        let located = locate(spec, self)?;
        let module = self
            .backends
            .get(&located.module)
            .ok_or_else(|| HookdError::MissingBackendModule {
                name: located.module.clone(),
            })?;
        let manifest = match &located.attribute {
            Some(attribute) => module.attributes.get(attribute).ok_or_else(|| {
                HookdError::MissingBackendAttribute {
                    module: located.module.clone(),
                    attribute: attribute.clone(),
                }
            })?,
            None => module,
        };
        debug!(spec = %spec, module = %located.module, attribute = ?located.attribute, "manifest backend located");
        Ok(BackendHandle::from(
            Box::new(self.build(manifest)) as Box<dyn CapabilityProvider>
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::core::args::ArgumentValue;
    use crate::core::hook::ArgumentKind;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn config() -> HookdConfig {
        let mut pkg = BackendManifest::default();
        pkg.hooks
            .insert("build_sdist".to_string(), sh("echo pkg-1.0.tar.gz"));
        let mut legacy = BackendManifest::default();
        legacy
            .hooks
            .insert("build_wheel".to_string(), sh("echo legacy.whl"));
        pkg.attributes.insert("__legacy__".to_string(), legacy);

        let mut config = HookdConfig::default();
        config.backends.insert("pkg".to_string(), pkg);
        config
    }

    fn spec(raw: &str) -> BackendSpec {
        BackendSpec::parse(raw).expect("spec")
    }

    fn hook(script: &str) -> CommandHook {
        CommandHook::new(
            HookKind::BuildWheel,
            sh(script),
            Duration::from_secs(10),
            10_000,
        )
    }

    fn wheel_args() -> HookArgs {
        let mut args = HookArgs::new();
        args.push(
            ArgumentKind::WheelDirectory,
            ArgumentValue::Path(PathBuf::from("dist")),
        );
        args.push(ArgumentKind::ConfigSettings, ArgumentValue::Settings(None));
        args.push(
            ArgumentKind::MetadataDirectory,
            ArgumentValue::OptionalPath(None),
        );
        args
    }

    #[test]
    fn resolves_modules_and_attributes() {
        let loader = ManifestLoader::new(&config());
        let module = loader.load(&spec("pkg")).expect("module");
        assert_eq!(module.exposed_hooks(), vec![HookKind::BuildSdist]);

        for raw in ["pkg:__legacy__", "pkg.__legacy__"] {
            let attribute = loader.load(&spec(raw)).expect("attribute");
            assert_eq!(attribute.exposed_hooks(), vec![HookKind::BuildWheel]);
        }
    }

    #[test]
    fn reports_missing_modules_and_attributes() {
        let loader = ManifestLoader::new(&config());
        assert_eq!(
            loader.load(&spec("other")).err(),
            Some(HookdError::MissingBackendModule {
                name: "other".to_string()
            })
        );
        assert_eq!(
            loader.load(&spec("pkg:nope")).err(),
            Some(HookdError::MissingBackendAttribute {
                module: "pkg".to_string(),
                attribute: "nope".to_string(),
            })
        );
    }

    #[test]
    fn payload_carries_hook_and_arguments() {
        let payload: Value = serde_json::from_str(&hook("true").payload(&wheel_args())).expect("json");
        assert_eq!(
            payload,
            serde_json::json!({
                "hook": "build_wheel",
                "wheel_directory": "dist",
                "config_settings": null,
                "metadata_directory": null,
            })
        );
    }

    #[cfg(unix)]
    #[test]
    fn returns_last_non_empty_stdout_line() {
        let result = hook("echo building; echo pkg-1.0.whl; echo")
            .call(&wheel_args())
            .expect("call");
        assert_eq!(result, "pkg-1.0.whl");
    }

    #[cfg(unix)]
    #[test]
    fn command_reads_payload_from_stdin() {
        let result = hook("read line; case \"$line\" in *dist*) echo seen;; *) echo missing;; esac")
            .call(&wheel_args())
            .expect("call");
        assert_eq!(result, "seen");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_ordinary_failure() {
        let err = hook("echo 'Oh no' >&2; exit 3")
            .call(&wheel_args())
            .expect_err("failure");
        assert!(err.downcast_ref::<FatalError>().is_none());
        assert!(format!("{err:#}").contains("Oh no"));
    }

    #[cfg(unix)]
    #[test]
    fn terminated_command_is_fatal() {
        let err = hook("kill -TERM $$").call(&wheel_args()).expect_err("signal");
        assert!(matches!(
            err.downcast_ref::<FatalError>(),
            Some(FatalError::Terminated { .. })
        ));
    }
}

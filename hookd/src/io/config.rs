//! Daemon configuration stored in `hookd.toml`.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::hook::HookKind;

/// Config file read from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "hookd.toml";

/// Environment variable that turns on debug mode when present.
pub const DEBUG_ENV: &str = "DAEMON_DEBUG";

/// Daemon configuration (TOML).
///
/// Missing fields default to values suitable for interactive builds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HookdConfig {
    /// Wall-clock limit for a single command-backed hook.
    pub hook_timeout_secs: u64,

    /// Bytes of stdout/stderr kept per hook command.
    pub output_limit_bytes: usize,

    /// Command-backed backends keyed by module name.
    pub backends: BTreeMap<String, BackendManifest>,
}

/// A command-backed backend: hook name to argv, plus named attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendManifest {
    pub hooks: BTreeMap<String, Vec<String>>,
    pub attributes: BTreeMap<String, BackendManifest>,
}

impl Default for HookdConfig {
    fn default() -> Self {
        Self {
            hook_timeout_secs: 60 * 60,
            output_limit_bytes: 1_000_000,
            backends: BTreeMap::new(),
        }
    }
}

impl HookdConfig {
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hook_timeout_secs == 0 {
            return Err(anyhow!("hook_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        for (module, manifest) in &self.backends {
            if module.is_empty() || module.contains(':') {
                return Err(anyhow!("backend module name '{module}' is invalid"));
            }
            manifest
                .validate()
                .with_context(|| format!("backend '{module}'"))?;
        }
        Ok(())
    }
}

impl BackendManifest {
    pub fn validate(&self) -> Result<()> {
        for (hook, command) in &self.hooks {
            // Keep config failures out of the recoverable tier.
            hook.parse::<HookKind>().map_err(|err| anyhow!("{err}"))?;
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(anyhow!("hook '{hook}' command must be a non-empty array"));
            }
        }
        for (attribute, manifest) in &self.attributes {
            if attribute.is_empty() {
                return Err(anyhow!("attribute names must be non-empty"));
            }
            manifest
                .validate()
                .with_context(|| format!("attribute '{attribute}'"))?;
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HookdConfig::default()`.
pub fn load_config(path: &Path) -> Result<HookdConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = HookdConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HookdConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    debug!(path = %path.display(), backends = cfg.backends.len(), "config loaded");
    Ok(cfg)
}

/// Debug mode is on when [`DEBUG_ENV`] is set to any value.
pub fn debug_from_env() -> bool {
    env::var_os(DEBUG_ENV).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Classified, UNCLASSIFIED_KIND, classify};

    const SAMPLE: &str = r#"
hook_timeout_secs = 30

[backends."flit_core.buildapi".hooks]
build_wheel = ["flit-hook", "wheel"]
get_requires_for_build_wheel = ["flit-hook", "requires"]

[backends."setuptools.build_meta".attributes.__legacy__.hooks]
build_sdist = ["setup-hook", "sdist"]
"#;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, HookdConfig::default());
    }

    #[test]
    fn load_parses_backends_and_attributes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, SAMPLE).expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.hook_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.output_limit_bytes, 1_000_000);

        let flit = &cfg.backends["flit_core.buildapi"];
        assert_eq!(flit.hooks["build_wheel"], vec!["flit-hook", "wheel"]);
        let legacy = &cfg.backends["setuptools.build_meta"].attributes["__legacy__"];
        assert_eq!(legacy.hooks["build_sdist"], vec!["setup-hook", "sdist"]);
    }

    #[test]
    fn rejects_unknown_hook_names() {
        let cfg: HookdConfig = toml::from_str(
            r#"
[backends.pkg.hooks]
build_egg = ["x"]
"#,
        )
        .expect("parse");
        let err = cfg.validate().expect_err("invalid");
        assert!(format!("{err:#}").contains("build_egg"));
        assert_eq!(
            classify(&err),
            Classified::Fatal {
                kind: UNCLASSIFIED_KIND
            }
        );
    }

    #[test]
    fn rejects_empty_commands_and_zero_limits() {
        let cfg: HookdConfig = toml::from_str(
            r#"
[backends.pkg.hooks]
build_wheel = []
"#,
        )
        .expect("parse");
        assert!(cfg.validate().is_err());

        let cfg = HookdConfig {
            hook_timeout_secs: 0,
            ..HookdConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_module_names_with_colons() {
        let mut cfg = HookdConfig::default();
        cfg.backends
            .insert("pkg:attr".to_string(), BackendManifest::default());
        assert!(cfg.validate().is_err());
    }
}

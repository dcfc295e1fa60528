//! Decoded hook arguments.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::core::hook::ArgumentKind;
use crate::core::settings::{ConfigSettings, parse_config_settings};
use crate::error::HookdError;

/// One decoded argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    Path(PathBuf),
    OptionalPath(Option<PathBuf>),
    Settings(Option<ConfigSettings>),
}

impl ArgumentValue {
    /// JSON form handed to out-of-process hooks; absent values are `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Path(path) | Self::OptionalPath(Some(path)) => {
                Value::String(path.to_string_lossy().into_owned())
            }
            Self::OptionalPath(None) | Self::Settings(None) => Value::Null,
            Self::Settings(Some(settings)) => json!(settings),
        }
    }
}

impl fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) | Self::OptionalPath(Some(path)) => write!(f, "{}", path.display()),
            Self::OptionalPath(None) | Self::Settings(None) => f.write_str("None"),
            Self::Settings(Some(_)) => write!(f, "{}", self.to_json()),
        }
    }
}

/// Decode one argument line according to its kind.
pub fn decode_argument(kind: ArgumentKind, raw: &str) -> Result<ArgumentValue, HookdError> {
    match kind {
        ArgumentKind::WheelDirectory | ArgumentKind::SdistDirectory => {
            if raw.is_empty() {
                return Err(HookdError::MalformedHookArgument {
                    raw: raw.to_string(),
                    argument: kind,
                });
            }
            Ok(ArgumentValue::Path(PathBuf::from(raw)))
        }
        ArgumentKind::MetadataDirectory => Ok(ArgumentValue::OptionalPath(
            (!raw.is_empty()).then(|| PathBuf::from(raw)),
        )),
        ArgumentKind::ConfigSettings => parse_config_settings(raw).map(ArgumentValue::Settings),
    }
}

/// Arguments for one hook call, kept in schema order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookArgs {
    values: Vec<(ArgumentKind, ArgumentValue)>,
}

impl HookArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ArgumentKind, value: ArgumentValue) {
        self.values.push((kind, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArgumentKind, &ArgumentValue)> {
        self.values.iter().map(|(kind, value)| (*kind, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, kind: ArgumentKind) -> Option<&ArgumentValue> {
        self.values
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, value)| value)
    }

    pub fn wheel_directory(&self) -> Option<&Path> {
        self.path(ArgumentKind::WheelDirectory)
    }

    pub fn sdist_directory(&self) -> Option<&Path> {
        self.path(ArgumentKind::SdistDirectory)
    }

    pub fn metadata_directory(&self) -> Option<&Path> {
        self.path(ArgumentKind::MetadataDirectory)
    }

    pub fn config_settings(&self) -> Option<&ConfigSettings> {
        match self.get(ArgumentKind::ConfigSettings) {
            Some(ArgumentValue::Settings(settings)) => settings.as_ref(),
            _ => None,
        }
    }

    fn path(&self, kind: ArgumentKind) -> Option<&Path> {
        match self.get(kind)? {
            ArgumentValue::Path(path) => Some(path),
            ArgumentValue::OptionalPath(path) => path.as_deref(),
            ArgumentValue::Settings(_) => None,
        }
    }
}

//! `config_settings` values: nested mappings whose keys and leaves are strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::hook::ArgumentKind;
use crate::error::HookdError;

/// Decoded `config_settings` mapping.
pub type ConfigSettings = BTreeMap<String, SettingValue>;

/// A leaf string or a nested mapping of the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Text(String),
    Table(ConfigSettings),
}

/// Decode a `config-settings` line.
///
/// An empty line is absent. Anything else must be a JSON object whose values
/// are strings or objects of the same shape.
pub fn parse_config_settings(raw: &str) -> Result<Option<ConfigSettings>, HookdError> {
    if raw.is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<ConfigSettings>(raw)
        .map(Some)
        .map_err(|_| HookdError::MalformedHookArgument {
            raw: raw.to_string(),
            argument: ArgumentKind::ConfigSettings,
        })
}

//! Hook, argument, and action vocabularies.
//!
//! The hook schema is the static registry that drives request decoding: each
//! [`HookKind`] lists its [`ArgumentKind`]s in wire order.

use std::fmt;
use std::str::FromStr;

use crate::error::HookdError;

/// Build hooks a backend may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    BuildWheel,
    BuildSdist,
    PrepareMetadataForBuildWheel,
    GetRequiresForBuildWheel,
    GetRequiresForBuildSdist,
}

impl HookKind {
    pub const ALL: [HookKind; 5] = [
        HookKind::BuildWheel,
        HookKind::BuildSdist,
        HookKind::PrepareMetadataForBuildWheel,
        HookKind::GetRequiresForBuildWheel,
        HookKind::GetRequiresForBuildSdist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BuildWheel => "build_wheel",
            Self::BuildSdist => "build_sdist",
            Self::PrepareMetadataForBuildWheel => "prepare_metadata_for_build_wheel",
            Self::GetRequiresForBuildWheel => "get_requires_for_build_wheel",
            Self::GetRequiresForBuildSdist => "get_requires_for_build_sdist",
        }
    }

    /// Arguments the hook takes, in the order they are requested on the wire.
    pub fn arguments(self) -> &'static [ArgumentKind] {
        use ArgumentKind::{ConfigSettings, MetadataDirectory, SdistDirectory, WheelDirectory};

        match self {
            Self::BuildSdist => &[SdistDirectory, ConfigSettings],
            Self::BuildWheel => &[WheelDirectory, ConfigSettings, MetadataDirectory],
            Self::PrepareMetadataForBuildWheel => &[MetadataDirectory, ConfigSettings],
            Self::GetRequiresForBuildSdist => &[ConfigSettings],
            Self::GetRequiresForBuildWheel => &[ConfigSettings],
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookKind {
    type Err = HookdError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|hook| hook.as_str() == name)
            .ok_or_else(|| HookdError::InvalidHookName {
                name: name.to_string(),
            })
    }
}

/// Typed hook arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgumentKind {
    WheelDirectory,
    SdistDirectory,
    MetadataDirectory,
    ConfigSettings,
}

impl ArgumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WheelDirectory => "wheel_directory",
            Self::SdistDirectory => "sdist_directory",
            Self::MetadataDirectory => "metadata_directory",
            Self::ConfigSettings => "config_settings",
        }
    }

    /// Field name sent in `EXPECT` lines.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::WheelDirectory => "wheel-directory",
            Self::SdistDirectory => "sdist-directory",
            Self::MetadataDirectory => "metadata-directory",
            Self::ConfigSettings => "config-settings",
        }
    }
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the parent asks for at the top of each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Run,
    Shutdown,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Run, Action::Shutdown];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = HookdError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == name)
            .ok_or_else(|| HookdError::InvalidAction {
                name: name.to_string(),
            })
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builder configuration, stored as RON.

use crate::keyframe::{InterpolationMode, UpdateMode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] ron::Error),

    /// File was written by a newer version
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },
}

/// Settings applied by the track builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Format version
    pub version: u32,
    /// Reuse an existing track with the same address and kind
    pub reuse_existing_tracks: bool,
    /// Length used when a script creates a timeline without one
    pub default_length: f32,
    /// Interpolation applied to newly created tracks that support it
    pub new_track_interpolation: Option<InterpolationMode>,
    /// Update mode applied to newly created value tracks
    pub new_track_update_mode: Option<UpdateMode>,
    /// Loop-wrap flag applied to newly created tracks
    pub new_track_loop_wrap: Option<bool>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            reuse_existing_tracks: true,
            default_length: 1.0,
            new_track_interpolation: None,
            new_track_update_mode: None,
            new_track_loop_wrap: None,
        }
    }
}

impl BuilderConfig {
    /// Parse from RON, rejecting newer format versions
    pub fn from_ron(s: &str) -> Result<Self, ConfigError> {
        let config: BuilderConfig = ron::from_str(s)?;
        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }
        Ok(config)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

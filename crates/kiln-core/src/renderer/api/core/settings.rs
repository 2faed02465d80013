// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Global settings for the texture and render-task core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How texture readback picks its transfer path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadbackMode {
    /// Read directly whenever the backend supports the buffer format.
    #[default]
    Auto,
    /// Always read through a 4-channel intermediate buffer.
    ForceIntermediate,
}

/// Logger configuration consumed by `kiln_telemetry::logging::init_logging`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set, e.g. `"info"` or `"kiln_data=debug"`.
    pub default_level: String,
    /// `"auto"`, `"always"` or `"never"`.
    pub write_style: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_owned(),
            write_style: "auto".to_owned(),
        }
    }
}

/// A collection of settings affecting texture management and render task assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Apply `"<kind>: <name>"` debug labels to native textures.
    pub debug_labels: bool,
    /// A pool growing past this many entries logs a warning. Pools never shrink on their own.
    pub pool_soft_cap: Option<usize>,
    /// Maximum instances sharing one parameter block chunk in a prepared render task.
    pub instance_block_max_entries: u32,
    /// Readback path override.
    pub direct_readback: ReadbackMode,
    /// Logger configuration.
    pub logging: LoggingConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            debug_labels: true,
            pool_soft_cap: None,
            instance_block_max_entries: 512,
            direct_readback: ReadbackMode::Auto,
            logging: LoggingConfig::default(),
        }
    }
}

/// Failure to load [`RenderSettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// The settings file could not be read.
    Io(String),
    /// The RON document is malformed.
    Parse(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(msg) => write!(f, "Failed to read render settings: {msg}"),
            SettingsError::Parse(msg) => write!(f, "Invalid render settings: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl RenderSettings {
    /// Parses settings from a RON document. Missing fields take their default value.
    pub fn from_ron_str(source: &str) -> Result<Self, SettingsError> {
        ron::from_str(source).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// Reads and parses a RON settings file.
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(format!("{}: {e}", path.display())))?;
        Self::from_ron_str(&source)
    }

    /// Serializes the settings as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, SettingsError> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty).map_err(|e| SettingsError::Parse(e.to_string()))
    }
}

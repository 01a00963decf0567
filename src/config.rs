//! Editor tunables, read from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_UNDO_HISTORY, PASTE_OFFSET};
use crate::error::PersistenceError;
use crate::types::ChannelAttributes;

/// Environment variable the binary consults for a config file path.
pub const CONFIG_ENV_VAR: &str = "TOPOLOGY_EDITOR_CONFIG";

/// Settings that shape editing behaviour.
///
/// Every field is optional in the file; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of commands kept on the undo history
    pub max_undo_history: usize,
    /// Offset applied to pasted clones
    pub paste_offset: (f32, f32),
    /// Attributes given to channels created without explicit ones
    pub default_channel: ChannelAttributes,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo_history: MAX_UNDO_HISTORY,
            paste_offset: PASTE_OFFSET,
            default_channel: ChannelAttributes::default(),
        }
    }
}

impl EditorConfig {
    /// Parses a config from JSON text.
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let config = Self::from_json(&std::fs::read_to_string(path)?)?;
        log::info!("loaded editor config from {}", path.display());
        Ok(config)
    }

    /// Reads the config named by [`CONFIG_ENV_VAR`], or the defaults if it is unset.
    pub fn from_env() -> Result<Self, PersistenceError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use shared::utils::BoxResult;

const CONFIG_FILENAME: &str = "config.json";

/// State a launcher keeps between runs.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub game_dir: Option<String>,
    /// mod id -> installed version
    #[serde(default)]
    pub installed_mods: HashMap<String, String>,
}

impl RuntimeConfig {
    pub fn is_installed(&self, mod_id: &str, version: &str) -> bool {
        self.installed_mods
            .get(mod_id)
            .is_some_and(|installed| installed == version)
    }

    pub fn set_installed(&mut self, mod_id: &str, version: &str) {
        self.installed_mods
            .insert(mod_id.to_string(), version.to_string());
    }

    pub fn game_dir(&self) -> Option<PathBuf> {
        self.game_dir.as_ref().map(PathBuf::from)
    }

    /// Remembers `game_dir`. Moving to another directory forgets the
    /// installed versions, since those files live in the old one. Returns
    /// whether anything changed.
    pub fn set_game_dir(&mut self, game_dir: &Path) -> bool {
        if self.game_dir().as_deref() == Some(game_dir) {
            return false;
        }
        self.game_dir = Some(game_dir.to_string_lossy().to_string());
        self.installed_mods.clear();
        true
    }
}

pub fn get_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILENAME)
}

/// Missing or unreadable state starts over from the defaults.
pub fn load_config(path: &Path) -> RuntimeConfig {
    if !path.exists() {
        return RuntimeConfig::default();
    }
    match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
    {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring invalid launcher state {}: {}", path.display(), e);
            RuntimeConfig::default()
        }
    }
}

pub fn save_config(config: &RuntimeConfig, path: &Path) -> BoxResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let config_str = serde_json::to_string_pretty(config)?;
    std::fs::write(path, config_str)?;
    Ok(())
}

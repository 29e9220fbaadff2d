use std::path::{Path, PathBuf};

use log::info;
use shared::{
    launcher_config::{LauncherConfig, ModConfig, TargetOs},
    paths::get_builder_config_dir,
    utils::BoxResult,
    validation::{validate_config, ValidationErrors},
};

pub const DEFAULT_CONFIG_NAME: &str = "My Game Mod Launcher";
pub const DEFAULT_CONFIG_DESCRIPTION: &str = "Install awesome mods for your game!";
pub const DEFAULT_GAME_EXE: &str = "game.exe";

pub const DEFAULT_MOD_NAME: &str = "Base Mod";
pub const DEFAULT_MOD_TARGET_PATH: &str = "mods/";
pub const DEFAULT_MOD_DESCRIPTION: &str = "The core mod files";

const CONFIG_FILENAME: &str = "config.json";

pub fn get_default_config_path() -> PathBuf {
    get_builder_config_dir().join(CONFIG_FILENAME)
}

pub fn default_config() -> LauncherConfig {
    let mut default_mod = ModConfig::new(DEFAULT_MOD_NAME, DEFAULT_MOD_TARGET_PATH, "");
    default_mod.description = DEFAULT_MOD_DESCRIPTION.to_string();
    default_mod.is_required = true;

    let mut config = LauncherConfig::new(DEFAULT_CONFIG_NAME, DEFAULT_GAME_EXE);
    config.description = DEFAULT_CONFIG_DESCRIPTION.to_string();
    config.target_os = TargetOs::Windows;
    config.mods.push(default_mod);
    config.validation_files.push(DEFAULT_GAME_EXE.to_string());
    config
}

/// Holds the configuration being edited and the file it belongs to.
pub struct ConfigManager {
    pub config: LauncherConfig,
    pub config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_path(get_default_config_path())
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        ConfigManager {
            config: default_config(),
            config_path,
        }
    }

    /// Loads `path`, or the current config path when `None`. A path given
    /// explicitly becomes the new config path.
    pub async fn load(&mut self, path: Option<&Path>) -> BoxResult<()> {
        let path = path.unwrap_or(self.config_path.as_path()).to_path_buf();
        self.config = LauncherConfig::read(&path).await?;
        info!("Configuration loaded from {}", path.display());
        self.config_path = path;
        Ok(())
    }

    pub async fn save(&mut self, path: Option<&Path>) -> BoxResult<()> {
        let path = path.unwrap_or(self.config_path.as_path()).to_path_buf();
        self.config.stamp();
        self.config.write(&path).await?;
        info!("Configuration saved to {}", path.display());
        self.config_path = path;
        Ok(())
    }

    /// Writes a copy of the configuration without changing the config path.
    pub async fn export_config(&self, export_path: &Path) -> BoxResult<()> {
        let mut config = self.config.clone();
        config.stamp();
        config.write(export_path).await?;
        info!("Configuration exported to {}", export_path.display());
        Ok(())
    }

    /// Replaces the configuration with `import_path` and saves it to the
    /// current config path.
    pub async fn import_config(&mut self, import_path: &Path) -> BoxResult<()> {
        self.config = LauncherConfig::read(import_path).await?;
        info!("Configuration imported from {}", import_path.display());
        self.save(None).await
    }

    pub fn validate(&self) -> ValidationErrors {
        validate_config(&self.config)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

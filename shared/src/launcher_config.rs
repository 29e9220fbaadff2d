use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::utils::BoxResult;

pub const APP_NAME: &str = "LaunchForge";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_VERSION: &str = "1.0.0";

pub fn now_iso() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn new_mod_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    #[default]
    Windows,
    Macos,
    Linux,
}

impl TargetOs {
    pub const ALL: [TargetOs; 3] = [TargetOs::Windows, TargetOs::Macos, TargetOs::Linux];

    pub fn current() -> TargetOs {
        if cfg!(target_os = "windows") {
            TargetOs::Windows
        } else if cfg!(target_os = "macos") {
            TargetOs::Macos
        } else {
            TargetOs::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOs::Windows => "windows",
            TargetOs::Macos => "macos",
            TargetOs::Linux => "linux",
        }
    }

    pub fn executable_extension(&self) -> &'static str {
        match self {
            TargetOs::Windows => ".exe",
            TargetOs::Macos => ".app",
            TargetOs::Linux => "",
        }
    }

    pub fn template_file_name(&self) -> &'static str {
        match self {
            TargetOs::Windows => "launcher-windows.exe",
            TargetOs::Macos => "launcher-macos",
            TargetOs::Linux => "launcher-linux",
        }
    }

    pub fn is_unix(&self) -> bool {
        !matches!(self, TargetOs::Windows)
    }

    /// Usual install roots of games on this platform. `~` is expanded by the
    /// launcher on the player's machine.
    pub fn common_game_locations(&self) -> &'static [&'static str] {
        match self {
            TargetOs::Windows => &[
                "C:/Program Files (x86)/Steam/steamapps/common",
                "C:/Program Files/Steam/steamapps/common",
                "C:/Games",
                "D:/Games",
                "C:/Program Files (x86)/Epic Games",
                "C:/Program Files/Epic Games",
            ],
            TargetOs::Macos => &[
                "~/Library/Application Support/Steam/steamapps/common",
                "~/Games",
            ],
            TargetOs::Linux => &["~/.steam/steam/steamapps/common", "~/Games"],
        }
    }
}

impl std::fmt::Display for TargetOs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("Unknown target OS {0}, expected windows, macos or linux")]
pub struct UnknownTargetOs(String);

impl std::str::FromStr for TargetOs {
    type Err = UnknownTargetOs;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetOs::ALL
            .into_iter()
            .find(|os| os.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTargetOs(s.to_string()))
    }
}

/// One installable content package: an archive fetched from `download_url`
/// and extracted under `target_path`, relative to the game directory.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModConfig {
    #[serde(default = "new_mod_id")]
    pub id: String,
    pub name: String,
    pub target_path: String,
    pub download_url: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub is_required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
}

impl ModConfig {
    pub fn new(name: &str, target_path: &str, download_url: &str) -> Self {
        ModConfig {
            id: new_mod_id(),
            name: name.to_string(),
            target_path: target_path.to_string(),
            download_url: download_url.to_string(),
            description: String::new(),
            version: default_version(),
            is_required: false,
            sha1: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LauncherConfig {
    pub name: String,
    pub game_exe: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub mods: Vec<ModConfig>,

    #[serde(default)]
    pub validation_files: Vec<String>,

    #[serde(default)]
    pub default_locations: Vec<String>,

    #[serde(default)]
    pub target_os: TargetOs,

    #[serde(default)]
    pub created_with: String,

    #[serde(default = "now_iso")]
    pub created: String,

    #[serde(default = "now_iso")]
    pub updated: String,
}

impl LauncherConfig {
    pub fn new(name: &str, game_exe: &str) -> Self {
        LauncherConfig {
            name: name.to_string(),
            game_exe: game_exe.to_string(),
            description: String::new(),
            version: default_version(),
            mods: vec![],
            validation_files: vec![],
            default_locations: vec![],
            target_os: TargetOs::default(),
            created_with: String::new(),
            created: now_iso(),
            updated: now_iso(),
        }
    }

    pub fn from_json(json: &str) -> BoxResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> BoxResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn read(path: &Path) -> BoxResult<Self> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub async fn write(&self, path: &Path) -> BoxResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(path, self.to_json()?).await?;
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated = now_iso();
    }

    pub fn stamp(&mut self) {
        self.created_with = format!("{} v{}", APP_NAME, APP_VERSION);
        self.touch();
    }

    // alphanumeric only, used for file and directory names
    pub fn safe_name(&self) -> String {
        self.name
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    }

    pub fn get_mod(&self, mod_id: &str) -> Option<&ModConfig> {
        self.mods.iter().find(|m| m.id == mod_id)
    }

    pub fn get_mod_mut(&mut self, mod_id: &str) -> Option<&mut ModConfig> {
        self.mods.iter_mut().find(|m| m.id == mod_id)
    }

    pub fn add_mod(&mut self, mod_config: ModConfig) {
        self.mods.push(mod_config);
        self.touch();
    }

    pub fn remove_mod(&mut self, mod_id: &str) -> bool {
        let initial_count = self.mods.len();
        self.mods.retain(|m| m.id != mod_id);
        let removed = self.mods.len() < initial_count;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn add_validation_file(&mut self, file_path: &str) -> bool {
        if self.validation_files.iter().any(|f| f == file_path) {
            return false;
        }
        self.validation_files.push(file_path.to_string());
        self.touch();
        true
    }

    pub fn remove_validation_file(&mut self, file_path: &str) -> bool {
        let removed = remove_entry(&mut self.validation_files, file_path);
        if removed {
            self.touch();
        }
        removed
    }

    pub fn add_default_location(&mut self, location: &str) -> bool {
        if self.default_locations.iter().any(|l| l == location) {
            return false;
        }
        self.default_locations.push(location.to_string());
        self.touch();
        true
    }

    /// Adds the common locations of the target OS that are not listed yet
    /// and returns how many were added.
    pub fn add_common_locations(&mut self) -> usize {
        self.target_os
            .common_game_locations()
            .iter()
            .filter(|location| self.add_default_location(location))
            .count()
    }

    pub fn remove_default_location(&mut self, location: &str) -> bool {
        let removed = remove_entry(&mut self.default_locations, location);
        if removed {
            self.touch();
        }
        removed
    }
}

fn remove_entry(entries: &mut Vec<String>, value: &str) -> bool {
    match entries.iter().position(|e| e == value) {
        Some(index) => {
            entries.remove(index);
            true
        }
        None => false,
    }
}

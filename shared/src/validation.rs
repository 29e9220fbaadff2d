use std::collections::HashSet;
use std::path::{Component, Path};

use lazy_static::lazy_static;
use regex::Regex;

use crate::launcher_config::{LauncherConfig, TargetOs};

lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(r"^\d+\.\d+\.\d+$").unwrap();
    static ref URL_RE: Regex = Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap();
    static ref MOD_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
    static ref WINDOWS_INVALID_CHARS_RE: Regex = Regex::new(r#"[<>:"/\\|?*]"#).unwrap();
}

/// Field/message pairs in the order they were found.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationErrors(Vec<(String, String)>);

impl ValidationErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push((field.into(), message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, m)| (f.as_str(), m.as_str()))
    }

    pub fn to_text(&self) -> String {
        if self.is_empty() {
            return "No validation errors.".to_string();
        }

        let mut text = "The following validation errors were found:\n\n".to_string();
        for (_, message) in &self.0 {
            text.push_str(&format!("• {}\n", message));
        }
        text
    }
}

#[derive(thiserror::Error, Debug)]
#[error("{}", .0.to_text())]
pub struct InvalidConfigError(pub ValidationErrors);

pub fn validate_config(config: &LauncherConfig) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if config.name.trim().is_empty() {
        errors.add("name", "Launcher name is required");
    }

    if config.game_exe.trim().is_empty() {
        errors.add("game_exe", "Game executable path is required");
    } else if !validate_target_path(&config.game_exe) {
        errors.add(
            "game_exe",
            "Game executable path must be relative to the game directory",
        );
    }

    if !config.version.is_empty() && !is_valid_version(&config.version) {
        errors.add("version", "Version must be in format X.Y.Z (e.g., 1.0.0)");
    }

    if config.mods.is_empty() {
        errors.add("mods", "At least one mod is required");
    }

    let mut seen_ids = HashSet::new();
    for (i, mod_config) in config.mods.iter().enumerate() {
        let prefix = format!("mod_{}", i);

        if !is_valid_mod_id(&mod_config.id) {
            errors.add(
                format!("{}_id", prefix),
                format!(
                    "Mod '{}' has an invalid id, use letters, digits, '-' and '_'",
                    mod_config.name
                ),
            );
        } else if !seen_ids.insert(mod_config.id.as_str()) {
            errors.add(
                format!("{}_id", prefix),
                format!("Mod '{}' has a duplicate id {}", mod_config.name, mod_config.id),
            );
        }

        if mod_config.name.trim().is_empty() {
            errors.add(format!("{}_name", prefix), format!("Mod {} requires a name", i + 1));
        }

        if mod_config.target_path.trim().is_empty() {
            errors.add(
                format!("{}_target_path", prefix),
                format!("Mod '{}' requires a target path", mod_config.name),
            );
        } else if !validate_target_path(&mod_config.target_path) {
            errors.add(
                format!("{}_target_path", prefix),
                format!(
                    "Mod '{}' has a target path outside the game directory",
                    mod_config.name
                ),
            );
        }

        if mod_config.download_url.trim().is_empty() {
            errors.add(
                format!("{}_download_url", prefix),
                format!("Mod '{}' requires a download URL", mod_config.name),
            );
        } else if !is_valid_url(&mod_config.download_url) {
            errors.add(
                format!("{}_download_url", prefix),
                format!("Mod '{}' has an invalid download URL", mod_config.name),
            );
        }
    }

    if config.validation_files.is_empty() {
        errors.add("validation_files", "At least one validation file is required");
    }
    for file in &config.validation_files {
        if !validate_target_path(file) {
            errors.add(
                "validation_files",
                format!("Validation file '{}' must be relative to the game directory", file),
            );
        }
    }

    errors
}

pub fn is_valid_version(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

/// Mod ids name files in the download directory, so they stay a single
/// plain file name.
pub fn is_valid_mod_id(id: &str) -> bool {
    MOD_ID_RE.is_match(id)
}

/// Only what the downloader can fetch.
pub fn is_valid_url(url: &str) -> bool {
    URL_RE.is_match(url) && url::Url::parse(url).is_ok()
}

/// Checks a single path component against the target OS file naming rules.
pub fn validate_path_for_os(path: &str, target_os: TargetOs) -> bool {
    match target_os {
        TargetOs::Windows => !WINDOWS_INVALID_CHARS_RE.is_match(path),
        TargetOs::Macos | TargetOs::Linux => !path.contains('\0'),
    }
}

/// A game-relative path must not be absolute, carry a drive prefix, or climb
/// out of the game directory.
pub fn validate_target_path(path: &str) -> bool {
    if path.contains('\0') {
        return false;
    }

    // both separators, regardless of the host the builder runs on
    let normalized = path.replace('\\', "/");
    if normalized.starts_with('/') {
        return false;
    }
    let first = normalized.split('/').next().unwrap_or_default();
    if first.len() >= 2 && first.as_bytes()[1] == b':' {
        return false;
    }

    Path::new(&normalized)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

pub fn validate_game_directory(directory: &Path, validation_files: &[String]) -> bool {
    directory.is_dir()
        && validation_files
            .iter()
            .all(|file| directory.join(file).exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher_config::ModConfig;

    fn valid_config() -> LauncherConfig {
        let mut config = LauncherConfig::new("Pack", "game.exe");
        config.add_mod(ModConfig::new("Base", "mods/", "https://example.com/base.zip"));
        config.add_validation_file("game.exe");
        config
    }

    #[test]
    fn test_valid_config() {
        let errors = validate_config(&valid_config());
        assert!(errors.is_empty(), "{}", errors.to_text());
        assert_eq!(errors.to_text(), "No validation errors.");
    }

    #[test]
    fn test_missing_fields() {
        let mut config = LauncherConfig::new("  ", "");
        config.version = "1.0".to_string();

        let errors = validate_config(&config);
        assert_eq!(errors.get("name"), Some("Launcher name is required"));
        assert_eq!(errors.get("game_exe"), Some("Game executable path is required"));
        assert!(errors.get("version").is_some());
        assert_eq!(errors.get("mods"), Some("At least one mod is required"));
        assert!(errors.get("validation_files").is_some());
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_empty_version_is_allowed() {
        let mut config = valid_config();
        config.version = String::new();
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_mod_errors() {
        let mut config = valid_config();
        config.add_mod(ModConfig::new("", "", ""));
        config.add_mod(ModConfig::new("Bad url", "mods/", "not a url"));
        config.add_mod(ModConfig::new("Escape", "../outside", "https://example.com/a.zip"));

        let errors = validate_config(&config);
        assert_eq!(errors.get("mod_1_name"), Some("Mod 2 requires a name"));
        assert_eq!(errors.get("mod_1_target_path"), Some("Mod '' requires a target path"));
        assert_eq!(errors.get("mod_1_download_url"), Some("Mod '' requires a download URL"));
        assert_eq!(
            errors.get("mod_2_download_url"),
            Some("Mod 'Bad url' has an invalid download URL")
        );
        assert!(errors.get("mod_3_target_path").is_some());
        assert!(errors.get("mod_0_name").is_none());
    }

    #[test]
    fn test_duplicate_mod_ids() {
        let mut config = valid_config();
        let duplicate = config.mods[0].clone();
        config.add_mod(duplicate);
        let errors = validate_config(&config);
        assert!(errors.get("mod_1_id").is_some());
        assert!(errors.get("mod_0_id").is_none());
    }

    #[test]
    fn test_mod_ids_are_plain_names() {
        assert!(is_valid_mod_id("a3c1e5b2-7f4d-4e1a-9b0c-2d8f6e4a1b3c"));
        assert!(is_valid_mod_id("base_pack"));
        assert!(!is_valid_mod_id(""));
        assert!(!is_valid_mod_id("../../escaped"));
        assert!(!is_valid_mod_id("mods/base"));
        assert!(!is_valid_mod_id("..\\base"));
        assert!(!is_valid_mod_id("."));

        let mut config = valid_config();
        config.mods[0].id = "../../escaped".to_string();
        config.mods[0].download_url = "https://example.com".to_string();
        let errors = validate_config(&config);
        assert_eq!(
            errors.get("mod_0_id"),
            Some("Mod 'Base' has an invalid id, use letters, digits, '-' and '_'")
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_game_exe_must_stay_in_game_dir() {
        for game_exe in ["C:/Games/x.exe", "/usr/bin/game", "../game.exe", "bin\\..\\..\\game"] {
            let mut config = valid_config();
            config.game_exe = game_exe.to_string();
            assert_eq!(
                validate_config(&config).get("game_exe"),
                Some("Game executable path must be relative to the game directory"),
                "{}",
                game_exe
            );
        }

        let mut config = valid_config();
        config.game_exe = "bin/x64/game.exe".to_string();
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_error_text() {
        let mut errors = ValidationErrors::default();
        errors.add("name", "Launcher name is required");
        errors.add("mods", "At least one mod is required");
        assert_eq!(
            errors.to_text(),
            "The following validation errors were found:\n\n\
             • Launcher name is required\n\
             • At least one mod is required\n"
        );
    }

    #[test]
    fn test_urls() {
        assert!(is_valid_url("https://example.com/mod.zip"));
        assert!(is_valid_url("http://10.0.0.1:8080/files/mod.zip?dl=1"));
        assert!(is_valid_url("https://drive.google.com/uc?id=abc&export=download"));
        assert!(is_valid_url("https://www.dropbox.com/s/abc/mod.zip?dl=1"));
        assert!(!is_valid_url("ftp://mirror.example.org/mod.zip"));
        assert!(!is_valid_url("file:///etc/passwd"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url("example.com/mod.zip"));
        assert!(!is_valid_url("https://exa mple.com/mod.zip"));
    }

    #[test]
    fn test_versions() {
        assert!(is_valid_version("1.0.0"));
        assert!(is_valid_version("10.20.30"));
        assert!(!is_valid_version("1.0"));
        assert!(!is_valid_version("v1.0.0"));
        assert!(!is_valid_version("1.0.0-beta"));
    }

    #[test]
    fn test_target_paths() {
        assert!(validate_target_path("mods/"));
        assert!(validate_target_path("./"));
        assert!(validate_target_path("Data\\Scripts"));
        assert!(!validate_target_path("mods/../plugins"));
        assert!(!validate_target_path("../mods"));
        assert!(!validate_target_path("mods/../../etc"));
        assert!(!validate_target_path("/etc"));
        assert!(!validate_target_path("\\Windows"));
        assert!(!validate_target_path("C:/Games"));
        assert!(!validate_target_path("C:mods"));
    }

    #[test]
    fn test_path_for_os() {
        assert!(validate_path_for_os("mod file.zip", TargetOs::Windows));
        assert!(!validate_path_for_os("mod:file.zip", TargetOs::Windows));
        assert!(!validate_path_for_os("mods/file.zip", TargetOs::Windows));
        assert!(validate_path_for_os("mod:file.zip", TargetOs::Linux));
        assert!(!validate_path_for_os("mod\0file", TargetOs::Macos));
    }

    #[test]
    fn test_game_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("game.exe"), b"").unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();

        assert!(validate_game_directory(
            dir.path(),
            &["game.exe".to_string(), "data".to_string()]
        ));
        assert!(!validate_game_directory(
            dir.path(),
            &["game.exe".to_string(), "missing.pak".to_string()]
        ));
        assert!(!validate_game_directory(&dir.path().join("nope"), &[]));
    }
}

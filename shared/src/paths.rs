use std::path::{Path, PathBuf};

use crate::launcher_config::APP_NAME;

pub const SIDECAR_CONFIG_FILENAME: &str = "launcher_config.json";
pub const TEMPLATES_DIRNAME: &str = "templates";

fn ensure_dir(dir: PathBuf) -> PathBuf {
    if !dir.exists() {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            log::warn!("Failed to create directory {}: {}", dir.display(), e);
        }
    }
    dir
}

fn base_dir(base: Option<PathBuf>) -> PathBuf {
    base.or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
}

/// Where the builder keeps its own configuration.
pub fn get_builder_config_dir() -> PathBuf {
    let dir_name = APP_NAME.to_lowercase().replace(' ', "-");
    ensure_dir(base_dir(dirs::config_dir()).join(dir_name))
}

/// Per-launcher state directory of a generated launcher.
pub fn get_launcher_data_dir(launcher_safe_name: &str) -> PathBuf {
    ensure_dir(base_dir(dirs::data_dir()).join(launcher_safe_name))
}

pub fn get_logs_dir(base_dir: &Path) -> PathBuf {
    ensure_dir(base_dir.join("logs"))
}

pub fn get_temp_dir(name: &str) -> PathBuf {
    ensure_dir(std::env::temp_dir().join(name))
}

pub fn get_sidecar_path(executable: &Path) -> Option<PathBuf> {
    executable
        .parent()
        .map(|dir| dir.join(SIDECAR_CONFIG_FILENAME))
}

// <bundle>.app/Contents/MacOS/<exe> -> <bundle>.app/Contents/Resources/launcher_config.json
pub fn get_bundle_resources_config_path(executable: &Path) -> Option<PathBuf> {
    let macos_dir = executable.parent()?;
    if macos_dir.file_name()? != "MacOS" {
        return None;
    }
    let contents_dir = macos_dir.parent()?;
    if contents_dir.file_name()? != "Contents" {
        return None;
    }
    Some(
        contents_dir
            .join("Resources")
            .join(SIDECAR_CONFIG_FILENAME),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_resources_config_path() {
        let exe = Path::new("/Applications/Pack.app/Contents/MacOS/Pack");
        assert_eq!(
            get_bundle_resources_config_path(exe),
            Some(PathBuf::from(
                "/Applications/Pack.app/Contents/Resources/launcher_config.json"
            ))
        );
        assert_eq!(get_bundle_resources_config_path(Path::new("/usr/bin/pack")), None);
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            get_sidecar_path(Path::new("/opt/pack/Pack")),
            Some(PathBuf::from("/opt/pack/launcher_config.json"))
        );
    }
}

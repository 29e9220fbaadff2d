use std::path::{Path, PathBuf};

use log::info;
use shared::{
    embed::read_embedded_config,
    launcher_config::LauncherConfig,
    paths::{get_bundle_resources_config_path, get_sidecar_path},
    utils::BoxResult,
};

#[derive(thiserror::Error, Debug)]
pub enum LauncherConfigError {
    #[error("This launcher has not been configured, build it with the launcher builder first")]
    Unconfigured,
    #[error("Invalid launcher configuration {path}: {source}")]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Sidecar(PathBuf),
    Bundle(PathBuf),
    Embedded,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Sidecar(path) => write!(f, "sidecar file {}", path.display()),
            ConfigSource::Bundle(path) => write!(f, "bundle resource {}", path.display()),
            ConfigSource::Embedded => f.write_str("embedded payload"),
        }
    }
}

async fn read_file(path: &Path) -> Result<LauncherConfig, LauncherConfigError> {
    LauncherConfig::read(path)
        .await
        .map_err(|source| LauncherConfigError::InvalidFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Finds the configuration of the launcher at `executable`. A
/// `launcher_config.json` next to it wins over the bundle resources, which
/// win over the payload embedded in the executable itself.
pub async fn load_launcher_config(executable: &Path) -> BoxResult<(LauncherConfig, ConfigSource)> {
    let candidates: [(Option<PathBuf>, fn(PathBuf) -> ConfigSource); 2] = [
        (get_sidecar_path(executable), ConfigSource::Sidecar),
        (
            get_bundle_resources_config_path(executable),
            ConfigSource::Bundle,
        ),
    ];
    for (path, to_source) in candidates {
        let Some(path) = path.filter(|path| path.is_file()) else {
            continue;
        };
        let config = read_file(&path).await?;
        let source = to_source(path);
        info!("Loaded configuration from {}", source);
        return Ok((config, source));
    }

    match read_embedded_config(executable).await? {
        Some(config) => {
            info!("Loaded configuration from {}", ConfigSource::Embedded);
            Ok((config, ConfigSource::Embedded))
        }
        None => Err(Box::new(LauncherConfigError::Unconfigured)),
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use reqwest::Client;
use shared::{
    files::{download_file, extract_archive, file_name_from_url, hash_file, is_zip_archive},
    launcher_config::{LauncherConfig, ModConfig},
    progress::ProgressBar,
    retry::RetryPolicy,
    utils::{BoxError, BoxResult},
    validation::validate_target_path,
};
use tokio::fs;

use crate::config::runtime_config::{save_config, RuntimeConfig};

#[derive(thiserror::Error, Debug)]
pub enum InstallError {
    #[error("Checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("Mod {name} has an invalid target path {path}")]
    InvalidTargetPath { name: String, path: String },
    #[error("Required mod {name} failed to install: {source}")]
    RequiredModFailed {
        name: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Reinstall mods whose recorded version matches the configured one.
    pub force: bool,
    pub skip_optional: bool,
    pub retry: RetryPolicy,
}

#[derive(Debug, Default, PartialEq)]
pub struct InstallSummary {
    pub installed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// A file name derived from a mod id that cannot leave its directory.
fn id_file_name(id: &str) -> String {
    let name: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        "mod".to_string()
    } else {
        name
    }
}

pub struct Installer<'a> {
    client: Client,
    game_dir: &'a Path,
    temp_dir: PathBuf,
    options: InstallOptions,
    progress_bar: Arc<dyn ProgressBar<String>>,
}

impl<'a> Installer<'a> {
    pub fn new(
        client: Client,
        game_dir: &'a Path,
        temp_dir: PathBuf,
        options: InstallOptions,
        progress_bar: Arc<dyn ProgressBar<String>>,
    ) -> Self {
        Self {
            client,
            game_dir,
            temp_dir,
            options,
            progress_bar,
        }
    }

    fn target_dir(&self, mod_config: &ModConfig) -> Result<PathBuf, InstallError> {
        if !validate_target_path(&mod_config.target_path) {
            return Err(InstallError::InvalidTargetPath {
                name: mod_config.name.clone(),
                path: mod_config.target_path.clone(),
            });
        }
        Ok(self.game_dir.join(&mod_config.target_path))
    }

    async fn verify_checksum(&self, mod_config: &ModConfig, path: &Path) -> BoxResult<()> {
        let expected = match &mod_config.sha1 {
            Some(expected) => expected.to_lowercase(),
            None => return Ok(()),
        };
        let actual = hash_file(path).await?;
        if actual != expected {
            return Err(Box::new(InstallError::ChecksumMismatch {
                name: mod_config.name.clone(),
                expected,
                actual,
            }));
        }
        Ok(())
    }

    async fn place_download(
        &self,
        mod_config: &ModConfig,
        download_path: &Path,
        target_dir: &Path,
    ) -> BoxResult<()> {
        if is_zip_archive(download_path)? {
            let archive = download_path.to_path_buf();
            let dest = target_dir.to_path_buf();
            let extracted =
                tokio::task::spawn_blocking(move || extract_archive(&archive, &dest)).await??;
            debug!(
                "Extracted {} files of {} into {}",
                extracted,
                mod_config.name,
                target_dir.display()
            );
        } else {
            let file_name = file_name_from_url(&mod_config.download_url)
                .unwrap_or_else(|| id_file_name(&mod_config.id));
            fs::create_dir_all(target_dir).await?;
            fs::copy(download_path, target_dir.join(&file_name)).await?;
            debug!("Copied {} into {}", file_name, target_dir.display());
        }
        Ok(())
    }

    async fn fetch_and_place(
        &self,
        mod_config: &ModConfig,
        download_path: &Path,
        target_dir: &Path,
    ) -> BoxResult<()> {
        download_file(
            &self.client,
            &mod_config.download_url,
            download_path,
            &self.options.retry,
            self.progress_bar.clone(),
        )
        .await?;
        self.verify_checksum(mod_config, download_path).await?;
        self.place_download(mod_config, download_path, target_dir)
            .await
    }

    /// Downloads one mod and puts its files under the game directory.
    pub async fn install_mod(&self, mod_config: &ModConfig) -> BoxResult<()> {
        let target_dir = self.target_dir(mod_config)?;
        let download_path = self
            .temp_dir
            .join(format!("{}.download", id_file_name(&mod_config.id)));

        self.progress_bar.set_message(mod_config.name.clone());
        info!("Downloading {} from {}", mod_config.name, mod_config.download_url);
        let result = self
            .fetch_and_place(mod_config, &download_path, &target_dir)
            .await;

        if download_path.exists() {
            if let Err(e) = fs::remove_file(&download_path).await {
                warn!("Failed to remove {}: {}", download_path.display(), e);
            }
        }
        result
    }

    /// Installs the mods of `config` in order. Versions already recorded in
    /// `runtime_config` are skipped unless forced, and the state is saved to
    /// `state_path` after every installed mod.
    pub async fn install_all(
        &self,
        config: &LauncherConfig,
        runtime_config: &mut RuntimeConfig,
        state_path: &Path,
    ) -> BoxResult<InstallSummary> {
        let mut summary = InstallSummary::default();

        for mod_config in &config.mods {
            if !mod_config.is_required && self.options.skip_optional {
                info!("Skipping optional mod {}", mod_config.name);
                summary.skipped.push(mod_config.id.clone());
                continue;
            }
            if !self.options.force && runtime_config.is_installed(&mod_config.id, &mod_config.version)
            {
                info!(
                    "{} {} is already installed",
                    mod_config.name, mod_config.version
                );
                summary.skipped.push(mod_config.id.clone());
                continue;
            }

            match self.install_mod(mod_config).await {
                Ok(()) => {
                    info!("Installed {} {}", mod_config.name, mod_config.version);
                    runtime_config.set_installed(&mod_config.id, &mod_config.version);
                    save_config(runtime_config, state_path)?;
                    summary.installed.push(mod_config.id.clone());
                }
                Err(e) if mod_config.is_required => {
                    return Err(Box::new(InstallError::RequiredModFailed {
                        name: mod_config.name.clone(),
                        source: e,
                    }));
                }
                Err(e) => {
                    warn!("Optional mod {} failed to install: {}", mod_config.name, e);
                    summary.failed.push(mod_config.id.clone());
                }
            }
        }

        Ok(summary)
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use shared::{
    launcher_config::LauncherConfig,
    paths::get_launcher_data_dir,
    progress::{ProgressBar, TerminalProgressBar},
    retry::RetryPolicy,
    utils::BoxResult,
};

use crate::config::runtime_config::{get_config_path, load_config, save_config};
use crate::game_dir::resolve_game_dir;
use crate::install::{InstallOptions, Installer};
use crate::launch::launch;

const DOWNLOADS_PREFIX: &str = "downloads-";

#[derive(Debug, Default, Clone)]
pub struct LauncherArgs {
    pub game_dir: Option<PathBuf>,
    pub force: bool,
    pub skip_optional: bool,
    pub no_launch: bool,
    pub game_args: Vec<String>,
}

/// Resolves the game directory, installs the mods and starts the game.
pub async fn run(config: &LauncherConfig, args: &LauncherArgs) -> BoxResult<()> {
    let data_dir = get_launcher_data_dir(&config.safe_name());
    let game_dir = sync_mods(
        config,
        args,
        &data_dir,
        Arc::new(TerminalProgressBar::new()),
    )
    .await?;

    if args.no_launch {
        info!("Not launching the game");
        return Ok(());
    }
    start_game(config, &game_dir, &args.game_args, &data_dir).await
}

/// Picks the game directory and brings its mods up to date. The launcher
/// state lives in `data_dir`, downloads go to a directory of their own
/// inside it that is removed afterwards.
pub async fn sync_mods(
    config: &LauncherConfig,
    args: &LauncherArgs,
    data_dir: &Path,
    progress_bar: Arc<dyn ProgressBar<String>>,
) -> BoxResult<PathBuf> {
    let state_path = get_config_path(data_dir);
    let mut runtime_config = load_config(&state_path);

    let game_dir = resolve_game_dir(
        args.game_dir.as_deref(),
        runtime_config.game_dir().as_deref(),
        config,
    )?;
    info!("Game directory: {}", game_dir.display());
    if runtime_config.set_game_dir(&game_dir) {
        save_config(&runtime_config, &state_path)?;
    }

    std::fs::create_dir_all(data_dir)?;
    let downloads_dir = tempfile::Builder::new()
        .prefix(DOWNLOADS_PREFIX)
        .tempdir_in(data_dir)?;

    let options = InstallOptions {
        force: args.force,
        skip_optional: args.skip_optional,
        retry: RetryPolicy::default(),
    };
    let installer = Installer::new(
        reqwest::Client::new(),
        &game_dir,
        downloads_dir.path().to_path_buf(),
        options,
        progress_bar,
    );
    let summary = installer
        .install_all(config, &mut runtime_config, &state_path)
        .await?;
    info!(
        "{} installed, {} skipped, {} failed",
        summary.installed.len(),
        summary.skipped.len(),
        summary.failed.len()
    );

    downloads_dir.close()?;
    Ok(game_dir)
}

async fn start_game(
    config: &LauncherConfig,
    game_dir: &Path,
    game_args: &[String],
    data_dir: &Path,
) -> BoxResult<()> {
    let mut child = launch(config, game_dir, game_args, data_dir).await?;
    let status = child.wait().await?;
    info!("{} exited with {}", config.name, status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{launcher_config::ModConfig, progress::SilentProgressBar};
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::write::SimpleFileOptions;

    fn zip_bytes() -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file("base/readme.txt", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"hello").unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn make_game(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("game.exe"), b"").unwrap();
    }

    fn args(game_dir: &Path) -> LauncherArgs {
        LauncherArgs {
            game_dir: Some(game_dir.to_path_buf()),
            no_launch: true,
            ..LauncherArgs::default()
        }
    }

    #[tokio::test]
    async fn test_switching_game_dir_installs_mods_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/base.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes()))
            .expect(2)
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("data");
        let first = root.path().join("a");
        let second = root.path().join("b");
        make_game(&first);
        make_game(&second);

        let mut config = LauncherConfig::new("Pack", "game.exe");
        config.add_validation_file("game.exe");
        config.add_mod(ModConfig::new(
            "Base",
            "mods",
            &format!("{}/base.zip", server.uri()),
        ));

        for game_dir in [&first, &second] {
            let resolved = sync_mods(&config, &args(game_dir), &data_dir, Arc::new(SilentProgressBar))
                .await
                .unwrap();
            assert_eq!(&resolved, game_dir);
        }

        assert!(first.join("mods/base/readme.txt").exists());
        assert!(second.join("mods/base/readme.txt").exists());
        let state = load_config(&get_config_path(&data_dir));
        assert_eq!(state.game_dir(), Some(second.clone()));
        assert!(state.is_installed(&config.mods[0].id, &config.mods[0].version));
    }

    #[tokio::test]
    async fn test_downloads_dir_is_removed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/base.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes()))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("data");
        let game_dir = root.path().join("game");
        make_game(&game_dir);

        let mut config = LauncherConfig::new("Pack", "game.exe");
        config.add_validation_file("game.exe");
        config.add_mod(ModConfig::new(
            "Base",
            "mods",
            &format!("{}/base.zip", server.uri()),
        ));

        sync_mods(&config, &args(&game_dir), &data_dir, Arc::new(SilentProgressBar))
            .await
            .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(&data_dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(DOWNLOADS_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }
}

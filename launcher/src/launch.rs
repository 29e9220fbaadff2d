use std::path::{Path, PathBuf};

use log::{debug, info};
use shared::{launcher_config::LauncherConfig, paths::get_logs_dir, utils::BoxResult};
use tokio::process::{Child, Command as TokioCommand};

const GAME_LOG_FILENAME: &str = "latest_game_launch.log";

#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    #[error("Game executable {0} not found")]
    MissingExecutable(PathBuf),
    #[error("Game executable path {0} is not inside the game directory")]
    InvalidPath(String),
}

fn is_app_bundle(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "app") && path.is_dir()
}

/// The command that starts `executable` with `args`. Application bundles
/// are opened through `open`, which forwards arguments with `--args`.
fn game_command(executable: &Path, args: &[String]) -> TokioCommand {
    if is_app_bundle(executable) {
        let mut cmd = TokioCommand::new("open");
        cmd.arg("-a").arg(executable);
        if !args.is_empty() {
            cmd.arg("--args").args(args);
        }
        cmd
    } else {
        let mut cmd = TokioCommand::new(executable);
        cmd.args(args);
        cmd
    }
}

pub fn get_game_executable(config: &LauncherConfig, game_dir: &Path) -> Result<PathBuf, LaunchError> {
    if !shared::validation::validate_target_path(&config.game_exe) {
        return Err(LaunchError::InvalidPath(config.game_exe.clone()));
    }
    let executable = game_dir.join(&config.game_exe);
    if !executable.exists() {
        return Err(LaunchError::MissingExecutable(executable));
    }
    Ok(executable)
}

/// Starts the game from `game_dir` with its output going to
/// `<logs_base>/logs/latest_game_launch.log`.
pub async fn launch(
    config: &LauncherConfig,
    game_dir: &Path,
    args: &[String],
    logs_base: &Path,
) -> BoxResult<Child> {
    let executable = get_game_executable(config, game_dir)?;

    let mut cmd = game_command(&executable, args);
    cmd.current_dir(game_dir);

    let log_path = get_logs_dir(logs_base).join(GAME_LOG_FILENAME);
    let file = std::fs::File::create(&log_path)?;
    cmd.stdout(file.try_clone()?);
    cmd.stderr(file);

    debug!(
        "Launching {} with arguments {:?}, output in {}",
        executable.display(),
        args,
        log_path.display()
    );
    let child = cmd.spawn()?;
    info!("Started {}", config.name);
    Ok(child)
}

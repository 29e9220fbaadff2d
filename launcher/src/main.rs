mod app;
mod config;
mod game_dir;
mod install;
mod launch;
mod utils;

use std::path::PathBuf;

use app::LauncherArgs;
use clap::{Arg, ArgAction, ArgMatches, Command};
use config::embedded_config::load_launcher_config;
use log::{error, info, warn, LevelFilter};
use shared::{
    launcher_config::{APP_NAME, APP_VERSION},
    logs::setup_logger,
    paths::{get_launcher_data_dir, get_logs_dir, get_temp_dir},
    utils::BoxResult,
    validation::validate_config,
};
use tokio::runtime::Runtime;
use utils::set_sigint_handler;

const LOGS_FILENAME: &str = "launcher.log";

fn cli() -> Command {
    Command::new("launcher")
        .version(APP_VERSION)
        .about("Installs the configured mods and starts the game")
        .arg(
            Arg::new("game_dir")
                .help("Game directory, skips detection")
                .long("game-dir")
                .short('g')
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("force")
                .help("Reinstall mods that are already installed")
                .long("force")
                .short('f')
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("skip_optional")
                .help("Do not install optional mods")
                .long("skip-optional")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no_launch")
                .help("Install mods without starting the game")
                .long("no-launch")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .help("Enable debug logging")
                .long("debug")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("game_args")
                .help("Arguments passed to the game")
                .num_args(0..)
                .last(true),
        )
}

fn launcher_args(matches: &ArgMatches) -> LauncherArgs {
    LauncherArgs {
        game_dir: matches.get_one::<PathBuf>("game_dir").cloned(),
        force: matches.get_flag("force"),
        skip_optional: matches.get_flag("skip_optional"),
        no_launch: matches.get_flag("no_launch"),
        game_args: matches
            .get_many::<String>("game_args")
            .map(|args| args.cloned().collect())
            .unwrap_or_default(),
    }
}

fn main() -> BoxResult<()> {
    let matches = cli().get_matches();
    let level = if matches.get_flag("debug") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let rt = Runtime::new()?;
    let executable = std::env::current_exe()?;
    let loaded = rt.block_on(load_launcher_config(&executable));

    // an unconfigured template has no data dir of its own
    let logs_base = match &loaded {
        Ok((config, _)) => get_launcher_data_dir(&config.safe_name()),
        Err(_) => get_temp_dir(&APP_NAME.to_lowercase()),
    };
    setup_logger(&get_logs_dir(&logs_base).join(LOGS_FILENAME), level);
    set_sigint_handler();

    let (config, source) = loaded.inspect_err(|e| error!("{}", e))?;
    info!("{} v{} (launcher v{})", config.name, config.version, APP_VERSION);
    info!("Configuration source: {}", source);

    let errors = validate_config(&config);
    if !errors.is_empty() {
        warn!("{}", errors.to_text());
    }

    let args = launcher_args(&matches);
    rt.block_on(app::run(&config, &args))
        .inspect_err(|e| error!("{}", e))
}

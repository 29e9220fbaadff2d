mod builder;
mod config_manager;
mod package;
mod template;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use builder::BuilderEngine;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use config_manager::ConfigManager;
use log::{info, LevelFilter};
use package::PackageOptions;
use shared::{
    embed::read_embedded_config,
    launcher_config::{LauncherConfig, ModConfig, TargetOs, APP_NAME, APP_VERSION},
    logs::setup_logger,
    paths::{get_builder_config_dir, get_logs_dir},
    progress::TerminalProgressBar,
    utils::BoxResult,
    validation::validate_target_path,
};
use template::TemplateSource;
use tokio::runtime::Runtime;

const LOGS_FILENAME: &str = "builder.log";

fn parse_path(v: &str) -> BoxResult<PathBuf> {
    let path = PathBuf::from(v);
    if path.exists() {
        Ok(path)
    } else {
        Err("The specified file does not exist".into())
    }
}

fn get_logs_path() -> PathBuf {
    get_logs_dir(&get_builder_config_dir()).join(LOGS_FILENAME)
}

fn config_arg() -> Arg {
    Arg::new("config")
        .help("Path to the launcher configuration file")
        .long("config")
        .short('c')
        .global(true)
        .value_parser(clap::value_parser!(PathBuf))
}

fn path_arg(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id).help(help).required(true)
}

/// Optional mod fields shared by `add-mod` and `edit-mod`.
fn mod_details(command: Command) -> Command {
    command
        .arg(Arg::new("description").help("Mod description").long("description"))
        .arg(Arg::new("version").help("Mod version").long("mod-version"))
        .arg(
            Arg::new("sha1")
                .help("Expected SHA-1 of the downloaded file, empty to drop the check")
                .long("sha1"),
        )
        .arg(
            Arg::new("required")
                .help("Installation fails when this mod fails")
                .long("required")
                .action(ArgAction::SetTrue),
        )
}

fn cli() -> Command {
    Command::new("launcher-builder")
        .version(APP_VERSION)
        .about("Builds standalone mod launchers from a configuration file")
        .subcommand_required(true)
        .arg(config_arg())
        .arg(
            Arg::new("debug")
                .help("Enable debug logging")
                .long("debug")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("init")
                .about("Writes the default configuration")
                .arg(
                    Arg::new("force")
                        .help("Overwrite an existing configuration")
                        .long("force")
                        .short('f')
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("validate").about("Checks the configuration for errors"))
        .subcommand(
            Command::new("build")
                .about("Builds a launcher from the configuration")
                .arg(
                    Arg::new("output")
                        .help("Output path, defaults to the desktop")
                        .long("output")
                        .short('o')
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("target")
                        .help("Target operating system, overrides the configuration")
                        .long("target")
                        .short('t')
                        .value_parser(clap::value_parser!(TargetOs)),
                )
                .arg(
                    Arg::new("templates")
                        .help("Directory with launcher templates")
                        .long("templates")
                        .value_parser(parse_path)
                        .conflicts_with("template"),
                )
                .arg(
                    Arg::new("template")
                        .help("Launcher template to use instead of the templates directory")
                        .long("template")
                        .value_parser(parse_path),
                )
                .arg(
                    Arg::new("sidecar")
                        .help("Also write launcher_config.json next to the launcher")
                        .long("sidecar")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("codesign")
                        .help("Sign the macOS launcher with this identity (- for ad-hoc)")
                        .long("codesign")
                        .value_name("IDENTITY"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Prints the configuration embedded in a launcher")
                .arg(
                    Arg::new("launcher")
                        .help("Path to a built launcher")
                        .required(true)
                        .value_parser(parse_path),
                ),
        )
        .subcommand(
            Command::new("set")
                .about("Changes the launcher settings")
                .arg(Arg::new("name").help("Launcher name").long("name"))
                .arg(
                    Arg::new("game_exe")
                        .help("Game executable relative to the game directory")
                        .long("game-exe"),
                )
                .arg(Arg::new("description").help("Launcher description").long("description"))
                .arg(Arg::new("version").help("Launcher version").long("launcher-version"))
                .arg(
                    Arg::new("target")
                        .help("Target operating system")
                        .long("target")
                        .short('t')
                        .value_parser(clap::value_parser!(TargetOs)),
                )
                .group(
                    ArgGroup::new("settings")
                        .args(["name", "game_exe", "description", "version", "target"])
                        .multiple(true)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("add-validation-file")
                .about("Adds a file that must exist in the game directory")
                .arg(path_arg("path", "Path relative to the game directory")),
        )
        .subcommand(
            Command::new("remove-validation-file")
                .about("Removes a validation file")
                .arg(path_arg("path", "Path relative to the game directory")),
        )
        .subcommand(
            Command::new("add-location")
                .about("Adds a directory where the launcher looks for the game")
                .arg(
                    Arg::new("location")
                        .help("Directory, may start with ~")
                        .required_unless_present("common"),
                )
                .arg(
                    Arg::new("common")
                        .help("Add the usual game directories of the target OS")
                        .long("common")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("location"),
                ),
        )
        .subcommand(
            Command::new("remove-location")
                .about("Removes a default game location")
                .arg(path_arg("location", "Directory to remove")),
        )
        .subcommand(mod_details(
            Command::new("add-mod")
                .about("Adds a mod to the configuration")
                .arg(Arg::new("name").help("Mod name").long("name").required(true))
                .arg(
                    Arg::new("url")
                        .help("Download URL of the mod archive")
                        .long("url")
                        .required(true),
                )
                .arg(
                    Arg::new("target_path")
                        .help("Install path relative to the game directory")
                        .long("target-path")
                        .default_value(config_manager::DEFAULT_MOD_TARGET_PATH),
                ),
        ))
        .subcommand(
            mod_details(
                Command::new("edit-mod")
                    .about("Changes a mod of the configuration")
                    .arg(Arg::new("id").help("Mod id").required(true))
                    .arg(Arg::new("name").help("Mod name").long("name"))
                    .arg(Arg::new("url").help("Download URL of the mod archive").long("url"))
                    .arg(
                        Arg::new("target_path")
                            .help("Install path relative to the game directory")
                            .long("target-path"),
                    ),
            )
            .arg(
                Arg::new("optional")
                    .help("Installation continues when this mod fails")
                    .long("optional")
                    .action(ArgAction::SetTrue)
                    .conflicts_with("required"),
            )
            .group(
                ArgGroup::new("changes")
                    .args([
                        "name",
                        "url",
                        "target_path",
                        "description",
                        "version",
                        "sha1",
                        "required",
                        "optional",
                    ])
                    .multiple(true)
                    .required(true),
            ),
        )
        .subcommand(
            Command::new("remove-mod")
                .about("Removes a mod from the configuration")
                .arg(Arg::new("id").help("Mod id").required(true)),
        )
        .subcommand(
            Command::new("import")
                .about("Replaces the configuration with a file")
                .arg(
                    Arg::new("file")
                        .help("Configuration file to import")
                        .required(true)
                        .value_parser(parse_path),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Writes a copy of the configuration")
                .arg(
                    Arg::new("file")
                        .help("Destination file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}

fn required<'a, T: Clone + Send + Sync + 'static>(
    matches: &'a ArgMatches,
    name: &str,
) -> BoxResult<&'a T> {
    matches
        .get_one::<T>(name)
        .ok_or_else(|| format!("Missing argument {}", name).into())
}

async fn load_manager(config_path: Option<&PathBuf>) -> BoxResult<ConfigManager> {
    let mut manager = match config_path {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    manager.load(None).await?;
    Ok(manager)
}

async fn init(config_path: Option<&PathBuf>, force: bool) -> BoxResult<()> {
    let mut manager = match config_path {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    if manager.config_path.exists() && !force {
        return Err(format!(
            "{} already exists, use --force to overwrite it",
            manager.config_path.display()
        )
        .into());
    }
    manager.save(None).await?;
    println!("Default configuration written to {}", manager.config_path.display());
    Ok(())
}

async fn validate(config_path: Option<&PathBuf>) -> BoxResult<()> {
    let manager = load_manager(config_path).await?;
    let errors = manager.validate();
    println!("{}", errors.to_text());
    if !errors.is_empty() {
        return Err(format!("{} validation error(s)", errors.len()).into());
    }
    Ok(())
}

async fn build(config_path: Option<&PathBuf>, matches: &ArgMatches) -> BoxResult<()> {
    let manager = load_manager(config_path).await?;
    let mut config = manager.config;
    if let Some(target_os) = matches.get_one::<TargetOs>("target") {
        config.target_os = *target_os;
    }

    let templates = if let Some(template) = matches.get_one::<PathBuf>("template") {
        TemplateSource::File(template.clone())
    } else if let Some(dir) = matches.get_one::<PathBuf>("templates") {
        TemplateSource::Directory(dir.clone())
    } else {
        TemplateSource::default()
    };
    let package_options = PackageOptions {
        codesign_identity: matches.get_one::<String>("codesign").cloned(),
    };

    let mut engine = BuilderEngine::new(config, Arc::new(TerminalProgressBar::new()))
        .with_templates(templates)
        .with_package_options(package_options)
        .with_sidecar(matches.get_flag("sidecar"));
    let output = engine
        .build(matches.get_one::<PathBuf>("output").map(PathBuf::as_path))
        .await?;
    println!("Launcher created: {}", output.display());
    Ok(())
}

async fn inspect(launcher: &Path) -> BoxResult<()> {
    match read_embedded_config(launcher).await? {
        Some(config) => println!("{}", config.to_json()?),
        None => println!("{} has no embedded configuration", launcher.display()),
    }
    Ok(())
}

/// Loads the configuration, applies `edit` and saves the result. The
/// message returned by `edit` is printed once the file is written.
async fn edit_config<F>(config_path: Option<&PathBuf>, edit: F) -> BoxResult<()>
where
    F: FnOnce(&mut LauncherConfig) -> BoxResult<String>,
{
    let mut manager = load_manager(config_path).await?;
    let message = edit(&mut manager.config)?;
    manager.save(None).await?;
    println!("{}", message);
    Ok(())
}

fn apply_settings(config: &mut LauncherConfig, matches: &ArgMatches) {
    if let Some(name) = matches.get_one::<String>("name") {
        config.name = name.clone();
    }
    if let Some(game_exe) = matches.get_one::<String>("game_exe") {
        config.game_exe = game_exe.clone();
    }
    if let Some(description) = matches.get_one::<String>("description") {
        config.description = description.clone();
    }
    if let Some(version) = matches.get_one::<String>("version") {
        config.version = version.clone();
    }
    if let Some(target_os) = matches.get_one::<TargetOs>("target") {
        config.target_os = *target_os;
    }
    config.touch();
}

fn apply_mod_details(mod_config: &mut ModConfig, matches: &ArgMatches) {
    if let Some(description) = matches.get_one::<String>("description") {
        mod_config.description = description.clone();
    }
    if let Some(version) = matches.get_one::<String>("version") {
        mod_config.version = version.clone();
    }
    if let Some(sha1) = matches.get_one::<String>("sha1") {
        mod_config.sha1 = Some(sha1.trim().to_lowercase()).filter(|s| !s.is_empty());
    }
    if matches.get_flag("required") {
        mod_config.is_required = true;
    }
}

async fn set(config_path: Option<&PathBuf>, matches: &ArgMatches) -> BoxResult<()> {
    edit_config(config_path, |config| {
        apply_settings(config, matches);
        Ok("Settings updated".to_string())
    })
    .await
}

async fn add_validation_file(config_path: Option<&PathBuf>, file: &str) -> BoxResult<()> {
    if !validate_target_path(file) {
        return Err(format!("{} must be relative to the game directory", file).into());
    }
    edit_config(config_path, |config| {
        Ok(if config.add_validation_file(file) {
            format!("Added validation file {}", file)
        } else {
            format!("{} is already a validation file", file)
        })
    })
    .await
}

async fn remove_validation_file(config_path: Option<&PathBuf>, file: &str) -> BoxResult<()> {
    edit_config(config_path, |config| {
        if !config.remove_validation_file(file) {
            return Err(format!("{} is not a validation file", file).into());
        }
        Ok(format!("Removed validation file {}", file))
    })
    .await
}

async fn add_location(config_path: Option<&PathBuf>, matches: &ArgMatches) -> BoxResult<()> {
    edit_config(config_path, |config| {
        if matches.get_flag("common") {
            let added = config.add_common_locations();
            return Ok(format!(
                "Added {} common {} location(s)",
                added, config.target_os
            ));
        }
        let location = required::<String>(matches, "location")?;
        Ok(if config.add_default_location(location) {
            format!("Added location {}", location)
        } else {
            format!("{} is already a default location", location)
        })
    })
    .await
}

async fn remove_location(config_path: Option<&PathBuf>, location: &str) -> BoxResult<()> {
    edit_config(config_path, |config| {
        if !config.remove_default_location(location) {
            return Err(format!("{} is not a default location", location).into());
        }
        Ok(format!("Removed location {}", location))
    })
    .await
}

async fn add_mod(config_path: Option<&PathBuf>, matches: &ArgMatches) -> BoxResult<()> {
    let mut mod_config = ModConfig::new(
        required::<String>(matches, "name")?,
        required::<String>(matches, "target_path")?,
        required::<String>(matches, "url")?,
    );
    apply_mod_details(&mut mod_config, matches);

    edit_config(config_path, |config| {
        let message = format!("Added mod {}", mod_config.id);
        config.add_mod(mod_config);
        Ok(message)
    })
    .await
}

async fn edit_mod(config_path: Option<&PathBuf>, matches: &ArgMatches) -> BoxResult<()> {
    let id = required::<String>(matches, "id")?;
    edit_config(config_path, |config| {
        let mod_config = config
            .get_mod_mut(id)
            .ok_or_else(|| format!("No mod with id {}", id))?;
        if let Some(name) = matches.get_one::<String>("name") {
            mod_config.name = name.clone();
        }
        if let Some(url) = matches.get_one::<String>("url") {
            mod_config.download_url = url.clone();
        }
        if let Some(target_path) = matches.get_one::<String>("target_path") {
            mod_config.target_path = target_path.clone();
        }
        apply_mod_details(mod_config, matches);
        if matches.get_flag("optional") {
            mod_config.is_required = false;
        }
        config.touch();
        Ok(format!("Updated mod {}", id))
    })
    .await
}

async fn remove_mod(config_path: Option<&PathBuf>, id: &str) -> BoxResult<()> {
    edit_config(config_path, |config| {
        if !config.remove_mod(id) {
            return Err(format!("No mod with id {}", id).into());
        }
        Ok(format!("Removed mod {}", id))
    })
    .await
}

async fn import(config_path: Option<&PathBuf>, file: &Path) -> BoxResult<()> {
    let mut manager = match config_path {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    manager.import_config(file).await?;
    println!("Configuration imported to {}", manager.config_path.display());
    Ok(())
}

async fn export(config_path: Option<&PathBuf>, file: &Path) -> BoxResult<()> {
    let manager = load_manager(config_path).await?;
    manager.export_config(file).await?;
    println!("Configuration exported to {}", file.display());
    Ok(())
}

async fn run(matches: &ArgMatches) -> BoxResult<()> {
    let config_path = matches.get_one::<PathBuf>("config");
    match matches.subcommand() {
        Some(("init", sub)) => init(config_path, sub.get_flag("force")).await,
        Some(("validate", _)) => validate(config_path).await,
        Some(("build", sub)) => build(config_path, sub).await,
        Some(("inspect", sub)) => inspect(required::<PathBuf>(sub, "launcher")?).await,
        Some(("set", sub)) => set(config_path, sub).await,
        Some(("add-validation-file", sub)) => {
            add_validation_file(config_path, required::<String>(sub, "path")?).await
        }
        Some(("remove-validation-file", sub)) => {
            remove_validation_file(config_path, required::<String>(sub, "path")?).await
        }
        Some(("add-location", sub)) => add_location(config_path, sub).await,
        Some(("remove-location", sub)) => {
            remove_location(config_path, required::<String>(sub, "location")?).await
        }
        Some(("add-mod", sub)) => add_mod(config_path, sub).await,
        Some(("edit-mod", sub)) => edit_mod(config_path, sub).await,
        Some(("remove-mod", sub)) => remove_mod(config_path, required::<String>(sub, "id")?).await,
        Some(("import", sub)) => import(config_path, required::<PathBuf>(sub, "file")?).await,
        Some(("export", sub)) => export(config_path, required::<PathBuf>(sub, "file")?).await,
        _ => Err("Unknown command".into()),
    }
}

fn main() -> BoxResult<()> {
    let matches = cli().get_matches();

    let level = if matches.get_flag("debug") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    setup_logger(&get_logs_path(), level);
    info!("{} builder v{}", APP_NAME, APP_VERSION);

    let rt = Runtime::new()?;
    rt.block_on(run(&matches))
}

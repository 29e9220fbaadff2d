use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use shared::{
    launcher_config::LauncherConfig, utils::expand_home, validation::validate_game_directory,
};
use walkdir::WalkDir;

#[derive(thiserror::Error, Debug)]
pub enum GameDirError {
    #[error("{0} is not a valid game directory, expected to find {1}")]
    Invalid(PathBuf, String),
    #[error("Game directory not found, pass it with --game-dir")]
    NotFound,
}

fn home_join(parts: &[&str]) -> Option<PathBuf> {
    dirs::home_dir().map(|home| parts.iter().fold(home, |path, part| path.join(part)))
}

/// Usual install roots of games on this platform that exist on this machine.
pub fn common_game_dirs() -> Vec<PathBuf> {
    let mut found = vec![];

    if cfg!(target_os = "windows") {
        for drive in ["C:\\", "D:\\", "E:\\", "F:\\"] {
            let drive = PathBuf::from(drive);
            if !drive.exists() {
                continue;
            }
            let layouts: [&[&str]; 8] = [
                &["Program Files", "Steam", "steamapps", "common"],
                &["Program Files (x86)", "Steam", "steamapps", "common"],
                &["SteamLibrary", "steamapps", "common"],
                &["Program Files", "Epic Games"],
                &["Program Files (x86)", "Epic Games"],
                &["Games"],
                &["Program Files", "Games"],
                &["Program Files (x86)", "Games"],
            ];
            for parts in layouts {
                found.push(parts.iter().fold(drive.clone(), |path, part| path.join(part)));
            }
        }
    } else if cfg!(target_os = "macos") {
        found.extend(home_join(&[
            "Library",
            "Application Support",
            "Steam",
            "steamapps",
            "common",
        ]));
        found.push(PathBuf::from("/Applications"));
        found.extend(home_join(&["Games"]));
    } else {
        found.extend(home_join(&[".steam", "steam", "steamapps", "common"]));
        found.extend(home_join(&[".local", "share", "Steam", "steamapps", "common"]));
        found.extend(home_join(&["Games"]));
    }

    found.into_iter().filter(|dir| dir.is_dir()).collect()
}

/// The configured default locations followed by the common ones.
pub fn candidate_dirs(config: &LauncherConfig) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = config
        .default_locations
        .iter()
        .map(|location| expand_home(location))
        .collect();
    for dir in common_game_dirs() {
        if !candidates.contains(&dir) {
            candidates.push(dir);
        }
    }
    candidates
}

/// Checks each candidate and then its direct subdirectories, in name order.
pub fn find_game_dir(candidates: &[PathBuf], validation_files: &[String]) -> Option<PathBuf> {
    for candidate in candidates {
        if !candidate.is_dir() {
            continue;
        }
        if validate_game_directory(candidate, validation_files) {
            return Some(candidate.clone());
        }

        let found = WalkDir::new(candidate)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .find(|dir| validate_game_directory(dir, validation_files));
        if found.is_some() {
            return found;
        }
        debug!("No game installation in {}", candidate.display());
    }
    None
}

fn prompt_game_dir<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    config: &LauncherConfig,
) -> std::io::Result<Option<PathBuf>> {
    loop {
        write!(
            output,
            "Enter the {} game directory (empty to cancel): ",
            config.name
        )?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim().trim_matches('"');
        if line.is_empty() {
            return Ok(None);
        }

        let dir = expand_home(line);
        if validate_game_directory(&dir, &config.validation_files) {
            return Ok(Some(dir));
        }
        writeln!(
            output,
            "{} does not look like the game directory, expected to find {}",
            dir.display(),
            config.validation_files.join(", ")
        )?;
    }
}

/// Picks the game directory: an explicit `--game-dir` must be valid, a
/// remembered one is used while it stays valid, then the candidate locations
/// are searched and finally the user is asked when running in a terminal.
pub fn resolve_game_dir(
    explicit: Option<&Path>,
    remembered: Option<&Path>,
    config: &LauncherConfig,
) -> Result<PathBuf, GameDirError> {
    let validation_files = &config.validation_files;

    if let Some(dir) = explicit {
        let dir = expand_home(&dir.to_string_lossy());
        if validate_game_directory(&dir, validation_files) {
            return Ok(dir);
        }
        return Err(GameDirError::Invalid(dir, validation_files.join(", ")));
    }

    if let Some(dir) = remembered {
        if validate_game_directory(dir, validation_files) {
            debug!("Using remembered game directory {}", dir.display());
            return Ok(dir.to_path_buf());
        }
        warn!(
            "Remembered game directory {} is no longer valid",
            dir.display()
        );
    }

    if let Some(dir) = find_game_dir(&candidate_dirs(config), validation_files) {
        info!("Found game directory {}", dir.display());
        return Ok(dir);
    }

    if std::io::stdin().is_terminal() {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        if let Ok(Some(dir)) = prompt_game_dir(&mut input, &mut output, config) {
            return Ok(dir);
        }
    }

    Err(GameDirError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LauncherConfig {
        let mut config = LauncherConfig::new("Pack", "game.exe");
        config.add_validation_file("game.exe");
        config.add_validation_file("data/base.pak");
        config
    }

    fn make_game(dir: &Path) {
        std::fs::create_dir_all(dir.join("data")).unwrap();
        std::fs::write(dir.join("game.exe"), b"").unwrap();
        std::fs::write(dir.join("data/base.pak"), b"").unwrap();
    }

    #[test]
    fn test_find_direct_and_nested() {
        let root = tempfile::tempdir().unwrap();
        let library = root.path().join("library");
        let game = library.join("The Game");
        std::fs::create_dir_all(library.join("Another Game")).unwrap();
        make_game(&game);

        let files = config().validation_files;
        assert_eq!(find_game_dir(&[game.clone()], &files), Some(game.clone()));
        assert_eq!(find_game_dir(&[library.clone()], &files), Some(game));
        // two levels deep is not searched
        assert_eq!(find_game_dir(&[root.path().to_path_buf()], &files), None);
    }

    #[test]
    fn test_find_skips_missing_candidates() {
        let root = tempfile::tempdir().unwrap();
        let game = root.path().join("game");
        make_game(&game);

        let candidates = vec![root.path().join("missing"), game.clone()];
        assert_eq!(
            find_game_dir(&candidates, &config().validation_files),
            Some(game)
        );
    }

    #[test]
    fn test_explicit_dir_must_be_valid() {
        let root = tempfile::tempdir().unwrap();
        let game = root.path().join("game");
        make_game(&game);

        assert_eq!(
            resolve_game_dir(Some(&game), None, &config()).unwrap(),
            game
        );
        assert!(matches!(
            resolve_game_dir(Some(root.path()), Some(&game), &config()),
            Err(GameDirError::Invalid(..))
        ));
    }

    #[test]
    fn test_remembered_then_default_locations() {
        let root = tempfile::tempdir().unwrap();
        let remembered = root.path().join("remembered");
        let located = root.path().join("located");
        make_game(&remembered);
        make_game(&located);

        let mut config = config();
        config.add_default_location(&located.to_string_lossy());

        assert_eq!(
            resolve_game_dir(None, Some(&remembered), &config).unwrap(),
            remembered
        );
        std::fs::remove_file(remembered.join("game.exe")).unwrap();
        assert_eq!(
            resolve_game_dir(None, Some(&remembered), &config).unwrap(),
            located
        );
    }

    #[test]
    fn test_prompt_retries_until_valid() {
        let root = tempfile::tempdir().unwrap();
        let game = root.path().join("game");
        make_game(&game);

        let answers = format!("{}\n{}\n", root.path().display(), game.display());
        let mut input = answers.as_bytes();
        let mut output = vec![];
        let dir = prompt_game_dir(&mut input, &mut output, &config()).unwrap();

        assert_eq!(dir, Some(game));
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("does not look like the game directory"));
    }

    #[test]
    fn test_prompt_cancel() {
        let mut input = "\n".as_bytes();
        let mut output = vec![];
        assert_eq!(
            prompt_game_dir(&mut input, &mut output, &config()).unwrap(),
            None
        );
    }
}

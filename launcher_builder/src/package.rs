//! Writes a configured launcher to its final location.
//!
//! Plain executables are written in place. A macOS target whose output path
//! ends in `.app` becomes an application bundle:
//!
//! ```text
//! <name>.app/Contents/Info.plist
//! <name>.app/Contents/MacOS/<safe name>
//! <name>.app/Contents/Resources/launcher_config.json
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use shared::{
    files::set_executable,
    launcher_config::{LauncherConfig, TargetOs},
    paths::SIDECAR_CONFIG_FILENAME,
    utils::BoxResult,
};
use tokio::fs;

use crate::utils::exec_command;

#[derive(Debug, Clone, Default)]
pub struct PackageOptions {
    /// Identity passed to `codesign --sign`, `-` for ad-hoc signing.
    pub codesign_identity: Option<String>,
}

fn is_app_bundle(target_os: TargetOs, output: &Path) -> bool {
    target_os == TargetOs::Macos && output.extension().is_some_and(|ext| ext == "app")
}

fn info_plist(config: &LauncherConfig) -> String {
    let safe_name = config.safe_name();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleExecutable</key>
    <string>{safe_name}</string>
    <key>CFBundleIdentifier</key>
    <string>com.launchforge.{identifier}</string>
    <key>CFBundleName</key>
    <string>{name}</string>
    <key>CFBundlePackageType</key>
    <string>APPL</string>
    <key>CFBundleShortVersionString</key>
    <string>{version}</string>
    <key>CFBundleVersion</key>
    <string>{version}</string>
    <key>LSMinimumSystemVersion</key>
    <string>10.13</string>
    <key>NSHighResolutionCapable</key>
    <true/>
</dict>
</plist>
"#,
        safe_name = safe_name,
        identifier = safe_name.to_lowercase(),
        name = xml_escape(&config.name),
        version = xml_escape(&config.version),
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Writes `data` next to `path` and renames it over `path`, so a reader never
/// sees a half-written executable.
pub async fn write_atomic(path: &Path, data: &[u8], executable: bool) -> BoxResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("Invalid output path {}", path.display()))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, data).await?;
    if executable {
        if let Err(e) = set_executable(&temp_path) {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Box::new(e));
        }
    }
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(Box::new(e));
    }
    Ok(())
}

async fn write_bundle(bundle: &Path, data: &[u8], config: &LauncherConfig) -> BoxResult<PathBuf> {
    let contents = bundle.join("Contents");
    let executable = contents.join("MacOS").join(config.safe_name());

    write_atomic(&executable, data, true).await?;
    write_atomic(&contents.join("Info.plist"), info_plist(config).as_bytes(), false).await?;
    write_atomic(
        &contents.join("Resources").join(SIDECAR_CONFIG_FILENAME),
        config.to_json()?.as_bytes(),
        false,
    )
    .await?;

    debug!("Created application bundle {}", bundle.display());
    Ok(executable)
}

async fn codesign(path: &Path, identity: &str) -> BoxResult<()> {
    if TargetOs::current() != TargetOs::Macos {
        warn!("Skipping code signing, it is only available on macOS");
        return Ok(());
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    exec_command(
        "codesign",
        [
            OsStr::new("--force"),
            OsStr::new("--sign"),
            OsStr::new(identity),
            path.as_os_str(),
        ],
        dir,
    )
    .await
}

/// Packages the configured launcher `data` at `output`. Returns the path of
/// the launcher executable, which lies inside the bundle for `.app` outputs.
pub async fn package(
    data: &[u8],
    output: &Path,
    config: &LauncherConfig,
    options: &PackageOptions,
) -> BoxResult<PathBuf> {
    let target_os = config.target_os;
    let (executable, signed_path) = if is_app_bundle(target_os, output) {
        let executable = write_bundle(output, data, config).await?;
        (executable, output.to_path_buf())
    } else {
        write_atomic(output, data, target_os.is_unix()).await?;
        (output.to_path_buf(), output.to_path_buf())
    };

    if let Some(identity) = &options.codesign_identity {
        codesign(&signed_path, identity).await?;
    }

    info!("Launcher written to {}", output.display());
    Ok(executable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(target_os: TargetOs) -> LauncherConfig {
        let mut config = LauncherConfig::new("My Pack", "game.exe");
        config.target_os = target_os;
        config
    }

    #[tokio::test]
    async fn test_package_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("My_Pack.exe");
        let config = config(TargetOs::Windows);
        let options = PackageOptions::default();

        package(b"first", &output, &config, &options).await.unwrap();
        let executable = package(b"second", &output, &config, &options)
            .await
            .unwrap();

        assert_eq!(executable, output);
        assert_eq!(std::fs::read(&output).unwrap(), b"second");
        assert!(!dir.path().join("out").join("My_Pack.exe.tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_target_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("My_Pack");
        package(b"ELF", &output, &config(TargetOs::Linux), &PackageOptions::default())
            .await
            .unwrap();

        let mode = std::fs::metadata(&output).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[tokio::test]
    async fn test_macos_app_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("My_Pack.app");
        let config = config(TargetOs::Macos);

        let executable = package(b"MACHO", &output, &config, &PackageOptions::default())
            .await
            .unwrap();

        assert_eq!(executable, output.join("Contents/MacOS/My_Pack"));
        assert_eq!(std::fs::read(&executable).unwrap(), b"MACHO");

        let plist = std::fs::read_to_string(output.join("Contents/Info.plist")).unwrap();
        assert!(plist.contains("<string>My_Pack</string>"));

        let resources = output.join("Contents/Resources/launcher_config.json");
        let stored = LauncherConfig::read(&resources).await.unwrap();
        assert_eq!(stored, config);
    }

    #[tokio::test]
    async fn test_macos_plain_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("My_Pack");
        let executable = package(b"MACHO", &output, &config(TargetOs::Macos), &PackageOptions::default())
            .await
            .unwrap();
        assert_eq!(executable, output);
        assert!(output.is_file());
    }

    #[test]
    fn test_plist_escapes_name() {
        let mut config = config(TargetOs::Macos);
        config.name = "Mods & <More>".to_string();
        let plist = info_plist(&config);
        assert!(plist.contains("Mods &amp; &lt;More&gt;"));
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use shared::{
    embed::{embed_config, verify_embedding},
    launcher_config::LauncherConfig,
    paths::get_sidecar_path,
    progress::{ProgressBar, Unit},
    utils::BoxResult,
    validation::{validate_config, InvalidConfigError},
};

use crate::package::{package, PackageOptions};
use crate::template::TemplateSource;

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("Launcher at {0} does not contain the expected configuration")]
    VerificationFailed(PathBuf),
}

/// `<desktop or working dir>/<safe name><extension>`
pub fn default_output_path(config: &LauncherConfig) -> PathBuf {
    let dir = dirs::desktop_dir()
        .filter(|dir| dir.is_dir())
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join(format!(
        "{}{}",
        config.safe_name(),
        config.target_os.executable_extension()
    ))
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Stage {
    Validate,
    SelectTemplate,
    ReadTemplate,
    Embed,
    Package,
    Verify,
    Sidecar,
}

impl Stage {
    fn message(&self) -> &'static str {
        match self {
            Stage::Validate => "Validating configuration",
            Stage::SelectTemplate => "Selecting template",
            Stage::ReadTemplate => "Reading template",
            Stage::Embed => "Embedding configuration",
            Stage::Package => "Writing launcher",
            Stage::Verify => "Verifying launcher",
            Stage::Sidecar => "Writing configuration file",
        }
    }

    // overall progress once the stage is done, out of 100
    fn progress(&self) -> u64 {
        match self {
            Stage::Validate => 10,
            Stage::SelectTemplate => 20,
            Stage::ReadTemplate => 30,
            Stage::Embed => 50,
            Stage::Package => 70,
            Stage::Verify => 90,
            Stage::Sidecar => 100,
        }
    }
}

pub struct BuilderEngine {
    config: LauncherConfig,
    templates: TemplateSource,
    package_options: PackageOptions,
    write_sidecar: bool,
    progress_bar: Arc<dyn ProgressBar<String>>,
    position: u64,
}

impl BuilderEngine {
    pub fn new(config: LauncherConfig, progress_bar: Arc<dyn ProgressBar<String>>) -> Self {
        Self {
            config,
            templates: TemplateSource::default(),
            package_options: PackageOptions::default(),
            write_sidecar: false,
            progress_bar,
            position: 0,
        }
    }

    pub fn with_templates(mut self, templates: TemplateSource) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_package_options(mut self, package_options: PackageOptions) -> Self {
        self.package_options = package_options;
        self
    }

    pub fn with_sidecar(mut self, write_sidecar: bool) -> Self {
        self.write_sidecar = write_sidecar;
        self
    }

    /// The configuration as embedded by the last build.
    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    fn start(&self, stage: Stage) {
        debug!("{}", stage.message());
        self.progress_bar.set_message(stage.message().to_string());
    }

    fn complete(&mut self, stage: Stage) {
        let target = stage.progress();
        self.progress_bar.inc(target.saturating_sub(self.position));
        self.position = target;
    }

    /// Builds the launcher at `output`, or at [`default_output_path`] when
    /// `None`. Returns the path that was written.
    pub async fn build(&mut self, output: Option<&Path>) -> BoxResult<PathBuf> {
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(&self.config));
        info!(
            "Building {} launcher {} at {}",
            self.config.target_os,
            self.config.name,
            output.display()
        );

        self.position = 0;
        self.progress_bar.reset();
        self.progress_bar.set_unit(Unit::Items);
        self.progress_bar.set_length(100);

        self.start(Stage::Validate);
        let errors = validate_config(&self.config);
        if !errors.is_empty() {
            return Err(Box::new(InvalidConfigError(errors)));
        }
        self.complete(Stage::Validate);

        self.start(Stage::SelectTemplate);
        let template_path = self.templates.resolve(self.config.target_os)?;
        info!("Using template {}", template_path.display());
        self.complete(Stage::SelectTemplate);

        self.start(Stage::ReadTemplate);
        let template = self.templates.read(self.config.target_os).await?;
        self.complete(Stage::ReadTemplate);

        self.start(Stage::Embed);
        self.config.stamp();
        let data = embed_config(&template, &self.config)?;
        debug!(
            "Template is {} bytes, launcher is {} bytes",
            template.len(),
            data.len()
        );
        self.complete(Stage::Embed);

        self.start(Stage::Package);
        let executable = package(&data, &output, &self.config, &self.package_options).await?;
        self.complete(Stage::Package);

        self.start(Stage::Verify);
        if !verify_embedding(&executable, &self.config).await? {
            return Err(Box::new(BuildError::VerificationFailed(executable)));
        }
        self.complete(Stage::Verify);

        self.start(Stage::Sidecar);
        if self.write_sidecar {
            if let Some(sidecar_path) = get_sidecar_path(&output) {
                self.config.write(&sidecar_path).await?;
                info!("Configuration file written to {}", sidecar_path.display());
            }
        }
        self.complete(Stage::Sidecar);

        self.progress_bar.finish();
        info!("Launcher built successfully: {}", output.display());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        embed::read_embedded_config, launcher_config::ModConfig, launcher_config::TargetOs,
        progress::SilentProgressBar,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProgressBar {
        position: Mutex<u64>,
        messages: Mutex<Vec<String>>,
    }

    impl ProgressBar<String> for RecordingProgressBar {
        fn set_message(&self, message: String) {
            self.messages.lock().unwrap().push(message);
        }

        fn set_length(&self, _length: u64) {}

        fn inc(&self, amount: u64) {
            *self.position.lock().unwrap() += amount;
        }

        fn finish(&self) {}
    }

    fn valid_config(target_os: TargetOs) -> LauncherConfig {
        let mut config = LauncherConfig::new("My Pack", "game.exe");
        config.target_os = target_os;
        config.add_mod(ModConfig::new(
            "Base",
            "mods/",
            "https://example.com/base.zip",
        ));
        config.add_validation_file("game.exe");
        config
    }

    fn templates_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("launcher-windows.exe"), b"MZ\x90\0template").unwrap();
        std::fs::write(dir.path().join("launcher-linux"), b"\x7fELFtemplate").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_build_embeds_config() {
        let templates = templates_dir();
        let out = tempfile::tempdir().unwrap();
        let output = out.path().join("My_Pack.exe");
        let progress_bar = Arc::new(RecordingProgressBar::default());

        let mut engine = BuilderEngine::new(valid_config(TargetOs::Windows), progress_bar.clone())
            .with_templates(TemplateSource::Directory(templates.path().to_path_buf()));
        let written = engine.build(Some(&output)).await.unwrap();

        assert_eq!(written, output);
        let data = std::fs::read(&output).unwrap();
        assert!(data.starts_with(b"MZ\x90\0template"));

        let embedded = read_embedded_config(&output).await.unwrap().unwrap();
        assert_eq!(&embedded, engine.config());
        assert!(embedded.created_with.starts_with("LaunchForge v"));

        assert_eq!(*progress_bar.position.lock().unwrap(), 100);
        assert_eq!(progress_bar.messages.lock().unwrap().len(), 7);
        assert!(!out.path().join("launcher_config.json").exists());
    }

    #[tokio::test]
    async fn test_invalid_config_aborts() {
        let templates = templates_dir();
        let out = tempfile::tempdir().unwrap();
        let output = out.path().join("broken.exe");

        let mut config = valid_config(TargetOs::Windows);
        config.mods.clear();
        let mut engine = BuilderEngine::new(config, Arc::new(SilentProgressBar))
            .with_templates(TemplateSource::Directory(templates.path().to_path_buf()));

        let error = engine.build(Some(&output)).await.unwrap_err();
        assert!(error.to_string().contains("At least one mod"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_missing_template() {
        let templates = templates_dir();
        let out = tempfile::tempdir().unwrap();

        let mut engine = BuilderEngine::new(valid_config(TargetOs::Macos), Arc::new(SilentProgressBar))
            .with_templates(TemplateSource::Directory(templates.path().to_path_buf()));
        assert!(engine
            .build(Some(&out.path().join("My_Pack.app")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_rebuild_from_configured_launcher() {
        let templates = templates_dir();
        let out = tempfile::tempdir().unwrap();
        let first = out.path().join("first");
        let second = out.path().join("second");

        let mut engine = BuilderEngine::new(valid_config(TargetOs::Linux), Arc::new(SilentProgressBar))
            .with_templates(TemplateSource::Directory(templates.path().to_path_buf()));
        engine.build(Some(&first)).await.unwrap();

        let mut config = valid_config(TargetOs::Linux);
        config.name = "Second Pack".to_string();
        let mut engine = BuilderEngine::new(config, Arc::new(SilentProgressBar))
            .with_templates(TemplateSource::File(first.clone()))
            .with_sidecar(true);
        engine.build(Some(&second)).await.unwrap();

        let embedded = read_embedded_config(&second).await.unwrap().unwrap();
        assert_eq!(embedded.name, "Second Pack");
        let data = std::fs::read(&second).unwrap();
        assert!(data.starts_with(b"\x7fELFtemplate<<<LAUNCHFORGE_CONFIG_START>>>"));

        let sidecar = LauncherConfig::read(&out.path().join("launcher_config.json"))
            .await
            .unwrap();
        assert_eq!(sidecar.name, "Second Pack");
    }

    #[test]
    fn test_default_output_path() {
        let mut config = valid_config(TargetOs::Windows);
        config.name = "Cool Mods".to_string();
        let path = default_output_path(&config);
        assert_eq!(path.file_name().unwrap(), "Cool_Mods.exe");
    }
}

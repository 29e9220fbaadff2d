use std::path::{Path, PathBuf};

use log::debug;
use shared::{launcher_config::TargetOs, paths::TEMPLATES_DIRNAME};

#[derive(thiserror::Error, Debug)]
pub enum TemplateError {
    #[error("Launcher template for {os} not found at {path}")]
    Missing { os: TargetOs, path: PathBuf },
    #[error("Launcher template {0} is empty")]
    Empty(PathBuf),
    #[error("Failed to read launcher template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `templates/` next to the builder executable, falling back to the
/// working directory.
pub fn default_templates_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(TEMPLATES_DIRNAME)
}

fn check_template(os: TargetOs, path: PathBuf) -> Result<PathBuf, TemplateError> {
    let metadata = match std::fs::metadata(&path) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(TemplateError::Missing { os, path }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TemplateError::Missing { os, path })
        }
        Err(source) => return Err(TemplateError::Io { path, source }),
    };
    if metadata.len() == 0 {
        return Err(TemplateError::Empty(path));
    }
    debug!("Using {} template {}", os, path.display());
    Ok(path)
}

pub fn select_template(target_os: TargetOs, templates_dir: &Path) -> Result<PathBuf, TemplateError> {
    check_template(target_os, templates_dir.join(target_os.template_file_name()))
}

/// Where the template for a build comes from.
#[derive(Debug, Clone)]
pub enum TemplateSource {
    Directory(PathBuf),
    File(PathBuf),
}

impl Default for TemplateSource {
    fn default() -> Self {
        TemplateSource::Directory(default_templates_dir())
    }
}

impl TemplateSource {
    pub fn resolve(&self, target_os: TargetOs) -> Result<PathBuf, TemplateError> {
        match self {
            TemplateSource::Directory(dir) => select_template(target_os, dir),
            TemplateSource::File(path) => check_template(target_os, path.clone()),
        }
    }

    pub async fn read(&self, target_os: TargetOs) -> Result<Vec<u8>, TemplateError> {
        let path = self.resolve(target_os)?;
        tokio::fs::read(&path)
            .await
            .map_err(|source| TemplateError::Io { path, source })
    }
}

use futures::StreamExt as _;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use sha1::{Digest, Sha1};
use std::fs as std_fs;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use zip::ZipArchive;

use crate::progress::{ProgressBar, Unit};
use crate::retry::{is_retryable_error, is_retryable_status, RetryPolicy};
use crate::utils::BoxResult;

pub async fn hash_file(path: &Path) -> BoxResult<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha1::new();
    let mut buffer = [0; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Server returned {status} for {url}")]
    Status { url: String, status: StatusCode },
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid file path {0}")]
    InvalidPath(PathBuf),
}

impl DownloadError {
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Http { source, .. } => is_retryable_error(source),
            DownloadError::Status { status, .. } => is_retryable_status(*status),
            DownloadError::Io { .. } | DownloadError::InvalidPath(_) => false,
        }
    }
}

async fn try_download_file(
    client: &Client,
    url: &str,
    path: &Path,
    progress_bar: &Arc<dyn ProgressBar<String>>,
) -> Result<u64, DownloadError> {
    let http_error = |source| DownloadError::Http {
        url: url.to_string(),
        source,
    };
    let io_error = |source| DownloadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let response = client.get(url).send().await.map_err(http_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status,
        });
    }

    let parent_dir = path
        .parent()
        .ok_or_else(|| DownloadError::InvalidPath(path.to_path_buf()))?;
    fs::create_dir_all(parent_dir).await.map_err(io_error)?;
    let mut file = fs::File::create(path).await.map_err(io_error)?;

    progress_bar.reset();
    progress_bar.set_unit(Unit::Bytes);
    progress_bar.set_length(response.content_length().unwrap_or(0));

    let mut size = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(http_error)?;
        file.write_all(&chunk).await.map_err(io_error)?;
        size += chunk.len() as u64;
        progress_bar.inc(chunk.len() as u64);
    }
    file.flush().await.map_err(io_error)?;
    progress_bar.finish();

    Ok(size)
}

/// Streams `url` into `path`, retrying transient failures according to
/// `retry`. Returns the number of bytes written.
pub async fn download_file(
    client: &Client,
    url: &str,
    path: &Path,
    retry: &RetryPolicy,
    progress_bar: Arc<dyn ProgressBar<String>>,
) -> Result<u64, DownloadError> {
    let mut attempt = 1;
    loop {
        match try_download_file(client, url, path, &progress_bar).await {
            Ok(size) => {
                debug!("Downloaded {} ({} bytes) to {}", url, size, path.display());
                return Ok(size);
            }
            Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                let delay = retry.delay_for(attempt - 1);
                warn!(
                    "Download attempt {}/{} failed: {}, retrying in {:?}",
                    attempt, retry.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

const ZIP_MAGICS: [&[u8; 4]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];

pub fn is_zip_archive(path: &Path) -> BoxResult<bool> {
    let mut file = std_fs::File::open(path)?;
    let mut magic = [0u8; 4];
    let mut read = 0;
    while read < magic.len() {
        let n = file.read(&mut magic[read..])?;
        if n == 0 {
            return Ok(false);
        }
        read += n;
    }
    Ok(ZIP_MAGICS.iter().any(|m| **m == magic))
}

/// Extracts a zip archive into `dest`. Entries whose names would land
/// outside `dest` are skipped. Returns the number of extracted files.
pub fn extract_archive(archive: &Path, dest: &Path) -> BoxResult<usize> {
    let file = std_fs::File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;
    std_fs::create_dir_all(dest)?;

    let mut extracted = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let file_path = match entry.enclosed_name() {
            Some(file_path) => file_path,
            None => {
                warn!("Skipping unsafe archive entry {}", entry.name());
                continue;
            }
        };

        let output_path = dest.join(file_path);
        if entry.is_dir() {
            std_fs::create_dir_all(&output_path)?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            std_fs::create_dir_all(parent)?;
        }
        // a previous install may have left it read-only
        if std_fs::symlink_metadata(&output_path).is_ok() {
            std_fs::remove_file(&output_path)?;
        }
        let mut outfile = std_fs::File::create(&output_path)?;
        std::io::copy(&mut entry, &mut outfile)?;
        extracted += 1;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let permissions = std_fs::Permissions::from_mode(mode & 0o777);
                std_fs::set_permissions(&output_path, permissions)?;
            }
        }
    }

    Ok(extracted)
}

#[cfg(unix)]
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std_fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std_fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

pub fn file_name_from_url(url: &str) -> Option<String> {
    let url = url::Url::parse(url).ok()?;
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_string())
}

//! Launcher configuration embedded at the tail of an executable.
//!
//! Layout of a configured launcher:
//!
//! ```text
//! [template bytes][START marker][pretty JSON config][END marker]
//! ```
//!
//! Every launcher binary carries both marker literals in its own read-only
//! data, so the block is always located from the end of the file and never by
//! a forward search.

use std::ops::Range;
use std::path::Path;

use log::debug;
use tokio::fs;

use crate::launcher_config::LauncherConfig;
use crate::utils::BoxResult;

pub const CONFIG_MARKER_START: &[u8] = b"<<<LAUNCHFORGE_CONFIG_START>>>";
pub const CONFIG_MARKER_END: &[u8] = b"<<<LAUNCHFORGE_CONFIG_END>>>";

#[derive(thiserror::Error, Debug)]
pub enum EmbedError {
    #[error("Configuration contains a payload marker and cannot be embedded")]
    MarkerInPayload,
    #[error("Executable has an end marker but no start marker")]
    MissingStartMarker,
    #[error("Embedded configuration is not valid: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

struct PayloadLocation {
    block_start: usize,
    json: Range<usize>,
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    rfind(haystack, needle).is_some()
}

fn locate_payload(data: &[u8]) -> Result<Option<PayloadLocation>, EmbedError> {
    if !data.ends_with(CONFIG_MARKER_END) {
        return Ok(None);
    }
    let json_end = data.len() - CONFIG_MARKER_END.len();
    let block_start =
        rfind(&data[..json_end], CONFIG_MARKER_START).ok_or(EmbedError::MissingStartMarker)?;

    Ok(Some(PayloadLocation {
        block_start,
        json: block_start + CONFIG_MARKER_START.len()..json_end,
    }))
}

pub fn has_payload(data: &[u8]) -> bool {
    data.ends_with(CONFIG_MARKER_END)
}

/// The template part of an executable, without any embedded configuration.
pub fn strip_payload(data: &[u8]) -> Result<&[u8], EmbedError> {
    Ok(match locate_payload(data)? {
        Some(location) => &data[..location.block_start],
        None => data,
    })
}

/// Embeds `config` into `template`, replacing a configuration that is
/// already present.
pub fn embed_config(template: &[u8], config: &LauncherConfig) -> Result<Vec<u8>, EmbedError> {
    let json = serde_json::to_vec_pretty(config)?;
    if contains(&json, CONFIG_MARKER_START) || contains(&json, CONFIG_MARKER_END) {
        return Err(EmbedError::MarkerInPayload);
    }

    let base = strip_payload(template)?;
    if base.len() != template.len() {
        debug!("Replacing existing configuration in template");
    }

    let mut output = Vec::with_capacity(
        base.len() + CONFIG_MARKER_START.len() + json.len() + CONFIG_MARKER_END.len(),
    );
    output.extend_from_slice(base);
    output.extend_from_slice(CONFIG_MARKER_START);
    output.extend_from_slice(&json);
    output.extend_from_slice(CONFIG_MARKER_END);
    Ok(output)
}

pub fn extract_config_value(data: &[u8]) -> Result<Option<serde_json::Value>, EmbedError> {
    match locate_payload(data)? {
        Some(location) => Ok(Some(serde_json::from_slice(&data[location.json])?)),
        None => Ok(None),
    }
}

pub fn extract_config(data: &[u8]) -> Result<Option<LauncherConfig>, EmbedError> {
    match locate_payload(data)? {
        Some(location) => Ok(Some(serde_json::from_slice(&data[location.json])?)),
        None => Ok(None),
    }
}

pub async fn read_embedded_config(executable: &Path) -> BoxResult<Option<LauncherConfig>> {
    let data = fs::read(executable).await?;
    let config = extract_config(&data)?;
    if config.is_none() {
        debug!("No configuration embedded in {}", executable.display());
    }
    Ok(config)
}

/// Checks that `executable` carries exactly `expected`, ignoring formatting
/// and key order.
pub async fn verify_embedding(executable: &Path, expected: &LauncherConfig) -> BoxResult<bool> {
    let data = fs::read(executable).await?;
    let embedded = match extract_config_value(&data)? {
        Some(value) => value,
        None => return Ok(false),
    };
    Ok(embedded == serde_json::to_value(expected)?)
}

//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! The conversion services take a file upload, so a URL is downloaded to a
//! `TempDir` first. The directory lives as long as the `ResolvedInput`, and
//! is removed when it is dropped. PDF magic bytes (`%PDF`) are checked up
//! front so a wrong file fails here rather than as an opaque service error.
//!
//! A path ending in `.xml` is taken as already-converted TEI and skips the
//! conversion services entirely.

use crate::error::PaperChemError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// What the resolved file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    /// Already-converted TEI markup.
    Markup,
}

/// The resolved input — either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, kind: InputKind },
    /// Input was a URL; the file was downloaded to a temp directory that is
    /// kept alive until processing completes.
    Downloaded {
        path: PathBuf,
        kind: InputKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    /// Path to the file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            ResolvedInput::Local { kind, .. } | ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Whether a file name marks already-converted markup.
pub fn is_markup_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".xml")
}

/// Resolve the input string to a local file.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    user_agent: &str,
) -> Result<ResolvedInput, PaperChemError> {
    if input.trim().is_empty() {
        return Err(PaperChemError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs, user_agent).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, PaperChemError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(PaperChemError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(PaperChemError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let kind = if is_markup_name(path_str) {
        InputKind::Markup
    } else {
        InputKind::Pdf
    };

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if kind == InputKind::Pdf {
                use std::io::Read;
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                    return Err(PaperChemError::NotAPdf { path, magic });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PaperChemError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PaperChemError::FileNotFound { path });
        }
    }

    debug!("Resolved local {:?}: {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(
    url: &str,
    timeout_secs: u64,
    user_agent: &str,
) -> Result<ResolvedInput, PaperChemError> {
    info!("Downloading from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(user_agent)
        .build()
        .map_err(|e| PaperChemError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PaperChemError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PaperChemError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PaperChemError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);
    let kind = if is_markup_name(&filename) {
        InputKind::Markup
    } else {
        InputKind::Pdf
    };

    let temp_dir = TempDir::new().map_err(|e| PaperChemError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PaperChemError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| PaperChemError::Internal(format!("Failed to write temp file: {}", e)))?;

    if kind == InputKind::Pdf && bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(PaperChemError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Last path segment when it looks like a file name, else `downloaded.pdf`.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

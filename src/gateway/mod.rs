//! Document conversion gateway: PDF in, TEI markup out.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ resolve ──▶ ConversionGateway ──▶ TEI string ──▶ (markup_dir)
//! (path/URL)              │
//!                         ├─▶ GrobidClient   (local, tried first)
//!                         └─▶ BackendClient  (remote, authenticated)
//! ```
//!
//! The remote backend is consulted **only** when the local service reports
//! [`PaperChemError::ServiceUnavailable`]. A local service that answers with
//! an error is a real conversion failure and is returned as such.

pub mod backend;
pub mod grobid;
pub mod input;
pub mod token;

pub use backend::BackendClient;
pub use grobid::GrobidClient;
pub use input::{resolve_input, InputKind, ResolvedInput};
pub use token::{Clock, SystemClock, TokenCache};

use crate::config::PipelineConfig;
use crate::error::PaperChemError;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Converts one PDF file to TEI markup.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, pdf: &Path) -> Result<String, PaperChemError>;
}

/// Local-first converter with remote fallback.
#[derive(Clone)]
pub struct ConversionGateway {
    local: Option<Arc<dyn DocumentConverter>>,
    remote: Option<Arc<dyn DocumentConverter>>,
    markup_dir: Option<PathBuf>,
}

impl std::fmt::Debug for ConversionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionGateway")
            .field("local", &self.local.is_some())
            .field("remote", &self.remote.is_some())
            .field("markup_dir", &self.markup_dir)
            .finish()
    }
}

impl ConversionGateway {
    pub fn new(
        local: Option<Arc<dyn DocumentConverter>>,
        remote: Option<Arc<dyn DocumentConverter>>,
    ) -> Self {
        Self {
            local,
            remote,
            markup_dir: None,
        }
    }

    /// Persist every converted document under `dir` as `<stem>.tei.xml`.
    pub fn with_markup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.markup_dir = Some(dir.into());
        self
    }

    /// Build the gateway the configuration describes. A pre-constructed
    /// `config.converter` replaces the local service.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PaperChemError> {
        let local: Option<Arc<dyn DocumentConverter>> = match (&config.converter, &config.grobid_url) {
            (Some(c), _) => Some(Arc::clone(c)),
            (None, Some(url)) => Some(Arc::new(GrobidClient::new(
                url,
                config.conversion_timeout_secs,
                &config.user_agent,
            )?)),
            (None, None) => None,
        };
        let remote: Option<Arc<dyn DocumentConverter>> = match config.backend_url {
            Some(_) => Some(Arc::new(BackendClient::new(config)?)),
            None => None,
        };
        if local.is_none() && remote.is_none() {
            return Err(PaperChemError::InvalidConfig(
                "No conversion service configured".into(),
            ));
        }

        let mut gateway = Self::new(local, remote);
        if let Some(dir) = &config.markup_dir {
            gateway = gateway.with_markup_dir(dir);
        }
        Ok(gateway)
    }

    /// Convert, then persist to `markup_dir` when configured. A failed save
    /// is logged; the markup is still returned.
    pub async fn convert(&self, pdf: &Path) -> Result<String, PaperChemError> {
        let markup = self.convert_with_fallback(pdf).await?;
        if let Some(dir) = &self.markup_dir {
            match save_markup(dir, pdf, &markup).await {
                Ok(path) => debug!("Saved markup to {}", path.display()),
                Err(e) => warn!("Could not save markup for {}: {}", pdf.display(), e),
            }
        }
        Ok(markup)
    }

    async fn convert_with_fallback(&self, pdf: &Path) -> Result<String, PaperChemError> {
        let Some(local) = &self.local else {
            return match &self.remote {
                Some(remote) => remote.convert(pdf).await,
                None => Err(PaperChemError::InvalidConfig(
                    "No conversion service configured".into(),
                )),
            };
        };

        match local.convert(pdf).await {
            Err(e) if e.is_service_unavailable() => match &self.remote {
                Some(remote) => {
                    info!("Local conversion unavailable ({}), using remote backend", e);
                    remote.convert(pdf).await
                }
                None => Err(e),
            },
            other => other,
        }
    }
}

#[async_trait]
impl DocumentConverter for ConversionGateway {
    async fn convert(&self, pdf: &Path) -> Result<String, PaperChemError> {
        ConversionGateway::convert(self, pdf).await
    }
}

/// `<dir>/<stem>.tei.xml`, written to a temp file and renamed into place.
pub async fn save_markup(dir: &Path, pdf: &Path, markup: &str) -> Result<PathBuf, PaperChemError> {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let target = dir.join(format!("{stem}.tei.xml"));

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PaperChemError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let tmp = target.with_extension("xml.tmp");
    tokio::fs::write(&tmp, markup)
        .await
        .map_err(|e| PaperChemError::OutputWriteFailed {
            path: tmp.clone(),
            source: e,
        })?;
    tokio::fs::rename(&tmp, &target)
        .await
        .map_err(|e| PaperChemError::OutputWriteFailed {
            path: target.clone(),
            source: e,
        })?;
    Ok(target)
}

/// Map a transport error from a conversion service. Only failures to reach
/// the service count as unavailability.
pub(crate) fn send_error(service: &str, pdf: &Path, e: reqwest::Error) -> PaperChemError {
    if e.is_connect() {
        PaperChemError::ServiceUnavailable {
            service: service.to_string(),
            detail: e.to_string(),
        }
    } else {
        PaperChemError::ConversionFailed {
            path: pdf.to_path_buf(),
            service: service.to_string(),
            detail: e.to_string(),
        }
    }
}

/// Map a non-success status from a conversion service.
pub(crate) fn status_error(service: &str, pdf: &Path, status: StatusCode) -> PaperChemError {
    if status == StatusCode::SERVICE_UNAVAILABLE {
        PaperChemError::ServiceUnavailable {
            service: service.to_string(),
            detail: format!("HTTP {status}"),
        }
    } else {
        PaperChemError::ConversionFailed {
            path: pdf.to_path_buf(),
            service: service.to_string(),
            detail: format!("HTTP {status}"),
        }
    }
}

/// Read a PDF for upload, mapping I/O errors onto input errors.
pub(crate) async fn read_pdf(pdf: &Path) -> Result<Vec<u8>, PaperChemError> {
    tokio::fs::read(pdf).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PaperChemError::FileNotFound {
            path: pdf.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => PaperChemError::PermissionDenied {
            path: pdf.to_path_buf(),
        },
        _ => PaperChemError::Internal(format!("Failed to read {}: {}", pdf.display(), e)),
    })
}

pub(crate) fn file_name(pdf: &Path) -> String {
    pdf.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string())
}

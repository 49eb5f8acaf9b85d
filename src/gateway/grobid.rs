//! Client for a local GROBID service.

use crate::error::PaperChemError;
use crate::gateway::{file_name, read_pdf, send_error, status_error, DocumentConverter};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "grobid";

#[derive(Debug, Clone)]
pub struct GrobidClient {
    client: reqwest::Client,
    base_url: String,
}

impl GrobidClient {
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, PaperChemError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| PaperChemError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET /api/isalive`.
    pub async fn is_alive(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/isalive", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("GROBID health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl DocumentConverter for GrobidClient {
    async fn convert(&self, pdf: &Path) -> Result<String, PaperChemError> {
        let bytes = read_pdf(pdf).await?;
        info!("Converting {} with GROBID ({} bytes)", pdf.display(), bytes.len());

        let part = Part::bytes(bytes)
            .file_name(file_name(pdf))
            .mime_str("application/pdf")
            .map_err(|e| PaperChemError::Internal(e.to_string()))?;
        let form = Form::new()
            .part("input", part)
            .text("consolidateHeader", "0");

        let resp = self
            .client
            .post(format!("{}/api/processFulltextDocument", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| send_error(SERVICE, pdf, e))?;

        if !resp.status().is_success() {
            return Err(status_error(SERVICE, pdf, resp.status()));
        }

        let tei = resp.text().await.map_err(|e| PaperChemError::ConversionFailed {
            path: pdf.to_path_buf(),
            service: SERVICE.into(),
            detail: e.to_string(),
        })?;
        if tei.trim().is_empty() {
            return Err(PaperChemError::ConversionFailed {
                path: pdf.to_path_buf(),
                service: SERVICE.into(),
                detail: "empty response".into(),
            });
        }
        debug!("GROBID returned {} bytes of TEI", tei.len());
        Ok(tei)
    }
}

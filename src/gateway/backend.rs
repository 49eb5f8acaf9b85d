//! Client for the remote, authenticated conversion backend.
//!
//! ```text
//! POST /auth/token           {"name","password"}  → {"token"}
//! POST /document/file        external_id + multipartFile  → document id
//! GET  /document/{id}/tei    → TEI
//! ```
//!
//! Batch uploads and downloads fan out over `min(concurrency, items)`
//! workers; results arrive in completion order, each tagged with its input.

use crate::config::PipelineConfig;
use crate::error::PaperChemError;
use crate::gateway::token::TokenCache;
use crate::gateway::{file_name, read_pdf, send_error, status_error, DocumentConverter};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const SERVICE: &str = "backend";

#[derive(Serialize)]
struct Credentials<'a> {
    name: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    external_id: String,
    concurrency: usize,
    tokens: TokenCache,
}

impl BackendClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, PaperChemError> {
        let (Some(url), Some(user), Some(password)) = (
            config.backend_url.as_deref(),
            config.backend_user.as_deref(),
            config.backend_password.as_deref(),
        ) else {
            return Err(PaperChemError::InvalidConfig(
                "The backend needs a URL, a user and a password".into(),
            ));
        };

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.conversion_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PaperChemError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
            external_id: config.external_id.clone(),
            concurrency: config.concurrency.max(1),
            tokens: TokenCache::new(config.token_validity_secs, config.token_cache_path.clone()),
        })
    }

    /// Replace the token cache, e.g. one with an injected clock.
    pub fn with_token_cache(mut self, tokens: TokenCache) -> Self {
        self.tokens = tokens;
        self
    }

    /// Request a new bearer token.
    pub async fn authenticate(&self) -> Result<String, PaperChemError> {
        debug!("Requesting backend token for '{}'", self.user);
        let resp = self
            .client
            .post(format!("{}/auth/token", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&Credentials {
                name: &self.user,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    PaperChemError::ServiceUnavailable {
                        service: SERVICE.into(),
                        detail: e.to_string(),
                    }
                } else {
                    auth_failed(e)
                }
            })?;

        if !resp.status().is_success() {
            return Err(auth_failed(format!("HTTP {}", resp.status())));
        }
        let body: TokenResponse = resp.json().await.map_err(auth_failed)?;
        if body.token.is_empty() {
            return Err(auth_failed("empty token"));
        }
        Ok(body.token)
    }

    async fn token(&self) -> Result<String, PaperChemError> {
        self.tokens.get_or_refresh(|| self.authenticate()).await
    }

    /// Upload one PDF and return the backend's document id.
    pub async fn post_document(&self, pdf: &Path) -> Result<u64, PaperChemError> {
        let bytes = read_pdf(pdf).await?;

        // A rejected token is refreshed once.
        for attempt in 0..2 {
            let token = self.token().await?;
            let part = Part::bytes(bytes.clone())
                .file_name(file_name(pdf))
                .mime_str("application/pdf")
                .map_err(|e| PaperChemError::Internal(e.to_string()))?;
            let form = Form::new()
                .text("external_id", self.external_id.clone())
                .part("multipartFile", part);

            let resp = self
                .client
                .post(format!("{}/document/file", self.base_url))
                .bearer_auth(&token)
                .multipart(form)
                .send()
                .await
                .map_err(|e| send_error(SERVICE, pdf, e))?;

            if resp.status() == StatusCode::UNAUTHORIZED && attempt == 0 {
                warn!("Backend rejected the cached token, refreshing");
                self.tokens.invalidate().await;
                continue;
            }
            if !resp.status().is_success() {
                return Err(status_error(SERVICE, pdf, resp.status()));
            }
            let id: u64 = resp.json().await.map_err(|e| PaperChemError::ConversionFailed {
                path: pdf.to_path_buf(),
                service: SERVICE.into(),
                detail: format!("document id: {e}"),
            })?;
            info!("Uploaded {} as backend document {}", pdf.display(), id);
            return Ok(id);
        }

        Err(PaperChemError::AuthFailed {
            service: SERVICE.into(),
            detail: "token rejected after refresh".into(),
        })
    }

    /// Fetch the TEI of an uploaded document.
    pub async fn get_document(&self, id: u64) -> Result<String, PaperChemError> {
        let label = PathBuf::from(format!("document {id}"));

        for attempt in 0..2 {
            let token = self.token().await?;
            let resp = self
                .client
                .get(format!("{}/document/{}/tei", self.base_url, id))
                .bearer_auth(&token)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| send_error(SERVICE, &label, e))?;

            if resp.status() == StatusCode::UNAUTHORIZED && attempt == 0 {
                warn!("Backend rejected the cached token, refreshing");
                self.tokens.invalidate().await;
                continue;
            }
            if !resp.status().is_success() {
                return Err(status_error(SERVICE, &label, resp.status()));
            }
            return resp.text().await.map_err(|e| PaperChemError::ConversionFailed {
                path: label.clone(),
                service: SERVICE.into(),
                detail: e.to_string(),
            });
        }

        Err(PaperChemError::AuthFailed {
            service: SERVICE.into(),
            detail: "token rejected after refresh".into(),
        })
    }

    /// Upload many PDFs concurrently. Completion order.
    pub async fn post_documents(&self, pdfs: &[PathBuf]) -> Vec<(PathBuf, Result<u64, PaperChemError>)> {
        let workers = self.concurrency.min(pdfs.len()).max(1);
        stream::iter(pdfs.iter().cloned())
            .map(|pdf| async move {
                let result = self.post_document(&pdf).await;
                (pdf, result)
            })
            .buffer_unordered(workers)
            .collect()
            .await
    }

    /// Upload every `*.pdf` directly inside `dir`.
    pub async fn post_folder(
        &self,
        dir: &Path,
    ) -> Result<Vec<(PathBuf, Result<u64, PaperChemError>)>, PaperChemError> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PaperChemError::FileNotFound {
                path: dir.to_path_buf(),
            },
            _ => PaperChemError::Internal(format!("Failed to list {}: {}", dir.display(), e)),
        })?;

        let mut pdfs = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            {
                pdfs.push(path);
            }
        }
        pdfs.sort();
        Ok(self.post_documents(&pdfs).await)
    }

    /// Fetch many documents concurrently. Completion order.
    pub async fn get_documents(&self, ids: &[u64]) -> Vec<(u64, Result<String, PaperChemError>)> {
        let workers = self.concurrency.min(ids.len()).max(1);
        stream::iter(ids.iter().copied())
            .map(|id| async move { (id, self.get_document(id).await) })
            .buffer_unordered(workers)
            .collect()
            .await
    }
}

#[async_trait]
impl DocumentConverter for BackendClient {
    async fn convert(&self, pdf: &Path) -> Result<String, PaperChemError> {
        let id = self.post_document(pdf).await?;
        self.get_document(id).await
    }
}

fn auth_failed(detail: impl std::fmt::Display) -> PaperChemError {
    PaperChemError::AuthFailed {
        service: SERVICE.into(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PipelineConfig {
        PipelineConfig::builder()
            .backend_url("http://127.0.0.1:9/")
            .backend_credentials("user", "secret")
            .build()
            .unwrap()
    }

    #[test]
    fn requires_credentials() {
        let config = PipelineConfig {
            backend_url: Some("http://localhost".into()),
            ..Default::default()
        };
        assert!(matches!(
            BackendClient::new(&config),
            Err(PaperChemError::InvalidConfig(_))
        ));
    }

    #[test]
    fn credentials_serialize_as_name_and_password() {
        let json = serde_json::to_string(&Credentials {
            name: "u",
            password: "p",
        })
        .unwrap();
        assert_eq!(json, r#"{"name":"u","password":"p"}"#);
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let client = BackendClient::new(&config()).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9");
        let err = client.authenticate().await.unwrap_err();
        assert!(err.is_service_unavailable(), "got {err:?}");
    }

    #[tokio::test]
    async fn batch_results_are_tagged() {
        let client = BackendClient::new(&config()).unwrap();
        let pdfs = vec![PathBuf::from("/missing/a.pdf"), PathBuf::from("/missing/b.pdf")];
        let mut results = client.post_documents(&pdfs).await;
        results.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, pdfs[0]);
        assert!(matches!(results[0].1, Err(PaperChemError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn downloads_are_tagged_by_id() {
        let client = BackendClient::new(&config()).unwrap();
        let mut results = client.get_documents(&[7, 3, 5]).await;
        results.sort_by_key(|r| r.0);
        let ids: Vec<u64> = results.iter().map(|r| r.0).collect();
        assert_eq!(ids, vec![3, 5, 7]);
        assert!(results.iter().all(|(_, r)| matches!(r, Err(e) if e.is_service_unavailable())));
    }

    #[tokio::test]
    async fn folder_upload_takes_only_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"%PDF-1.5\n").unwrap();
        }
        let client = BackendClient::new(&config()).unwrap();
        let mut results = client.post_folder(dir.path()).await.unwrap();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        let names: Vec<String> = results
            .iter()
            .map(|r| r.0.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
        assert!(results.iter().all(|(_, r)| r.is_err()));
    }

    #[tokio::test]
    async fn missing_folder_is_not_found() {
        let client = BackendClient::new(&config()).unwrap();
        let err = client.post_folder(Path::new("/missing/folder")).await.unwrap_err();
        assert!(matches!(err, PaperChemError::FileNotFound { .. }));
    }
}

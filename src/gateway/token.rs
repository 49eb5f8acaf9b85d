//! Bearer-token cache for the remote backend.
//!
//! Tokens are valid for a fixed window after issue. The cache keeps the
//! current token in memory and, when a path is configured, in a two-line file
//! (`<issued-at UTC>\n<token>`) so separate runs reuse it.

use crate::error::PaperChemError;
use chrono::{NaiveDateTime, TimeDelta, Utc};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CachedToken {
    token: String,
    issued_at: NaiveDateTime,
}

pub struct TokenCache {
    validity: TimeDelta,
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("validity", &self.validity)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    pub fn new(validity_secs: u64, path: Option<PathBuf>) -> Self {
        Self::with_clock(validity_secs, path, Arc::new(SystemClock))
    }

    pub fn with_clock(validity_secs: u64, path: Option<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            validity: i64::try_from(validity_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            path,
            clock,
            state: Mutex::new(None),
        }
    }

    /// Return a fresh token, calling `refresh` only when none is cached.
    ///
    /// The lock is held across `refresh`, so concurrent callers wait for one
    /// refresh instead of each issuing their own.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<String, PaperChemError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, PaperChemError>>,
    {
        let mut state = self.state.lock().await;

        if state.is_none() {
            *state = self.load().await;
        }
        if let Some(cached) = state.as_ref() {
            if self.is_fresh(cached) {
                return Ok(cached.token.clone());
            }
            debug!("Cached token expired (issued {})", cached.issued_at);
        }

        let issued_at = self.clock.now();
        let token = refresh().await?;
        let cached = CachedToken { token, issued_at };
        self.store(&cached).await;
        let token = cached.token.clone();
        *state = Some(cached);
        Ok(token)
    }

    /// Forget the current token, e.g. after the backend rejected it.
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
        if let Some(path) = &self.path {
            let _ = tokio::fs::remove_file(path).await;
        }
    }

    fn is_fresh(&self, cached: &CachedToken) -> bool {
        self.clock.now() - cached.issued_at < self.validity
    }

    async fn load(&self) -> Option<CachedToken> {
        let path = self.path.as_ref()?;
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        let parsed = parse_cache(&contents);
        if parsed.is_none() {
            warn!("Ignoring unreadable token cache {}", path.display());
        }
        parsed
    }

    async fn store(&self, cached: &CachedToken) {
        let Some(path) = &self.path else {
            return;
        };
        let tmp = path.with_extension("tmp");
        let result = async {
            tokio::fs::write(&tmp, render_cache(cached)).await?;
            tokio::fs::rename(&tmp, path).await
        }
        .await;
        if let Err(e) = result {
            warn!("Could not persist token cache {}: {}", path.display(), e);
        }
    }
}

fn parse_cache(contents: &str) -> Option<CachedToken> {
    let mut lines = contents.lines();
    let issued_at = NaiveDateTime::parse_from_str(lines.next()?.trim(), TIMESTAMP_FORMAT).ok()?;
    let token = lines.next()?.trim().to_string();
    if token.is_empty() {
        return None;
    }
    Some(CachedToken { token, issued_at })
}

fn render_cache(cached: &CachedToken) -> String {
    format!(
        "{}\n{}",
        cached.issued_at.format(TIMESTAMP_FORMAT),
        cached.token
    )
}

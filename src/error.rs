//! Error types for the paperchem library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PaperChemError`] — **Fatal** for one document: the input cannot be
//!   resolved, no conversion service produced markup, or the markup has no
//!   usable root. Returned as `Err(PaperChemError)` from the top-level
//!   `extract_*` / `compare_*` functions.
//!
//! * [`LookupError`] — **Non-fatal**: a single enrichment request failed
//!   (timeout, rate limit, malformed payload). The pipeline logs it and treats
//!   the mention as a miss, so one flaky request never loses a whole document.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paperchem library.
#[derive(Debug, Error)]
pub enum PaperChemError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is neither a PDF nor TEI markup.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The conversion service could not be reached (connection refused,
    /// connect timeout, HTTP 503). This is the only error that triggers the
    /// local → remote fallback.
    #[error("Conversion service '{service}' is unavailable: {detail}")]
    ServiceUnavailable { service: String, detail: String },

    /// The conversion service answered but did not produce markup.
    #[error("Conversion of '{path}' failed at '{service}': {detail}")]
    ConversionFailed {
        path: PathBuf,
        service: String,
        detail: String,
    },

    /// The remote backend rejected the credentials or returned no token.
    #[error("Authentication against '{service}' failed: {detail}")]
    AuthFailed { service: String, detail: String },

    // ── Markup errors ─────────────────────────────────────────────────────
    /// XML is malformed before any root element could be read.
    #[error("Malformed markup at byte {position}: {detail}")]
    MalformedMarkup { position: u64, detail: String },

    /// The markup has no root element.
    #[error("Markup has no root element; the document cannot be read")]
    EmptyDocument,

    /// A reader path selector failed to parse.
    #[error("Invalid selector '{selector}': {detail}")]
    InvalidSelector { selector: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaperChemError {
    /// Whether this error means "the service is not there", as opposed to
    /// "the service is there and said no".
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, PaperChemError::ServiceUnavailable { .. })
    }
}

/// A non-fatal error for a single enrichment request.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum LookupError {
    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("'{name}': request failed: {detail}")]
    Http { name: String, detail: String },

    /// The database answered with a non-success status other than "not found".
    #[error("'{name}': HTTP {status}")]
    Status { name: String, status: u16 },

    /// The response body did not match the expected JSON shape.
    #[error("'{name}': could not decode response: {detail}")]
    Decode { name: String, detail: String },

    /// The request timed out after all retries.
    #[error("'{name}': timed out after {secs}s")]
    Timeout { name: String, secs: u64 },
}

impl LookupError {
    /// Transient failures are worth another attempt; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            LookupError::Http { .. } | LookupError::Timeout { .. } => true,
            LookupError::Status { status, .. } => *status == 429 || *status >= 500,
            LookupError::Decode { .. } => false,
        }
    }
}

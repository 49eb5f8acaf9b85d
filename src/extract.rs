//! Entity-extraction entry points.
//!
//! ```text
//! input ─▶ resolve ─▶ convert (gateway) ─▶ normalize ─▶ read ─▶ resolve_entities
//! ```
//!
//! Already-converted TEI (`*.xml` inputs, or [`extract_entities_from_markup`])
//! skips the conversion step.

use crate::config::PipelineConfig;
use crate::entities::resolve_entities;
use crate::error::PaperChemError;
use crate::gateway::{resolve_input, ConversionGateway, InputKind};
use crate::lookup::{ChemicalLookup, PubChemClient};
use crate::markup::normalize;
use crate::output::{DocumentEntities, ExtractionStats};
use crate::reader::{StructuredDocument, TeiReader};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Extract the deduplicated chemicals of a PDF, URL or TEI file.
///
/// # Errors
/// Returns `Err(PaperChemError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - No conversion service produced markup
/// - Markup without a root element
///
/// Failed lookups are not errors; they show up in `stats.misses`.
pub async fn extract_entities(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<DocumentEntities, PaperChemError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    // ── Step 1: Obtain markup ────────────────────────────────────────────
    let convert_start = Instant::now();
    let markup = load_markup(input_str, config).await?;
    let conversion_ms = convert_start.elapsed().as_millis() as u64;

    // ── Step 2: Read and resolve ─────────────────────────────────────────
    let mut output = extract_from(input_str, &markup, config).await?;
    output.stats.conversion_ms = conversion_ms;
    Ok(output)
}

/// Same as [`extract_entities`] for markup already in memory.
pub async fn extract_entities_from_markup(
    markup: &str,
    config: &PipelineConfig,
) -> Result<DocumentEntities, PaperChemError> {
    extract_from("<markup>", markup, config).await
}

/// Extract from PDF bytes in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed on return.
pub async fn extract_entities_from_bytes(
    bytes: &[u8],
    config: &PipelineConfig,
) -> Result<DocumentEntities, PaperChemError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| PaperChemError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| PaperChemError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    extract_entities(&path, config).await
}

/// Extract and write the result as pretty JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_entities_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<ExtractionStats, PaperChemError> {
    let output = extract_entities(input_str, config).await?;
    let path = output_path.as_ref();
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| PaperChemError::Internal(format!("JSON encoding: {e}")))?;
    write_atomic(path, &json).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`extract_entities`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_entities_sync(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<DocumentEntities, PaperChemError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PaperChemError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_entities(input_str, config))
}

/// Read document structure without any chemical lookups.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<StructuredDocument, PaperChemError> {
    let markup = load_markup(input_str.as_ref(), config).await?;
    read_document(&markup, config)
}

/// Normalize and read markup with the configured selectors.
pub fn read_document(
    markup: &str,
    config: &PipelineConfig,
) -> Result<StructuredDocument, PaperChemError> {
    let root = normalize(markup)?;
    TeiReader::new(&config.selectors)?.parse(&root)
}

/// Write `contents` to `path` via a sibling temp file and rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), PaperChemError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PaperChemError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| PaperChemError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PaperChemError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the input and return TEI markup, converting PDFs on the way.
pub(crate) async fn load_markup(
    input_str: &str,
    config: &PipelineConfig,
) -> Result<String, PaperChemError> {
    load_markup_with(input_str, config, None).await
}

/// [`load_markup`] with a gateway shared across documents. `None` builds one
/// from `config` when a PDF needs converting.
pub(crate) async fn load_markup_with(
    input_str: &str,
    config: &PipelineConfig,
    gateway: Option<&ConversionGateway>,
) -> Result<String, PaperChemError> {
    let resolved =
        resolve_input(input_str, config.download_timeout_secs, &config.user_agent).await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(input_str);
    }

    let markup = match resolved.kind() {
        InputKind::Markup => {
            debug!("Reading markup directly from {}", resolved.path().display());
            tokio::fs::read_to_string(resolved.path())
                .await
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::PermissionDenied => PaperChemError::PermissionDenied {
                        path: resolved.path().to_path_buf(),
                    },
                    _ => PaperChemError::Internal(format!(
                        "Failed to read {}: {}",
                        resolved.path().display(),
                        e
                    )),
                })?
        }
        InputKind::Pdf => match gateway {
            Some(gateway) => gateway.convert(resolved.path()).await?,
            None => {
                ConversionGateway::from_config(config)?
                    .convert(resolved.path())
                    .await?
            }
        },
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(input_str, markup.len());
    }
    Ok(markup)
}

/// The configured lookup, or a PubChem client built from the config.
pub(crate) fn resolve_lookup(
    config: &PipelineConfig,
) -> Result<Arc<dyn ChemicalLookup>, PaperChemError> {
    match &config.lookup {
        Some(lookup) => Ok(Arc::clone(lookup)),
        None => Ok(Arc::new(PubChemClient::new(config)?)),
    }
}

async fn extract_from(
    source: &str,
    markup: &str,
    config: &PipelineConfig,
) -> Result<DocumentEntities, PaperChemError> {
    let document = read_document(markup, config)?;
    info!(
        "Read {} paragraphs and {} records from {}",
        document.paragraphs.len(),
        document.records.len(),
        source
    );

    let lookup = resolve_lookup(config)?;
    let (entities, stats) = resolve_entities(
        &document.records,
        lookup.as_ref(),
        config.progress_callback.as_deref(),
    )
    .await;

    Ok(DocumentEntities {
        source: source.to_string(),
        body: document.paragraphs.into_iter().map(|p| p.text).collect(),
        metadata: document.metadata,
        entities,
        stats,
    })
}

//! Batch conversion API: emit converted documents as they complete.
//!
//! Converting a folder of papers takes minutes per document. The stream lets
//! callers process or save each TEI document as soon as it is ready instead
//! of waiting for the whole batch. At most `config.concurrency` documents are
//! in flight; items arrive in completion order (match on
//! [`ConvertedDocument::input`] if order matters).

use crate::config::PipelineConfig;
use crate::error::PaperChemError;
use crate::extract::load_markup_with;
use crate::gateway::ConversionGateway;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::info;

/// One converted document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedDocument {
    /// The input reference as given.
    pub input: String,
    /// TEI markup.
    pub markup: String,
    pub duration_ms: u64,
}

/// A boxed stream of conversion results.
pub type ConversionStream =
    Pin<Box<dyn Stream<Item = Result<ConvertedDocument, PaperChemError>> + Send>>;

/// Convert many inputs concurrently, streaming results as they complete.
///
/// # Returns
/// - `Ok(ConversionStream)` — one item per input
/// - `Err(PaperChemError)` — no conversion service could be configured
pub fn convert_batch(
    inputs: Vec<String>,
    config: &PipelineConfig,
) -> Result<ConversionStream, PaperChemError> {
    info!("Starting batch conversion of {} inputs", inputs.len());

    let gateway = Arc::new(ConversionGateway::from_config(config)?);
    let workers = config.concurrency.min(inputs.len()).max(1);
    let config = Arc::new(config.clone());

    let s = stream::iter(inputs.into_iter().map(move |input| {
        let gateway = Arc::clone(&gateway);
        let cfg = Arc::clone(&config);
        async move {
            let start = Instant::now();
            let markup = load_markup_with(&input, &cfg, Some(gateway.as_ref())).await?;
            Ok(ConvertedDocument {
                input,
                markup,
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
    }))
    .buffer_unordered(workers);

    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::DocumentConverter;
    use async_trait::async_trait;
    use std::io::Write;
    use std::path::Path;

    struct Echo;

    #[async_trait]
    impl DocumentConverter for Echo {
        async fn convert(&self, pdf: &Path) -> Result<String, PaperChemError> {
            Ok(format!("<TEI n=\"{}\"/>", pdf.display()))
        }
    }

    #[tokio::test]
    async fn yields_one_item_per_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut inputs = Vec::new();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            let path = dir.path().join(name);
            std::fs::File::create(&path)
                .unwrap()
                .write_all(b"%PDF-1.5\n")
                .unwrap();
            inputs.push(path.to_string_lossy().to_string());
        }
        inputs.push("/missing/d.pdf".to_string());

        let config = PipelineConfig::builder()
            .no_grobid()
            .converter(Arc::new(Echo))
            .concurrency(2)
            .build()
            .unwrap();

        let results: Vec<_> = convert_batch(inputs, &config).unwrap().collect().await;
        assert_eq!(results.len(), 4);
        let ok: Vec<&ConvertedDocument> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(ok.len(), 3);
        assert!(ok.iter().all(|d| d.markup.contains(&d.input)));
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }
}

//! Progress-callback trait for per-mention extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline converts a document and resolves its mentions.
//!
//! # Example
//!
//! ```rust
//! use paperchem::{ExtractionProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     resolved: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_mention_resolved(&self, index: usize, total: usize, mention: &str, cid: u64) {
//!         self.resolved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} → CID {}", index, total, mention, cid);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     resolved: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it works through one document.
///
/// Mentions are resolved sequentially, but one callback may be shared by
/// several documents running concurrently (e.g. both sides of a comparison
/// in a host application), so implementations must be `Send + Sync`. All
/// methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called before the document is sent to a conversion service.
    fn on_conversion_start(&self, input: &str) {
        let _ = input;
    }

    /// Called once the TEI markup is available.
    ///
    /// # Arguments
    /// * `input`      — the input reference as given
    /// * `markup_len` — byte length of the markup
    fn on_conversion_complete(&self, input: &str, markup_len: usize) {
        let _ = (input, markup_len);
    }

    /// Called once before the first lookup.
    ///
    /// # Arguments
    /// * `total_mentions` — number of mention names that may be looked up
    fn on_extraction_start(&self, total_mentions: usize) {
        let _ = total_mentions;
    }

    /// Called when a mention resolved to a new canonical chemical.
    ///
    /// # Arguments
    /// * `index` — 1-indexed mention position
    /// * `total` — total mentions
    fn on_mention_resolved(&self, index: usize, total: usize, mention: &str, cid: u64) {
        let _ = (index, total, mention, cid);
    }

    /// Called when a mention resolved to a chemical already in the list.
    fn on_mention_duplicate(&self, index: usize, total: usize, mention: &str, cid: u64) {
        let _ = (index, total, mention, cid);
    }

    /// Called when no name variant of a mention resolved.
    fn on_mention_miss(&self, index: usize, total: usize, mention: &str) {
        let _ = (index, total, mention);
    }

    /// Called once after every mention has been attempted.
    fn on_extraction_complete(&self, total_mentions: usize, entity_count: usize) {
        let _ = (total_mentions, entity_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        resolved: AtomicUsize,
        duplicates: AtomicUsize,
        misses: AtomicUsize,
        entities: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_mention_resolved(&self, _: usize, _: usize, _: &str, _: u64) {
            self.resolved.fetch_add(1, Ordering::SeqCst);
        }

        fn on_mention_duplicate(&self, _: usize, _: usize, _: &str, _: u64) {
            self.duplicates.fetch_add(1, Ordering::SeqCst);
        }

        fn on_mention_miss(&self, _: usize, _: usize, _: &str) {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }

        fn on_extraction_complete(&self, _: usize, entity_count: usize) {
            self.entities.store(entity_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start("paper.pdf");
        cb.on_conversion_complete("paper.pdf", 1024);
        cb.on_extraction_start(3);
        cb.on_mention_resolved(1, 3, "water", 962);
        cb.on_mention_duplicate(2, 3, "H2O", 962);
        cb.on_mention_miss(3, 3, "unobtainium");
        cb.on_extraction_complete(3, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_mention_resolved(1, 3, "water", 962);
        tracker.on_mention_duplicate(2, 3, "H2O", 962);
        tracker.on_mention_miss(3, 3, "unobtainium");
        tracker.on_extraction_complete(3, 1);

        assert_eq!(tracker.resolved.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.duplicates.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.misses.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.entities.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(10);
    }
}

//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to follow a
//! run stage by stage. This is also where user-reported failures surface
//! (unsupported file type, no JSON, malformed JSON): the pipeline calls
//! [`ExtractionProgressCallback::on_failure`] with a short message and then
//! returns no result.
//!
//! # Example
//!
//! ```rust
//! use rfp_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Collect {
//!     messages: Mutex<Vec<String>>,
//! }
//!
//! impl ExtractionProgressCallback for Collect {
//!     fn on_failure(&self, message: &str) {
//!         self.messages.lock().unwrap().push(message.to_string());
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Collect::default()) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::input::DocumentKind;
use std::sync::Arc;

/// Called by the pipeline as each stage finishes.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once the document type is known, before text extraction.
    fn on_extraction_start(&self, name: &str, kind: DocumentKind) {
        let _ = (name, kind);
    }

    /// Called after text extraction.
    ///
    /// # Arguments
    /// * `text_chars` — characters of plain text
    /// * `page_count` — pages read (PDF only)
    fn on_text_extracted(&self, text_chars: usize, page_count: Option<usize>) {
        let _ = (text_chars, page_count);
    }

    /// Called just before the prompt is sent.
    fn on_model_request(&self, model: &str, prompt_bytes: usize) {
        let _ = (model, prompt_bytes);
    }

    /// Called when the model's answer arrives.
    fn on_model_response(&self, response_bytes: usize) {
        let _ = response_bytes;
    }

    /// A user-facing failure. The run ends without a result.
    fn on_failure(&self, message: &str) {
        let _ = message;
    }

    /// Called once the answer parsed into a result.
    fn on_extraction_complete(&self, field_count: usize) {
        let _ = field_count;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

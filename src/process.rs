//! Pipeline orchestration: document in, extracted fields out.
//!
//! ```text
//! SourceDocument ──▶ extract_text ──▶ build_prompt ──▶ invoke ──▶ parse_response
//!   (html|pdf)        (scraper/pdfium)   (template)     (LLM)      (first { … last })
//! ```
//!
//! Stages run strictly one after another; there is no retry and no partial
//! result. Two entry points expose the two error policies:
//!
//! * [`Extractor::extract`] returns every failure as `Err`.
//! * [`Extractor::process`] reports user-facing failures (unsupported type,
//!   no JSON, malformed JSON) through the progress callback (or, without
//!   one, an `error!` log line), returns `Ok(None)` for them, and lets
//!   everything else propagate.

use crate::config::ExtractionConfig;
use crate::error::RfpError;
use crate::output::{ExtractionOutput, ExtractionResult, ExtractionStats};
use crate::pipeline::extract::{self, ExtractedText};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::llm::{self, ModelInvoker};
use crate::pipeline::parse;
use crate::prompts::{build_prompt_with, Prompt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// A configured extraction pipeline.
///
/// Holds the read-only configuration and the model invoker. Cheap to share
/// behind an `Arc`; every call works on its own document and shares nothing
/// mutable with other calls.
pub struct Extractor {
    config: ExtractionConfig,
    invoker: Arc<dyn ModelInvoker>,
}

impl Extractor {
    /// Create the pipeline, resolving the model backend from `config`.
    pub fn new(config: ExtractionConfig) -> Result<Self, RfpError> {
        let invoker = llm::build_invoker(&config)?;
        Ok(Self { config, invoker })
    }

    /// Create the pipeline around an explicit invoker, ignoring `config.backend`.
    pub fn with_invoker(config: ExtractionConfig, invoker: Arc<dyn ModelInvoker>) -> Self {
        Self { config, invoker }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn model_name(&self) -> String {
        self.invoker.name()
    }

    /// Run the whole pipeline, surfacing every failure as `Err`.
    pub async fn extract(&self, document: SourceDocument) -> Result<ExtractionOutput, RfpError> {
        let total_start = Instant::now();
        let name = document.name.clone();
        let kind = document.kind;
        info!("Starting extraction: {} ({})", name, kind);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_extraction_start(&name, kind);
        }

        // ── Step 1: Text extraction ──────────────────────────────────────
        let extract_start = Instant::now();
        let text = extract::extract_text(document, &self.config).await?;
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        let text_chars = text.text.chars().count();
        let page_count = text.page_count;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_text_extracted(text_chars, page_count);
        }

        // ── Step 2: Prompt ───────────────────────────────────────────────
        let prompt = build_prompt_with(self.config.template(), text.as_str());
        drop(text);
        debug!("Prompt is {} bytes", prompt.len());

        // ── Step 3: Model call ───────────────────────────────────────────
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_model_request(&self.invoker.name(), prompt.len());
        }
        let (response, model_duration_ms) = llm::invoke_timed(self.invoker.as_ref(), &prompt).await?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_model_response(response.content().len());
        }

        // ── Step 4: Parse ────────────────────────────────────────────────
        let result = parse::parse_response(&response)?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_extraction_complete(result.len());
        }

        let stats = ExtractionStats {
            document_kind: Some(kind),
            page_count,
            text_chars,
            prompt_bytes: prompt.len(),
            response_bytes: response.content().len(),
            input_tokens: response.input_tokens(),
            output_tokens: response.output_tokens(),
            fields_extracted: result.len(),
            extract_duration_ms,
            model_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Extraction complete: {} fields from '{}' in {}ms",
            stats.fields_extracted, name, stats.total_duration_ms
        );

        Ok(ExtractionOutput { result, stats })
    }

    /// Run the pipeline; user-reported failures become `Ok(None)`.
    pub async fn process(
        &self,
        document: SourceDocument,
    ) -> Result<Option<ExtractionResult>, RfpError> {
        let outcome = self.extract(document).await.map(|out| out.result);
        self.report(outcome)
    }

    /// Load `path` and [`process`](Self::process) it.
    ///
    /// The type check happens before the file is read, so an unsupported
    /// extension is reported even for a path that does not exist.
    pub async fn process_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Option<ExtractionResult>, RfpError> {
        match SourceDocument::from_path(path).await {
            Ok(doc) => self.process(doc).await,
            Err(e) => self.report(Err(e)),
        }
    }

    /// Process an in-memory upload. Nothing is written to disk.
    pub async fn process_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<ExtractionResult>, RfpError> {
        match SourceDocument::from_bytes(file_name, bytes) {
            Ok(doc) => self.process(doc).await,
            Err(e) => self.report(Err(e)),
        }
    }

    /// Extract and write the JSON file. Returns the written path and stats.
    pub async fn extract_to_file(
        &self,
        document: SourceDocument,
        output_path: impl AsRef<Path>,
    ) -> Result<(PathBuf, ExtractionStats), RfpError> {
        let output = self.extract(document).await?;
        let path = output.result.write_json(output_path)?;
        Ok((path, output.stats))
    }

    fn report<T>(&self, outcome: Result<T, RfpError>) -> Result<Option<T>, RfpError> {
        match outcome {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_user_reported() => {
                let message = e.to_string();
                // The callback owns the user-facing report when there is one.
                match self.config.progress_callback {
                    Some(ref cb) => {
                        debug!("{}", message);
                        cb.on_failure(&message);
                    }
                    None => error!("{}", message),
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Text-extraction stage only. No model backend is needed.
pub async fn extract_document_text(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractedText, RfpError> {
    let document = SourceDocument::from_path(path).await?;
    extract::extract_text(document, config).await
}

/// Text extraction plus prompt rendering, without calling the model.
pub async fn render_prompt(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<Prompt, RfpError> {
    let text = extract_document_text(path, config).await?;
    Ok(build_prompt_with(config.template(), text.as_str()))
}

/// Synchronous wrapper around [`Extractor::extract`] for a file on disk.
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    path: impl AsRef<Path>,
    config: ExtractionConfig,
) -> Result<ExtractionOutput, RfpError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| RfpError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    runtime.block_on(async {
        let extractor = Extractor::new(config)?;
        let document = SourceDocument::from_path(path).await?;
        extractor.extract(document).await
    })
}

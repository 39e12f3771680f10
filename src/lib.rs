//! # rfp-extract
//!
//! Pull structured bid information out of RFP (Request for Proposal)
//! documents with a large language model.
//!
//! An RFP arrives as an HTML page or a PDF. This crate turns it into plain
//! text, embeds the text in a fixed prompt that lists twenty fields (bid
//! number, due date, bid bond requirement, contact info, …), sends the prompt
//! to a text-generation model, and parses the JSON object out of the answer.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .html / .pdf
//!  │
//!  ├─ 1. Input    dispatch on the file extension (case-insensitive)
//!  ├─ 2. Extract  HTML text nodes (scraper) or PDF text layer (pdfium)
//!  ├─ 3. Prompt   embed the whole text in the extraction template
//!  ├─ 4. Model    one call to Gemini (or any edgequake-llm provider)
//!  ├─ 5. Parse    first `{` … last `}` → serde_json object
//!  └─ 6. Output   pretty JSON → extracted_rfp_data.json
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rfp_extract::{ExtractionConfig, Extractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GOOGLE_API_KEY (placeholder if unset) and PDFIUM_LIB_PATH once.
//!     let config = ExtractionConfig::from_env();
//!     let extractor = Extractor::new(config)?;
//!
//!     if let Some(result) = extractor.process_path("bid_2024_017.pdf").await? {
//!         println!("{}", result.to_pretty_json());
//!         result.write_json(rfp_extract::DOWNLOAD_FILE_NAME)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `rfp-extract` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! rfp-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ApiKey, ExtractionConfig, ExtractionConfigBuilder, ModelBackend};
pub use error::RfpError;
pub use output::{
    ExtractionOutput, ExtractionResult, ExtractionStats, DOWNLOAD_FILE_NAME, DOWNLOAD_MEDIA_TYPE,
};
pub use pipeline::extract::{extract_text, ExtractedText};
pub use pipeline::gemini::GeminiInvoker;
pub use pipeline::input::{DocumentKind, SourceDocument};
pub use pipeline::llm::{ModelInvoker, ModelMessage, ModelResponse, ProviderInvoker};
pub use pipeline::parse::{locate_json, parse_response};
pub use process::{extract_document_text, extract_sync, render_prompt, Extractor};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::{build_prompt, build_prompt_with, Prompt, RFP_FIELDS};

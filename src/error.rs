//! Error type for the rfp-extract library.
//!
//! A single enum, [`RfpError`], covers every way an extraction can fail.
//! Every failure is terminal for the request: nothing is retried and no
//! partial result is produced.
//!
//! The variants fall into two groups:
//!
//! * **User-reported** ([`RfpError::is_user_reported`]) — the document or the
//!   model answer is unusable (wrong file type, no JSON, broken JSON). The
//!   orchestrator reports these and returns no result.
//!
//! * **Propagated** — everything else (I/O, pdfium, model service). These
//!   travel up to the caller as `Err` untouched.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the rfp-extract library.
#[derive(Debug, Error)]
pub enum RfpError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The file extension is neither `html` nor `pdf`.
    #[error("Unsupported file type '{extension}'. Please provide an HTML or PDF file.")]
    UnsupportedFileType { extension: String },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Any other read failure on the input file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Text extraction from PDF files needs the pdfium shared library.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n\
  • Or place libpdfium next to the binary / in the working directory.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The request never produced an HTTP response (DNS, TLS, connection, timeout).
    #[error("Model request failed: {message}")]
    ModelRequest { message: String },

    /// The model service answered with an error.
    #[error("Model API error ({status}): {detail}")]
    ModelApi { status: u16, detail: String },

    // ── Response errors ───────────────────────────────────────────────────
    /// The model answer contains no `{` at all.
    #[error("No valid JSON found in the response.")]
    NoJsonFound,

    /// A brace-delimited candidate was found but is not a JSON object.
    #[error("Error parsing the response as JSON: {source}")]
    MalformedJson {
        #[source]
        source: serde_json::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
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

impl RfpError {
    /// `true` for failures that are shown to the user and turn into "no
    /// result" rather than propagating.
    pub fn is_user_reported(&self) -> bool {
        matches!(
            self,
            RfpError::UnsupportedFileType { .. }
                | RfpError::NoJsonFound
                | RfpError::MalformedJson { .. }
        )
    }

    /// Map an I/O error on `path` to the most specific input variant.
    pub(crate) fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => RfpError::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => RfpError::PermissionDenied { path },
            _ => RfpError::Io { path, source: err },
        }
    }
}

//! Text extraction: [`SourceDocument`] → one plain-text string.
//!
//! ## HTML
//!
//! The markup is parsed with `scraper` (html5ever underneath, so broken
//! markup is repaired the way a browser would) and every text node is
//! concatenated in document order. Text inside non-rendered elements
//! (`script`, `style`, `noscript`, `template`) is skipped. Whitespace is kept
//! exactly as written.
//!
//! ## PDF
//!
//! Only the native text layer is read; there is no OCR. Pages are visited in
//! order and their texts concatenated with no separator. pdfium is not
//! async-safe, so the work runs inside `spawn_blocking`.

use crate::config::ExtractionConfig;
use crate::error::RfpError;
use crate::pipeline::input::{DocumentKind, SourceDocument};
use pdfium_render::prelude::*;
use scraper::{Html, Node};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Elements whose text is never rendered.
const INVISIBLE_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Plain text pulled out of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub kind: DocumentKind,
    /// Number of pages read (PDF only).
    pub page_count: Option<usize>,
}

impl ExtractedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Extract plain text from a document, dispatching on its kind.
///
/// The document is consumed: its bytes are not needed once the text exists.
pub async fn extract_text(
    document: SourceDocument,
    config: &ExtractionConfig,
) -> Result<ExtractedText, RfpError> {
    let SourceDocument { name, kind, bytes } = document;
    info!("Extracting text from '{}' ({})", name, kind);

    let extracted = match kind {
        DocumentKind::Html => ExtractedText {
            text: html_to_text(&decode_html(&name, &bytes)),
            kind,
            page_count: None,
        },
        DocumentKind::Pdf => {
            let password = config.password.clone();
            let lib_path = config.pdfium_lib_path.clone();
            let (text, page_count) = tokio::task::spawn_blocking(move || {
                pdf_text_blocking(&name, &bytes, password.as_deref(), lib_path.as_deref())
            })
            .await
            .map_err(|e| RfpError::Internal(format!("PDF extraction task panicked: {}", e)))??;

            ExtractedText {
                text,
                kind,
                page_count: Some(page_count),
            }
        }
    };

    debug!("Extracted {} chars of text", extracted.text.chars().count());
    Ok(extracted)
}

/// Decode HTML bytes as UTF-8, replacing invalid sequences.
fn decode_html<'a>(name: &str, bytes: &'a [u8]) -> Cow<'a, str> {
    let text = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = text {
        warn!("'{}' is not valid UTF-8; invalid bytes were replaced", name);
    }
    text
}

/// Concatenate every visible text node of `html`, in document order.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 2);

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| match a.value() {
            Node::Element(el) => INVISIBLE_ELEMENTS.contains(&el.name()),
            _ => false,
        });
        if !hidden {
            out.push_str(text);
        }
    }

    out
}

/// Bind to the pdfium library.
///
/// An explicit path may name the library itself or the directory holding
/// it. Without one, the working directory is tried before the system
/// library path.
fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, RfpError> {
    let bindings = match lib_path {
        Some(p) if p.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p))
        }
        Some(p) => Pdfium::bind_to_library(p),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| {
        let target = lib_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "system library path".to_string());
        RfpError::PdfiumBindingFailed(format!("{} ({:?})", target, e))
    })?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of PDF text extraction.
///
/// Returns the joined text of all pages and the page count.
fn pdf_text_blocking(
    name: &str,
    bytes: &[u8],
    password: Option<&str>,
    lib_path: Option<&Path>,
) -> Result<(String, usize), RfpError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    RfpError::WrongPassword {
                        name: name.to_string(),
                    }
                } else {
                    RfpError::PasswordRequired {
                        name: name.to_string(),
                    }
                }
            } else {
                RfpError::CorruptPdf {
                    name: name.to_string(),
                    detail: err_str,
                }
            }
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut layers = Vec::with_capacity(total_pages);
    for page in pages.iter() {
        let layer = page.text().map(|t| t.all());
        layers.push(layer);
    }

    Ok(join_page_texts(layers))
}

/// Concatenate per-page text in page order, with no separator.
///
/// A page whose text layer could not be read contributes nothing. The
/// returned count includes such pages.
fn join_page_texts<E: fmt::Debug>(
    pages: impl IntoIterator<Item = Result<String, E>>,
) -> (String, usize) {
    let mut text = String::new();
    let mut count = 0;
    for (idx, page) in pages.into_iter().enumerate() {
        count += 1;
        match page {
            Ok(t) if t.is_empty() => debug!("Page {}: empty text layer", idx + 1),
            Ok(t) => text.push_str(&t),
            Err(e) => warn!("Page {}: no readable text layer ({:?})", idx + 1, e),
        }
    }
    (text, count)
}

/// Resolve where pdfium will be looked up, for diagnostics.
pub fn pdfium_search_path(config: &ExtractionConfig) -> PathBuf {
    match config.pdfium_lib_path.as_deref() {
        Some(p) if p.is_dir() => Pdfium::pdfium_platform_library_name_at_path(p),
        Some(p) => p.to_path_buf(),
        None => Pdfium::pdfium_platform_library_name_at_path("./"),
    }
}

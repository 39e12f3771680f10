//! Output types: the extracted fields, run statistics, and the JSON file.

use crate::error::RfpError;
use crate::pipeline::input::DocumentKind;
use crate::prompts::RFP_FIELDS;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name offered for download.
pub const DOWNLOAD_FILE_NAME: &str = "extracted_rfp_data.json";

/// Media type of the downloaded file.
pub const DOWNLOAD_MEDIA_TYPE: &str = "application/json";

/// Field name → value, in the order the model wrote them.
///
/// Nothing is validated: keys the model invented are kept, expected keys it
/// skipped are simply absent, and values may be any JSON type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    fields: Map<String, Value>,
}

impl ExtractionResult {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The value of `field` if it is a JSON string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Expected field names the model did not return.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        RFP_FIELDS
            .iter()
            .copied()
            .filter(|f| !self.fields.contains_key(*f))
            .collect()
    }

    /// Pretty JSON with 4-space indentation, as written to the download file.
    pub fn to_pretty_json(&self) -> String {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        // A map of `Value`s always serialises, and the output is always UTF-8.
        if self.fields.serialize(&mut ser).is_err() {
            return "{}".to_string();
        }
        String::from_utf8(buf).unwrap_or_else(|_| "{}".to_string())
    }

    /// Write [`Self::to_pretty_json`] to `path`.
    ///
    /// If `path` is an existing directory, the file is named
    /// [`DOWNLOAD_FILE_NAME`] inside it. The write is atomic: a temp file in
    /// the target directory is renamed over the destination.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<PathBuf, RfpError> {
        let path = resolve_output_path(path.as_ref());
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let write_err = |source: std::io::Error| RfpError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&parent).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(self.to_pretty_json().as_bytes())
            .map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        debug!("Wrote {} fields to {}", self.len(), path.display());
        Ok(path)
    }
}

fn resolve_output_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(DOWNLOAD_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

/// Per-run statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub document_kind: Option<DocumentKind>,
    /// Pages read (PDF only).
    pub page_count: Option<usize>,
    /// Characters of extracted document text.
    pub text_chars: usize,
    /// Bytes of the rendered prompt.
    pub prompt_bytes: usize,
    /// Bytes of the model's raw answer.
    pub response_bytes: usize,
    pub input_tokens: Option<usize>,
    pub output_tokens: Option<usize>,
    pub fields_extracted: usize,
    pub extract_duration_ms: u64,
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a successful extraction plus how it went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub result: ExtractionResult,
    pub stats: ExtractionStats,
}

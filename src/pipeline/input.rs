//! Input resolution: turn a path or an upload buffer into a [`SourceDocument`].
//!
//! The document type comes from the file name's extension alone, compared
//! case-insensitively. Uploads are kept in memory: two concurrent requests
//! carrying the same file name never touch the same path on disk.

use crate::error::RfpError;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// The two document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Html,
    Pdf,
}

impl DocumentKind {
    /// Map a bare extension (`"PDF"`, `"html"`, …) to a kind.
    pub fn from_extension(ext: &str) -> Result<Self, RfpError> {
        match ext.to_ascii_lowercase().as_str() {
            "html" => Ok(DocumentKind::Html),
            "pdf" => Ok(DocumentKind::Pdf),
            other => Err(RfpError::UnsupportedFileType {
                extension: other.to_string(),
            }),
        }
    }

    /// Derive the kind from everything after the last `.` of a file name.
    ///
    /// A name without a dot is treated as having the whole name as its
    /// extension, so `"README"` is reported as unsupported type `readme`.
    pub fn from_file_name(name: &str) -> Result<Self, RfpError> {
        let ext = name.rsplit('.').next().unwrap_or(name);
        Self::from_extension(ext)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Html => "html",
            DocumentKind::Pdf => "pdf",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document to extract from: its name, its type tag, and its raw bytes.
#[derive(Clone)]
pub struct SourceDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

impl SourceDocument {
    /// Wrap an in-memory upload. The type is taken from `name`'s extension.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, RfpError> {
        let name = name.into();
        let kind = DocumentKind::from_file_name(&name)?;
        Ok(Self { name, kind, bytes })
    }

    /// Read a document from disk.
    ///
    /// The extension is checked before the file is opened, so an unsupported
    /// type is reported even when the path does not exist.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, RfpError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let kind = DocumentKind::from_file_name(&name)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RfpError::from_io(path.to_path_buf(), e))?;

        if kind == DocumentKind::Pdf && !bytes.starts_with(b"%PDF") {
            warn!("'{}' has a .pdf extension but no %PDF header", name);
        }
        debug!("Loaded {} ({}, {} bytes)", path.display(), kind, bytes.len());

        Ok(Self { name, kind, bytes })
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::errors::FormError;

pub const PDF_MIME: &str = "application/pdf";
const FALLBACK_MIME: &str = "application/octet-stream";

/// A resume accepted for upload. Contents are never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeFile {
    pub name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl ResumeFile {
    /// Accepts a dropped or picked file only if its declared type is PDF.
    pub fn accept(
        name: impl Into<String>,
        declared_mime: &str,
        bytes: Bytes,
    ) -> Result<Self, FormError> {
        if !is_accepted_mime(declared_mime) {
            warn!(declared = %declared_mime, "Rejected non-PDF resume");
            return Err(FormError::WrongFileType);
        }
        Ok(Self {
            name: name.into(),
            mime: PDF_MIME.to_string(),
            bytes,
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

pub fn is_accepted_mime(declared: &str) -> bool {
    declared
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_MIME))
        .unwrap_or(false)
}

/// The type a file picker would declare for this path, judged by extension only.
pub fn declared_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => PDF_MIME,
        _ => FALLBACK_MIME,
    }
}

/// Checks the declared type of a file on disk, then reads it.
/// A rejected file is never read.
pub async fn load_resume(path: &Path) -> Result<ResumeFile> {
    let mime = declared_mime(path);
    if !is_accepted_mime(mime) {
        warn!(path = %path.display(), declared = %mime, "Rejected non-PDF resume");
        return Err(FormError::WrongFileType.into());
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("resume.pdf")
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read resume file '{}'", path.display()))?;
    debug!(name = %name, size = bytes.len(), "Loaded resume file");

    Ok(ResumeFile::accept(name, mime, Bytes::from(bytes))?)
}

//! Plain-text extraction from uploaded documents.
//!
//! PDFs use their text layer via `pdftotext` and fall back to rendering pages with
//! `pdftoppm` and running `tesseract` when the layer is empty. Images go straight to
//! OCR. Requires poppler-utils and tesseract-ocr on `PATH`.

mod tools;

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("external tool not found: {0}")]
    ToolNotFound(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("no text found in {0}")]
    NoTextFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
    PlainText,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "gif" => Ok(DocumentKind::Image),
            "txt" | "csv" | "md" => Ok(DocumentKind::PlainText),
            "" => Err(ExtractionError::UnsupportedFileType("<none>".to_string())),
            other => Err(ExtractionError::UnsupportedFileType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextExtractor {
    /// Tesseract language code.
    language: String,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
        }
    }
}

impl TextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        if !path.exists() {
            return Err(ExtractionError::NotFound(path.to_path_buf()));
        }

        let text = match DocumentKind::from_path(path)? {
            DocumentKind::Pdf => self.extract_pdf(path)?,
            DocumentKind::Image => tools::tesseract(path, &self.language)?,
            DocumentKind::PlainText => String::from_utf8_lossy(&std::fs::read(path)?).into_owned(),
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ExtractionError::NoTextFound(path.to_path_buf()));
        }
        Ok(text)
    }

    /// Runs [`Self::extract`] on the blocking pool.
    pub async fn extract_blocking(&self, path: PathBuf) -> Result<String, ExtractionError> {
        let extractor = self.clone();
        tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| ExtractionError::ExtractionFailed(format!("extraction task failed: {e}")))?
    }

    fn extract_pdf(&self, path: &Path) -> Result<String, ExtractionError> {
        let text = join_pages(tools::pdftotext(path)?.split('\x0c'));
        if !text.is_empty() {
            tracing::debug!(path = %path.display(), chars = text.len(), "extracted pdf text layer");
            return Ok(text);
        }

        tracing::info!(path = %path.display(), "pdf has no text layer; falling back to OCR");
        self.ocr_pdf(path)
    }

    fn ocr_pdf(&self, path: &Path) -> Result<String, ExtractionError> {
        let temp_dir = TempDir::new()?;
        let images = tools::pdftoppm(path, temp_dir.path())?;

        let mut pages = Vec::with_capacity(images.len());
        for image in &images {
            pages.push(tools::tesseract(image, &self.language)?);
        }
        let text = join_pages(pages.iter().map(String::as_str));
        tracing::debug!(path = %path.display(), pages = images.len(), chars = text.len(), "ocr finished");
        Ok(text)
    }
}

fn join_pages<'a>(pages: impl Iterator<Item = &'a str>) -> String {
    pages
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

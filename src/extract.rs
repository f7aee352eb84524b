//! Document discovery and text extraction.
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions treated as case documents (compared case-insensitively).
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "txt"];

/// Turns a document into plain text. Returns the empty string when nothing
/// could be extracted.
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> String;
}

/// Extracts PDFs with `pdf-extract` and reads text files directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTextExtractor;

impl TextExtractor for FileTextExtractor {
    fn extract(&self, path: &Path) -> String {
        let result = match extension_of(path).as_deref() {
            Some("pdf") => extract_pdf(path),
            _ => fs::read(path)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .with_context(|| format!("read {}", path.display())),
        };
        match result {
            Ok(text) => {
                tracing::info!(document = %path.display(), chars = text.len(), "extracted text");
                text
            }
            Err(err) => {
                tracing::warn!(
                    document = %path.display(),
                    error = %format!("{err:#}"),
                    "text extraction failed"
                );
                String::new()
            }
        }
    }
}

fn extract_pdf(path: &Path) -> Result<String> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    match std::panic::catch_unwind(|| pdf_extract::extract_text(path)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(anyhow!("extract PDF text from {}: {err}", path.display())),
        Err(_) => Err(anyhow!("PDF parser panicked on {}", path.display())),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn is_document(path: &Path) -> bool {
    path.is_file()
        && extension_of(path).is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
}

/// Supported documents directly inside `case_dir`, sorted by file name.
pub fn discover_documents(case_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(case_dir)
        .with_context(|| format!("read case directory {}", case_dir.display()))?;
    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("list {}", case_dir.display()))?;
        let path = entry.path();
        if is_document(&path) {
            documents.push(path);
        }
    }
    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(documents)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::TextExtractor;
    use std::cell::Cell;
    use std::path::Path;

    /// Reads files as text and counts calls; files named `blank*` extract to
    /// nothing.
    #[derive(Default)]
    pub struct CountingExtractor {
        pub calls: Cell<usize>,
    }

    impl TextExtractor for CountingExtractor {
        fn extract(&self, path: &Path) -> String {
            self.calls.set(self.calls.get() + 1);
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.starts_with("blank") {
                return String::new();
            }
            std::fs::read_to_string(path).unwrap_or_default()
        }
    }
}

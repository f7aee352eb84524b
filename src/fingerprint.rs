//! Cache keys for "this document evaluated against this question set".
//!
//! The key covers the document's file name, a digest of its bytes, and the
//! serialized question set. Run directories and timestamps stay out of it so
//! repeated runs hit the cache.
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::types::QuestionSet;
use crate::util::sha256_hex;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(filename: &str, content: &[u8], questions: &QuestionSet) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"document:");
        hasher.update(filename.as_bytes());
        hasher.update(b"\0content:");
        hasher.update(sha256_hex(content).as_bytes());
        hasher.update(b"\0questions:");
        hasher.update(questions.canonical_json().as_bytes());
        Self(format!("sha256:{:x}", hasher.finalize()))
    }

    /// Fingerprint a document on disk.
    pub fn for_document(path: &Path, questions: &QuestionSet) -> Result<Self> {
        let content = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        Ok(Self::compute(&document_name(path), &content, questions))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File name as recorded in analysis output.
pub fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

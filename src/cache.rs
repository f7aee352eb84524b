//! Persistent per-run cache of document analyses.
//!
//! The cache is one JSON object keyed by fingerprint. It is loaded once when
//! the analyzer starts and rewritten in full after every new entry, so an
//! interrupted run loses at most the document in flight. The file is not
//! locked; concurrent writers race and the last one wins.
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RunError;
use crate::fingerprint::Fingerprint;
use crate::types::DocumentAnalysis;
use crate::util::write_json_pretty;

/// Whether a value came from the cache or was just computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Computed,
    /// Produced without a cache key and not stored.
    Uncached,
}

#[derive(Debug)]
pub struct AnalysisCache {
    path: PathBuf,
    entries: BTreeMap<String, DocumentAnalysis>,
}

impl AnalysisCache {
    /// Load the cache at `path`. A missing file is an empty cache; an
    /// unparseable one is an error rather than a silent reset.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            tracing::info!(path = %path.display(), "no analysis cache, starting fresh");
            return Ok(Self {
                path: path.to_path_buf(),
                entries: BTreeMap::new(),
            });
        }
        let bytes = fs::read(path).with_context(|| format!("read cache {}", path.display()))?;
        let entries: BTreeMap<String, DocumentAnalysis> = serde_json::from_slice(&bytes)
            .map_err(|source| RunError::CacheMalformed {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), entries = entries.len(), "loaded analysis cache");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&DocumentAnalysis> {
        self.entries.get(fingerprint.as_str())
    }

    /// Return the cached analysis for `fingerprint`, or run `compute`, store
    /// its result, and flush the whole cache before returning it.
    pub fn get_or_compute<F>(
        &mut self,
        fingerprint: &Fingerprint,
        compute: F,
    ) -> Result<(DocumentAnalysis, CacheOutcome)>
    where
        F: FnOnce() -> DocumentAnalysis,
    {
        if let Some(cached) = self.get(fingerprint) {
            return Ok((cached.clone(), CacheOutcome::Hit));
        }
        let analysis = compute();
        self.entries
            .insert(fingerprint.as_str().to_string(), analysis.clone());
        self.persist()?;
        Ok((analysis, CacheOutcome::Computed))
    }

    fn persist(&self) -> Result<()> {
        write_json_pretty(&self.path, &self.entries)?;
        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "saved analysis cache");
        Ok(())
    }
}

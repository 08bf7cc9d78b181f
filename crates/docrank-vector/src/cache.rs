//! JSON-file embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! Consulted before calling the embedder and written through on misses, so
//! an unchanged corpus is embedded once.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: String,
    pub embedder_id: String,
    pub vector: Vec<f32>,
}

#[derive(Default, Serialize, Deserialize)]
struct CacheFile {
    entries: Vec<CacheEntry>,
}

#[derive(Default)]
pub struct EmbeddingCache {
    path: Option<PathBuf>,
    entries: HashMap<(String, String), Vec<f32>>,
    dirty: bool,
}

pub fn hash_content(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

impl EmbeddingCache {
    /// A cache that is never persisted.
    pub fn in_memory() -> Self { Self::default() }

    /// Loads `path` if it exists; a missing file is an empty cache.
    pub fn open(path: &Path) -> Result<Self> {
        let mut cache = Self { path: Some(path.to_path_buf()), ..Self::default() };
        if path.exists() {
            let raw = fs::read(path).with_context(|| format!("reading cache {}", path.display()))?;
            let file: CacheFile = serde_json::from_slice(&raw).with_context(|| format!("parsing cache {}", path.display()))?;
            for e in file.entries {
                cache.entries.insert((e.content_hash, e.embedder_id), e.vector);
            }
            debug!(entries = cache.entries.len(), path = %path.display(), "loaded embedding cache");
        }
        Ok(cache)
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get_many(&self, embedder_id: &str, hashes: &[String]) -> HashMap<String, Vec<f32>> {
        let mut out = HashMap::new();
        for h in hashes {
            if let Some(v) = self.entries.get(&(h.clone(), embedder_id.to_string())) {
                out.insert(h.clone(), v.clone());
            }
        }
        out
    }

    pub fn put_many(&mut self, entries: Vec<CacheEntry>) {
        if entries.is_empty() { return; }
        for e in entries {
            self.entries.insert((e.content_hash, e.embedder_id), e.vector);
        }
        self.dirty = true;
    }

    /// Writes the cache back to its file when anything was added.
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        if !self.dirty { return Ok(()); }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut entries: Vec<CacheEntry> = self
            .entries
            .iter()
            .map(|((content_hash, embedder_id), vector)| CacheEntry {
                content_hash: content_hash.clone(),
                embedder_id: embedder_id.clone(),
                vector: vector.clone(),
            })
            .collect();
        entries.sort_by(|a, b| (&a.embedder_id, &a.content_hash).cmp(&(&b.embedder_id, &b.content_hash)));
        fs::write(path, serde_json::to_vec(&CacheFile { entries })?)
            .with_context(|| format!("writing cache {}", path.display()))?;
        self.dirty = false;
        debug!(entries = self.entries.len(), path = %path.display(), "saved embedding cache");
        Ok(())
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::chunker::{select_pages, HeaderChunker};
use crate::config::ChunkingConfig;
use crate::splitter::LengthSplitter;
use crate::traits::LineExtractor;
use crate::types::{Chunk, Document, Page, SourceId};

/// On-disk shape of pre-extracted layout lines. `id` defaults to the file stem.
#[derive(Debug, Deserialize)]
struct DocumentFile {
    id: Option<SourceId>,
    pages: Vec<Page>,
}

/// Reads a layout-line JSON document.
pub fn read_document(path: &Path) -> Result<Document> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file: DocumentFile =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    let id = file.id.unwrap_or_else(|| SourceId::parse(&file_stem(path)));
    Ok(Document { id, pages: file.pages })
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

/// Text extractor over a directory tree of `{id}.json` layout files.
pub struct JsonLineExtractor {
    files: BTreeMap<SourceId, PathBuf>,
}

impl JsonLineExtractor {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            anyhow::bail!("layout directory {} does not exist", root.display());
        }
        let mut files = BTreeMap::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let id = SourceId::parse(&file_stem(path));
            if let Some(previous) = files.insert(id.clone(), path.to_path_buf()) {
                warn!(%id, previous = %previous.display(), "duplicate layout file, keeping the later one");
            }
        }
        debug!(root = %root.display(), documents = files.len(), "indexed layout files");
        Ok(Self { files })
    }

    pub fn ids(&self) -> Vec<SourceId> { self.files.keys().cloned().collect() }
}

impl LineExtractor for JsonLineExtractor {
    fn extract(&self, id: &SourceId, pages: Option<Range<usize>>) -> Result<Document> {
        let path = self
            .files
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("no layout file for document {}", id))?;
        let mut doc = read_document(path)?;
        doc.id = id.clone();
        if pages.is_some() {
            doc.pages = select_pages(&doc.pages, pages).to_vec();
        }
        Ok(doc)
    }
}

/// Header chunking followed by length splitting.
#[derive(Default)]
pub struct DataProcessor {
    chunker: HeaderChunker,
    splitter: LengthSplitter,
}

impl DataProcessor {
    pub fn new(config: ChunkingConfig) -> Self {
        let splitter = LengthSplitter::from_config(&config);
        Self { chunker: HeaderChunker::new(config), splitter }
    }

    pub fn chunker(&self) -> &HeaderChunker { &self.chunker }

    pub fn process_document(&self, doc: &Document) -> Vec<Chunk> {
        let chunks = self.chunker.chunk(doc, None);
        self.splitter.split(&chunks)
    }

    /// Chunks every listed document. A document that fails to load is
    /// skipped with a warning rather than aborting the batch.
    pub fn process_all(
        &self,
        extractor: &dyn LineExtractor,
        ids: &[SourceId],
        pages: Option<Range<usize>>,
    ) -> Vec<(SourceId, Vec<Chunk>)> {
        let mut out = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            debug!("Processing document {}/{}: {}", i + 1, ids.len(), id);
            match extractor.extract(id, pages.clone()) {
                Ok(doc) => out.push((id.clone(), self.process_document(&doc))),
                Err(e) => warn!(%id, error = %e, "skipping document"),
            }
        }
        let total: usize = out.iter().map(|(_, c)| c.len()).sum();
        info!("Processed {} documents into {} chunks", out.len(), total);
        out
    }
}

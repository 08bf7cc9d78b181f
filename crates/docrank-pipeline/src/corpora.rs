//! Corpora built once before the query loop and only read afterwards.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use docrank_core::data_processor::{read_document, DataProcessor};
use docrank_core::error::{Error, Result};
use docrank_core::traits::LineExtractor;
use docrank_core::types::{split_page_id, SourceId};
use docrank_vector::{EmbeddingCache, EmbeddingRanker};

/// One question with its answer paragraphs.
#[derive(Debug, Clone, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answers: Vec<String>,
}

/// `question: Q answer: A1 A2` per entry, entries joined by spaces.
pub fn format_faq(entries: &[FaqEntry]) -> String {
    entries
        .iter()
        .map(|qa| format!("question: {} answer: {}", qa.question, qa.answers.join(" ")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Passage text per FAQ id.
#[derive(Debug, Clone, Default)]
pub struct FaqCorpus {
    texts: BTreeMap<SourceId, String>,
}

impl FaqCorpus {
    /// Reads `{"<id>": [{"question": …, "answers": […]}, …]}`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let map: BTreeMap<String, Vec<FaqEntry>> = serde_json::from_str(&raw)?;
        let texts = map
            .into_iter()
            .map(|(id, entries)| (SourceId::parse(&id), format_faq(&entries)))
            .collect::<BTreeMap<_, _>>();
        info!("Loaded {} FAQ entries from {}", texts.len(), path.display());
        Ok(Self { texts })
    }

    pub fn from_texts(texts: impl IntoIterator<Item = (SourceId, String)>) -> Self {
        Self { texts: texts.into_iter().collect() }
    }

    pub fn len(&self) -> usize { self.texts.len() }

    pub fn is_empty(&self) -> bool { self.texts.is_empty() }

    pub fn texts(&self) -> &BTreeMap<SourceId, String> { &self.texts }
}

/// Embedding texts of each insurance document's split chunks.
#[derive(Debug, Clone, Default)]
pub struct InsuranceCorpus {
    chunks: BTreeMap<SourceId, Vec<String>>,
}

impl InsuranceCorpus {
    /// Chunks and splits every listed document. Unreadable documents are
    /// left out; a document that yields no chunk keeps an empty list.
    pub fn build(processor: &DataProcessor, extractor: &dyn LineExtractor, ids: &[SourceId]) -> Self {
        let chunks = processor
            .process_all(extractor, ids, None)
            .into_iter()
            .map(|(id, chunks)| (id, chunks.iter().map(|c| c.embedding_text()).collect()))
            .collect();
        Self { chunks }
    }

    pub fn from_chunks(chunks: impl IntoIterator<Item = (SourceId, Vec<String>)>) -> Self {
        Self { chunks: chunks.into_iter().collect() }
    }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn chunks(&self) -> &BTreeMap<SourceId, Vec<String>> { &self.chunks }
}

/// Finance page texts keyed by `{doc}_p{page}`.
#[derive(Debug, Clone, Default)]
pub struct FinanceCorpus {
    pages: BTreeMap<String, String>,
    by_doc: HashMap<String, Vec<(u32, String)>>,
}

impl FinanceCorpus {
    pub fn new(pages: impl IntoIterator<Item = (String, String)>) -> Self {
        let pages: BTreeMap<String, String> = pages.into_iter().collect();
        let mut by_doc: HashMap<String, Vec<(u32, String)>> = HashMap::new();
        for id in pages.keys() {
            match split_page_id(id) {
                Some((doc, page)) => by_doc.entry(doc.to_string()).or_default().push((page, id.clone())),
                None => debug!(page = %id, "page id is not of the form <doc>_p<page>; never in scope"),
            }
        }
        for list in by_doc.values_mut() {
            list.sort();
        }
        Self { pages, by_doc }
    }

    /// Reads page texts from `dir`: `.txt` files verbatim, `.json` layout
    /// files as their lines joined by newlines. The file stem is the page id.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("finance page directory {}", dir.display())));
        }
        let mut pages = Vec::new();
        for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else { continue };
            let text = match path.extension().and_then(|s| s.to_str()) {
                Some("txt") => fs::read_to_string(path)?,
                Some("json") => match read_document(path) {
                    Ok(doc) => doc
                        .pages
                        .iter()
                        .flat_map(|p| p.lines.iter().map(|l| l.text.as_str()))
                        .collect::<Vec<_>>()
                        .join("\n"),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable finance page");
                        continue;
                    }
                },
                _ => continue,
            };
            pages.push((stem, text));
        }
        let corpus = Self::new(pages);
        info!("Loaded {} finance pages from {}", corpus.len(), dir.display());
        Ok(corpus)
    }

    pub fn len(&self) -> usize { self.pages.len() }

    pub fn is_empty(&self) -> bool { self.pages.is_empty() }

    pub fn page(&self, id: &str) -> Option<&str> { self.pages.get(id).map(String::as_str) }

    /// All pages of the given documents, in document order then page order.
    /// A document listed twice contributes its pages once.
    pub fn scoped(&self, docs: &[SourceId]) -> Vec<(SourceId, String)> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for doc in docs {
            let key = doc.to_string();
            if !seen.insert(key.clone()) {
                continue;
            }
            let Some(pages) = self.by_doc.get(&key) else {
                warn!(doc = %key, "no finance pages for document");
                continue;
            };
            for (_, id) in pages {
                if let Some(text) = self.pages.get(id) {
                    out.push((SourceId::Text(id.clone()), text.clone()));
                }
            }
        }
        out
    }
}

/// Everything retrievers read: FAQ passage vectors, insurance chunk vectors
/// grouped by document, and finance page texts.
#[derive(Default)]
pub struct Corpora {
    pub faq: HashMap<SourceId, Vec<f32>>,
    pub insurance: HashMap<SourceId, Vec<Vec<f32>>>,
    pub finance: FinanceCorpus,
}

impl Corpora {
    /// Embeds the FAQ and insurance passages.
    pub fn embed(
        ranker: &EmbeddingRanker,
        faq: &FaqCorpus,
        insurance: &InsuranceCorpus,
        finance: FinanceCorpus,
        mut cache: Option<&mut EmbeddingCache>,
    ) -> Result<Self> {
        let faq_ids: Vec<SourceId> = faq.texts().keys().cloned().collect();
        let faq_texts: Vec<String> = faq.texts().values().cloned().collect();
        let faq_vectors = ranker
            .embed_passages(&faq_texts, cache.as_deref_mut())
            .map_err(|e| Error::Embedding(e.to_string()))?;
        let faq = faq_ids.into_iter().zip(faq_vectors).collect::<HashMap<_, _>>();

        let flat: Vec<String> = insurance.chunks().values().flatten().cloned().collect();
        let mut vectors = ranker
            .embed_passages(&flat, cache.as_deref_mut())
            .map_err(|e| Error::Embedding(e.to_string()))?
            .into_iter();
        let mut grouped = HashMap::with_capacity(insurance.len());
        for (id, chunks) in insurance.chunks() {
            let doc_vectors: Vec<Vec<f32>> = vectors.by_ref().take(chunks.len()).collect();
            grouped.insert(id.clone(), doc_vectors);
        }
        info!(
            faq = faq.len(),
            insurance_docs = grouped.len(),
            insurance_chunks = flat.len(),
            finance_pages = finance.len(),
            "corpora ready"
        );
        Ok(Self { faq, insurance: grouped, finance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faq_entries_render_as_question_answer_pairs() {
        let entries = vec![
            FaqEntry { question: "如何申請？".into(), answers: vec!["線上申請".into(), "臨櫃辦理".into()] },
            FaqEntry { question: "費用？".into(), answers: vec!["免費".into()] },
        ];
        assert_eq!(
            format_faq(&entries),
            "question: 如何申請？ answer: 線上申請 臨櫃辦理 question: 費用？ answer: 免費"
        );
    }

    #[test]
    fn finance_scope_follows_document_prefix() {
        let corpus = FinanceCorpus::new(vec![
            ("12_p2".to_string(), "b".to_string()),
            ("12_p10".to_string(), "c".to_string()),
            ("12_p1".to_string(), "a".to_string()),
            ("120_p1".to_string(), "other".to_string()),
            ("cover".to_string(), "x".to_string()),
        ]);
        let scoped = corpus.scoped(&[SourceId::Int(12)]);
        let ids: Vec<String> = scoped.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["12_p1", "12_p2", "12_p10"]);
        assert!(corpus.scoped(&[SourceId::Int(7)]).is_empty());
        let repeated = corpus.scoped(&[SourceId::Int(12), SourceId::Text("12".into()), SourceId::Int(12)]);
        assert_eq!(repeated, scoped);
        assert_eq!(corpus.len(), 5);
    }
}

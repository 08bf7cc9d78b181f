//! Capability seams. External collaborators (embedding model, text
//! extractor, lexical backend, visual judge) are injected through these so
//! the ranking logic can run against stubs.

use std::ops::Range;

use crate::types::{Document, PageImage, ScoredCandidate, SourceId};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (used to key cached vectors).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Embeds texts as given; callers apply the query/passage prefixes.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

pub trait LineExtractor: Send + Sync {
    /// Returns the document's lines in original order, page boundaries kept.
    /// `pages` is a half-open range of 0-based page indices.
    fn extract(&self, id: &SourceId, pages: Option<Range<usize>>) -> anyhow::Result<Document>;
}

pub trait LexicalScorer: Send + Sync {
    /// Ranks `corpus` against `query`, highest score first, ties in input order.
    fn rank(&self, query: &str, corpus: &[(SourceId, String)]) -> anyhow::Result<Vec<ScoredCandidate>>;
}

pub trait VisualJudge: Send + Sync {
    /// Picks one of `pages` for `query`. The answer is free text; a 1-based
    /// position is expected but not guaranteed.
    fn judge(&self, query: &str, pages: &[PageImage]) -> anyhow::Result<String>;
}

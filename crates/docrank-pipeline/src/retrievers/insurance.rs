use std::sync::Arc;
use tracing::{debug, warn};

use docrank_core::error::{Error, Result};
use docrank_core::types::{Category, Query, Retrieved};
use docrank_vector::EmbeddingRanker;

use super::Retriever;
use crate::corpora::Corpora;

/// Best insurance document by its most similar chunk.
pub struct InsuranceRetriever {
    ranker: Arc<EmbeddingRanker>,
    top_k: usize,
}

impl InsuranceRetriever {
    pub fn new(ranker: Arc<EmbeddingRanker>, top_k: usize) -> Self { Self { ranker, top_k } }
}

impl Retriever for InsuranceRetriever {
    fn category(&self) -> Category { Category::Insurance }

    /// A single id when `top_k` is 1, a ranked list otherwise. A query none
    /// of whose documents has chunk embeddings gets an empty ranked list.
    fn retrieve(&self, query: &Query, corpora: &Corpora) -> Result<Retrieved> {
        let in_scope = query
            .source
            .iter()
            .any(|id| corpora.insurance.get(id).is_some_and(|chunks| !chunks.is_empty()));
        if !in_scope {
            warn!(qid = query.qid, "no insurance candidates in scope");
            return Ok(Retrieved::Ranked(Vec::new()));
        }
        let q = self.ranker.embed_query(&query.query).map_err(|e| Error::Embedding(e.to_string()))?;
        let mut top = self.ranker.rank_grouped(&q, &query.source, &corpora.insurance, self.top_k);
        debug!(qid = query.qid, ranked = top.len(), "insurance ranked");
        if top.is_empty() {
            return Ok(Retrieved::Ranked(Vec::new()));
        }
        if self.top_k == 1 {
            return Ok(Retrieved::Single(top.remove(0).id));
        }
        Ok(Retrieved::Ranked(top.into_iter().map(|c| c.id).collect()))
    }
}
